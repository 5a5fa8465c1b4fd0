//! Per-rotation crop framing: projects the bounds of every renderable,
//! camera-visible object into normalized camera-view space and returns a
//! padded crop rectangle. Shading outside the rectangle is skipped, so a
//! tight fit is a direct render-time win.

use kurbo::Rect;

use crate::{
    error::{IsocapError, IsocapResult},
    scene::Scene,
};

/// Slack added on each side of the accumulated bounds, pre-clamp.
pub const CROP_PADDING: f64 = 0.01;

/// Computes the crop rectangle for the current rig rotation. The result is
/// the tightest axis-aligned box containing every projected bound-box corner,
/// expanded by [`CROP_PADDING`] per side and clamped to the unit square.
///
/// A scene with no eligible objects falls back to the full frame.
pub fn compute_crop(scene: &Scene) -> IsocapResult<Rect> {
    let camera = scene
        .active_camera
        .ok_or_else(|| IsocapError::precondition("no active camera is set"))?;

    let mut min_x = 1.0f64;
    let mut max_x = 0.0f64;
    let mut min_y = 1.0f64;
    let mut max_y = 0.0f64;
    let mut seen_any = false;

    for (id, object) in scene.iter_objects() {
        if object.hide_render || !object.visible_camera || !object.kind.is_renderable_geometry() {
            continue;
        }

        let world = scene.world_matrix(id);

        let mut object_min_x = 1.0f64;
        let mut object_max_x = 0.0f64;
        let mut object_min_y = 1.0f64;
        let mut object_max_y = 0.0f64;

        for corner in object.bound_box.corners() {
            let view = scene.world_to_camera_view(camera, world.transform_point3(corner))?;
            object_min_x = object_min_x.min(view.x);
            object_max_x = object_max_x.max(view.x);
            object_min_y = object_min_y.min(view.y);
            object_max_y = object_max_y.max(view.y);
        }

        min_x = min_x.min(object_min_x);
        max_x = max_x.max(object_max_x);
        min_y = min_y.min(object_min_y);
        max_y = max_y.max(object_max_y);
        seen_any = true;
    }

    if !seen_any {
        tracing::warn!("no renderable objects are visible; cropping to the full frame");
        return Ok(Rect::new(0.0, 0.0, 1.0, 1.0));
    }

    let padded = Rect::new(
        min_x - CROP_PADDING,
        min_y - CROP_PADDING,
        max_x + CROP_PADDING,
        max_y + CROP_PADDING,
    );
    Ok(padded.intersect(Rect::new(0.0, 0.0, 1.0, 1.0)))
}
