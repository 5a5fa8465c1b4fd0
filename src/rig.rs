//! Capture rig: the rotation origin, orthographic camera and bounding proxy
//! that implement the isometric projection, plus the render-resolution
//! derivation. All creation is idempotent and keyed by object name.

use std::f64::consts::{FRAC_1_SQRT_2, SQRT_2};

use glam::DVec3;

use crate::{
    config::{Direction, FootprintDimensions},
    error::{IsocapError, IsocapResult},
    scene::{
        BoundBox, CameraData, CollectionId, Object, ObjectId, ObjectKind, Projection, Scene,
    },
};

pub const ROTATION_ORIGIN: &str = "Sprite Rotation Origin";
pub const RIG_CAMERA: &str = "Sprite Camera";
pub const BOUNDS_PROXY: &str = "Sprite Object Bounds";
pub const RIG_COLLECTION: &str = "Sprite Rig";

/// Tallest renderable object, in tiles.
const MAX_OBJECT_HEIGHT: f64 = 4.0;
/// Sprite content width before padding, in pixels.
const BASE_IMAGE_WIDTH: f64 = 128.0;
const PADDED_IMAGE_WIDTH: f64 = BASE_IMAGE_WIDTH + 8.0;
/// Camera offset from the rig origin along x and -y, in tiles.
const DISTANCE_IN_TILES: f64 = 17.0;

/// Pixels a tile's half width occupies in the sprite sheet.
const TILE_WIDTH_HALF: u32 = 64;
const BASE_SPRITE_WIDTH: u32 = 136;
const BASE_SPRITE_HEIGHT: u32 = 384;

/// The rig objects. The rig counts as set up iff the rotation origin exists.
#[derive(Clone, Copy, Debug)]
pub struct RigState {
    pub origin: ObjectId,
    pub camera: ObjectId,
    pub bounds_proxy: ObjectId,
    pub collection: CollectionId,
}

/// Orthographic scale fitting a footprint. The base constant fits a 1x1
/// tile at the padded sprite width; every extra tile widens the view by
/// half a tile diagonal.
pub fn ortho_scale(footprint: FootprintDimensions) -> f64 {
    let base = (2.0 - BASE_IMAGE_WIDTH / PADDED_IMAGE_WIDTH) * MAX_OBJECT_HEIGHT;
    base + f64::from(footprint.extra_tiles()) * FRAC_1_SQRT_2
}

/// Render resolution for a footprint. Width and height grow together so the
/// image stays proportional; a wider-than-tall image would throw off the
/// orthographic scale fit.
pub fn sprite_resolution(footprint: FootprintDimensions) -> (u32, u32) {
    let extra = footprint.extra_tiles() * TILE_WIDTH_HALF;
    (BASE_SPRITE_WIDTH + extra, BASE_SPRITE_HEIGHT + extra)
}

pub fn is_rig_present(scene: &Scene) -> bool {
    scene.find_object(ROTATION_ORIGIN).is_some()
}

/// Creates whatever rig objects are missing and re-derives their geometry
/// from the configured footprint. Safe to call repeatedly; existing objects
/// are reused, never duplicated.
pub fn ensure_rig(scene: &mut Scene) -> IsocapResult<RigState> {
    scene.config.footprint.validate()?;
    let footprint = scene.config.footprint;

    let collection = match scene.find_collection(RIG_COLLECTION) {
        Some(id) => id,
        None => scene.add_collection(RIG_COLLECTION, true),
    };

    let origin = match scene.find_object(ROTATION_ORIGIN) {
        Some(id) => id,
        None => {
            let mut object = Object::new(ROTATION_ORIGIN, ObjectKind::Empty);
            object.hide_select = true;
            object.hide_viewport = true;
            object.hide_render = true;
            let id = scene.add_object(object)?;
            scene.link_to_collection(collection, id);
            id
        }
    };

    let camera = match scene.find_object(RIG_CAMERA) {
        Some(id) => id,
        None => {
            let mut object = Object::new(RIG_CAMERA, ObjectKind::Camera(CameraData::default()));
            object.hide_select = true;
            object.hide_viewport = true;
            object.hide_render = true;
            let id = scene.add_object(object)?;
            scene.link_to_collection(collection, id);
            id
        }
    };

    let tile_height = (2.0f64 / 3.0).sqrt();
    let camera_height = DISTANCE_IN_TILES * tile_height + MAX_OBJECT_HEIGHT / 2.0;

    {
        let object = scene.object_mut(camera);
        object.parent = Some(origin);
        object.location = DVec3::new(DISTANCE_IN_TILES, -DISTANCE_IN_TILES, camera_height);
        object.rotation = DVec3::new(60f64.to_radians(), 0.0, 45f64.to_radians());
        object.kind = ObjectKind::Camera(CameraData {
            projection: Projection::Orthographic,
            ortho_scale: ortho_scale(footprint),
            clip_start: 5.0,
            clip_end: SQRT_2 * DISTANCE_IN_TILES * 2.0,
            shift_x: 0.0,
            shift_y: 0.0,
        });
    }

    let bounds_proxy = match scene.find_object(BOUNDS_PROXY) {
        Some(id) => id,
        None => {
            let mut object = Object::new(BOUNDS_PROXY, ObjectKind::Mesh);
            object.bound_box = BoundBox::UNIT_CUBE;
            object.hide_select = true;
            object.hide_viewport = true;
            object.hide_render = true;
            let id = scene.add_object(object)?;
            scene.link_to_collection(collection, id);
            id
        }
    };

    {
        let object = scene.object_mut(bounds_proxy);
        object.location = DVec3::new(0.0, 0.0, MAX_OBJECT_HEIGHT / 2.0);
        object.set_dimensions(DVec3::new(
            f64::from(footprint.x),
            f64::from(footprint.y),
            MAX_OBJECT_HEIGHT,
        ));
    }

    Ok(RigState {
        origin,
        camera,
        bounds_proxy,
        collection,
    })
}

/// Writes the footprint's sprite resolution into the render settings and
/// makes the rig camera the active camera.
pub fn apply_resolution_and_camera(scene: &mut Scene) -> IsocapResult<()> {
    let camera = scene.find_object(RIG_CAMERA).ok_or_else(|| {
        IsocapError::precondition("the capture rig is not set up")
    })?;
    let (width, height) = sprite_resolution(scene.config.footprint);
    scene.render.resolution_x = width;
    scene.render.resolution_y = height;
    scene.active_camera = Some(camera);
    Ok(())
}

/// Rotates the rig to a compass direction.
pub fn set_view(scene: &mut Scene, direction: Direction) -> IsocapResult<()> {
    let origin = scene.find_object(ROTATION_ORIGIN).ok_or_else(|| {
        IsocapError::precondition("the capture rig is not set up")
    })?;
    scene.object_mut(origin).rotation =
        DVec3::new(0.0, 0.0, direction.angle_degrees().to_radians());
    Ok(())
}
