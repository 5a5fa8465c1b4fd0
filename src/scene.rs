//! The explicit scene context threaded through every component: an owned
//! object registry with stable handles, render and sampler settings, timeline
//! markers, material variants and the compositing graph. Capture code mutates
//! this context and an external [`crate::render::Renderer`] reads it.

use std::path::{Path, PathBuf};

use glam::{DMat4, DQuat, DVec3, EulerRot};

use crate::{
    config::CaptureConfig,
    error::{IsocapError, IsocapResult},
    graph::CompositingGraph,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ObjectId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CollectionId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    Orthographic,
    Perspective,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CameraData {
    pub projection: Projection,
    pub ortho_scale: f64,
    pub clip_start: f64,
    pub clip_end: f64,
    pub shift_x: f64,
    pub shift_y: f64,
}

impl Default for CameraData {
    fn default() -> Self {
        Self {
            projection: Projection::Perspective,
            ortho_scale: 6.0,
            clip_start: 0.1,
            clip_end: 100.0,
            shift_x: 0.0,
            shift_y: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Empty,
    Camera(CameraData),
    Mesh,
    Curve,
    Surface,
    Text,
    Metaball,
}

impl ObjectKind {
    /// Kinds whose bounds participate in crop framing.
    pub fn is_renderable_geometry(&self) -> bool {
        matches!(
            self,
            ObjectKind::Mesh
                | ObjectKind::Curve
                | ObjectKind::Surface
                | ObjectKind::Text
                | ObjectKind::Metaball
        )
    }
}

/// Axis-aligned local-space bounds of an object.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoundBox {
    pub min: DVec3,
    pub max: DVec3,
}

impl BoundBox {
    pub const UNIT_CUBE: BoundBox = BoundBox {
        min: DVec3::new(-0.5, -0.5, -0.5),
        max: DVec3::new(0.5, 0.5, 0.5),
    };

    pub fn corners(&self) -> [DVec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            DVec3::new(lo.x, lo.y, lo.z),
            DVec3::new(hi.x, lo.y, lo.z),
            DVec3::new(lo.x, hi.y, lo.z),
            DVec3::new(hi.x, hi.y, lo.z),
            DVec3::new(lo.x, lo.y, hi.z),
            DVec3::new(hi.x, lo.y, hi.z),
            DVec3::new(lo.x, hi.y, hi.z),
            DVec3::new(hi.x, hi.y, hi.z),
        ]
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }
}

impl Default for BoundBox {
    fn default() -> Self {
        Self::UNIT_CUBE
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Object {
    pub name: String,
    pub kind: ObjectKind,
    pub location: DVec3,
    /// Euler XYZ rotation, radians.
    pub rotation: DVec3,
    pub scale: DVec3,
    pub parent: Option<ObjectId>,
    pub bound_box: BoundBox,
    pub hide_render: bool,
    pub hide_select: bool,
    pub hide_viewport: bool,
    pub visible_camera: bool,
}

impl Object {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            location: DVec3::ZERO,
            rotation: DVec3::ZERO,
            scale: DVec3::ONE,
            parent: None,
            bound_box: BoundBox::default(),
            hide_render: false,
            hide_select: false,
            hide_viewport: false,
            visible_camera: true,
        }
    }

    pub fn local_matrix(&self) -> DMat4 {
        DMat4::from_scale_rotation_translation(
            self.scale,
            DQuat::from_euler(
                EulerRot::XYZ,
                self.rotation.x,
                self.rotation.y,
                self.rotation.z,
            ),
            self.location,
        )
    }

    /// World-space extent along each local axis.
    pub fn dimensions(&self) -> DVec3 {
        self.bound_box.size() * self.scale
    }

    /// Scales the object so its bound box spans `dims` in world space.
    pub fn set_dimensions(&mut self, dims: DVec3) {
        let base = self.bound_box.size();
        self.scale = DVec3::new(
            if base.x != 0.0 { dims.x / base.x } else { 1.0 },
            if base.y != 0.0 { dims.y / base.y } else { 1.0 },
            if base.z != 0.0 { dims.z / base.z } else { 1.0 },
        );
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Collection {
    pub name: String,
    pub hide_render: bool,
    pub members: Vec<ObjectId>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimelineMarker {
    pub name: String,
    pub frame: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderEngine {
    PathTraced,
    Realtime,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RenderSettings {
    pub engine: RenderEngine,
    pub resolution_x: u32,
    pub resolution_y: u32,
    pub resolution_percentage: u32,
    pub film_transparent: bool,
    pub use_border: bool,
    pub use_crop_to_border: bool,
    /// Crop region in normalized camera-view coordinates.
    pub border: kurbo::Rect,
    /// Whether the renderer emits the z pass.
    pub use_pass_z: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            engine: RenderEngine::PathTraced,
            resolution_x: 1920,
            resolution_y: 1080,
            resolution_percentage: 100,
            film_transparent: false,
            use_border: false,
            use_crop_to_border: false,
            border: kurbo::Rect::new(0.0, 0.0, 1.0, 1.0),
            use_pass_z: false,
        }
    }
}

/// Path-traced sampler parameters mutated around depth captures.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SamplerSettings {
    pub max_bounces: u32,
    pub filter_width: f64,
    pub use_denoising: bool,
    pub use_adaptive_sampling: bool,
    pub samples: u32,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            max_bounces: 12,
            filter_width: 1.5,
            use_denoising: true,
            use_adaptive_sampling: true,
            samples: 128,
        }
    }
}

/// Full-scene material override applied during depth passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialOverride {
    /// Emits raw camera-space distance per shaded surface.
    CameraDistance,
    /// Emits nothing; depth comes from the z pass instead.
    Blank,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MaterialVariant {
    pub name: String,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Scene {
    /// Where the authored scene is persisted. Exports derive the object name
    /// and output directories from this path.
    pub source_path: Option<PathBuf>,

    pub objects: Vec<Object>,
    pub collections: Vec<Collection>,
    pub markers: Vec<TimelineMarker>,

    pub frame_start: i32,
    pub frame_end: i32,
    pub frame_current: i32,

    pub active_camera: Option<ObjectId>,
    pub render: RenderSettings,
    pub sampler: SamplerSettings,

    /// The override material datablock, created for the duration of an
    /// export.
    pub depth_override_material: Option<MaterialOverride>,
    /// The active view-layer override assignment.
    pub material_override: Option<MaterialOverride>,

    pub variants: Vec<MaterialVariant>,
    pub active_variant: usize,
    /// Variant currently applied to the renderable surfaces.
    pub displayed_variant: Option<usize>,

    pub compositing: Option<CompositingGraph>,
    pub config: CaptureConfig,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            source_path: None,
            objects: Vec::new(),
            collections: Vec::new(),
            markers: Vec::new(),
            frame_start: 1,
            frame_end: 1,
            frame_current: 1,
            active_camera: None,
            render: RenderSettings::default(),
            sampler: SamplerSettings::default(),
            depth_override_material: None,
            material_override: None,
            variants: Vec::new(),
            active_variant: 0,
            displayed_variant: None,
            compositing: None,
            config: CaptureConfig::default(),
        }
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> IsocapResult<()> {
        self.config.validate()?;
        if self.frame_start > self.frame_end {
            return Err(IsocapError::scene("frame range start must not exceed end"));
        }
        for object in &self.objects {
            if let Some(parent) = object.parent {
                if parent.0 as usize >= self.objects.len() {
                    return Err(IsocapError::scene(format!(
                        "object '{}' references missing parent {:?}",
                        object.name, parent
                    )));
                }
            }
        }
        if let Some(camera) = self.active_camera {
            if camera.0 as usize >= self.objects.len() {
                return Err(IsocapError::scene("active camera id is out of range"));
            }
        }
        if !self.variants.is_empty() && self.active_variant >= self.variants.len() {
            return Err(IsocapError::scene("active variant index is out of range"));
        }
        Ok(())
    }

    pub fn object(&self, id: ObjectId) -> &Object {
        &self.objects[id.0 as usize]
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut Object {
        &mut self.objects[id.0 as usize]
    }

    pub fn find_object(&self, name: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .position(|o| o.name == name)
            .map(|i| ObjectId(i as u32))
    }

    pub fn add_object(&mut self, object: Object) -> IsocapResult<ObjectId> {
        if self.find_object(&object.name).is_some() {
            return Err(IsocapError::scene(format!(
                "object name '{}' already exists",
                object.name
            )));
        }
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(object);
        Ok(id)
    }

    pub fn iter_objects(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(i, o)| (ObjectId(i as u32), o))
    }

    pub fn collection(&self, id: CollectionId) -> &Collection {
        &self.collections[id.0 as usize]
    }

    pub fn find_collection(&self, name: &str) -> Option<CollectionId> {
        self.collections
            .iter()
            .position(|c| c.name == name)
            .map(|i| CollectionId(i as u32))
    }

    pub fn add_collection(&mut self, name: impl Into<String>, hide_render: bool) -> CollectionId {
        let id = CollectionId(self.collections.len() as u32);
        self.collections.push(Collection {
            name: name.into(),
            hide_render,
            members: Vec::new(),
        });
        id
    }

    pub fn link_to_collection(&mut self, collection: CollectionId, object: ObjectId) {
        let members = &mut self.collections[collection.0 as usize].members;
        if !members.contains(&object) {
            members.push(object);
        }
    }

    /// World matrix from the parent chain. Always computed from current
    /// transforms, so rig rotations are visible immediately.
    pub fn world_matrix(&self, id: ObjectId) -> DMat4 {
        let object = self.object(id);
        let local = object.local_matrix();
        match object.parent {
            Some(parent) => self.world_matrix(parent) * local,
            None => local,
        }
    }

    pub fn frame_set(&mut self, frame: i32) {
        self.frame_current = frame;
    }

    /// The marker placed at `frame`, if any. With several markers on one
    /// frame the last one wins.
    pub fn marker_at(&self, frame: i32) -> Option<&TimelineMarker> {
        self.markers.iter().filter(|m| m.frame == frame).next_back()
    }

    /// Display name of a frame: its marker name, or the frame number.
    pub fn frame_display_name(&self, frame: i32) -> String {
        match self.marker_at(frame) {
            Some(marker) => marker.name.clone(),
            None => frame.to_string(),
        }
    }

    /// Name the export is published under, derived from the source file stem.
    pub fn object_name(&self) -> IsocapResult<String> {
        let path = self.source_path.as_deref().ok_or_else(|| {
            IsocapError::precondition("the scene has not been saved to a file")
        })?;
        match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) if !stem.is_empty() => Ok(stem.to_string()),
            _ => Err(IsocapError::precondition(
                "the scene file path has no usable name",
            )),
        }
    }

    /// Directory holding the scene file; all outputs land next to it.
    pub fn source_dir(&self) -> IsocapResult<&Path> {
        let path = self.source_path.as_deref().ok_or_else(|| {
            IsocapError::precondition("the scene has not been saved to a file")
        })?;
        path.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| IsocapError::precondition("the scene file path has no directory"))
    }

    pub fn display_variant(&mut self, index: usize) -> IsocapResult<()> {
        if index >= self.variants.len() {
            return Err(IsocapError::scene(format!(
                "variant index {index} is out of range"
            )));
        }
        self.displayed_variant = Some(index);
        Ok(())
    }

    /// Projects a world-space point into normalized camera-view coordinates
    /// for the given camera: x/y in [0, 1] across the view frame, z the
    /// distance in front of the camera.
    pub fn world_to_camera_view(&self, camera: ObjectId, point: DVec3) -> IsocapResult<DVec3> {
        let object = self.object(camera);
        let ObjectKind::Camera(data) = &object.kind else {
            return Err(IsocapError::scene(format!(
                "object '{}' is not a camera",
                object.name
            )));
        };
        if data.projection != Projection::Orthographic {
            return Err(IsocapError::scene(
                "view projection requires an orthographic camera",
            ));
        }

        let local = self.world_matrix(camera).inverse().transform_point3(point);
        let (frame_width, frame_height) = self.ortho_view_frame(data);
        Ok(DVec3::new(
            local.x / frame_width + 0.5,
            local.y / frame_height + 0.5,
            -local.z,
        ))
    }

    /// View-frame extents of an orthographic camera: the larger render axis
    /// spans the ortho scale, the other is shrunk by the aspect ratio.
    fn ortho_view_frame(&self, camera: &CameraData) -> (f64, f64) {
        let res_x = self.render.resolution_x as f64;
        let res_y = self.render.resolution_y as f64;
        let scale = camera.ortho_scale;
        if res_x >= res_y {
            (scale, scale * res_y / res_x)
        } else {
            (scale * res_x / res_y, scale)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ortho_camera(scale: f64) -> Object {
        Object::new(
            "cam",
            ObjectKind::Camera(CameraData {
                projection: Projection::Orthographic,
                ortho_scale: scale,
                clip_start: 0.1,
                clip_end: 100.0,
                shift_x: 0.0,
                shift_y: 0.0,
            }),
        )
    }

    #[test]
    fn add_object_rejects_duplicate_names() {
        let mut scene = Scene::new();
        scene.add_object(Object::new("a", ObjectKind::Mesh)).unwrap();
        assert!(scene.add_object(Object::new("a", ObjectKind::Mesh)).is_err());
    }

    #[test]
    fn world_matrix_composes_parent_chain() {
        let mut scene = Scene::new();
        let mut parent = Object::new("parent", ObjectKind::Empty);
        parent.rotation = DVec3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        let parent_id = scene.add_object(parent).unwrap();

        let mut child = Object::new("child", ObjectKind::Mesh);
        child.location = DVec3::new(1.0, 0.0, 0.0);
        child.parent = Some(parent_id);
        let child_id = scene.add_object(child).unwrap();

        let world = scene.world_matrix(child_id).transform_point3(DVec3::ZERO);
        assert!((world - DVec3::new(0.0, 1.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn marker_lookup_prefers_last_and_falls_back_to_number() {
        let mut scene = Scene::new();
        scene.markers.push(TimelineMarker {
            name: "walk".to_string(),
            frame: 3,
        });
        scene.markers.push(TimelineMarker {
            name: "run".to_string(),
            frame: 3,
        });
        assert_eq!(scene.frame_display_name(3), "run");
        assert_eq!(scene.frame_display_name(4), "4");
    }

    #[test]
    fn object_name_requires_saved_scene() {
        let mut scene = Scene::new();
        assert!(matches!(
            scene.object_name(),
            Err(IsocapError::Precondition(_))
        ));
        scene.source_path = Some(PathBuf::from("/work/sofa.scene.json"));
        assert_eq!(scene.object_name().unwrap(), "sofa.scene");
    }

    #[test]
    fn camera_view_centers_the_origin() {
        let mut scene = Scene::new();
        let mut camera = ortho_camera(4.0);
        camera.location = DVec3::new(0.0, 0.0, 10.0);
        let camera_id = scene.add_object(camera).unwrap();
        scene.render.resolution_x = 100;
        scene.render.resolution_y = 100;

        let view = scene
            .world_to_camera_view(camera_id, DVec3::ZERO)
            .unwrap();
        assert!((view.x - 0.5).abs() < 1e-9);
        assert!((view.y - 0.5).abs() < 1e-9);
        assert!((view.z - 10.0).abs() < 1e-9);
    }

    #[test]
    fn camera_view_maps_frame_edges_to_unit_range() {
        let mut scene = Scene::new();
        let mut camera = ortho_camera(4.0);
        camera.location = DVec3::new(0.0, 0.0, 10.0);
        let camera_id = scene.add_object(camera).unwrap();
        scene.render.resolution_x = 200;
        scene.render.resolution_y = 100;

        // Wide frame: x spans the ortho scale, y spans half of it.
        let right = scene
            .world_to_camera_view(camera_id, DVec3::new(2.0, 0.0, 0.0))
            .unwrap();
        assert!((right.x - 1.0).abs() < 1e-9);

        let top = scene
            .world_to_camera_view(camera_id, DVec3::new(0.0, 1.0, 0.0))
            .unwrap();
        assert!((top.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn set_dimensions_scales_the_unit_cube() {
        let mut object = Object::new("bounds", ObjectKind::Mesh);
        object.set_dimensions(DVec3::new(2.0, 3.0, 4.0));
        assert_eq!(object.scale, DVec3::new(2.0, 3.0, 4.0));
        assert_eq!(object.dimensions(), DVec3::new(2.0, 3.0, 4.0));
    }
}
