//! The object-description manifest: the JSON file the asset compiler reads
//! to map rendered frames onto sprite and palette identifiers.

use std::path::PathBuf;

use anyhow::Context as _;

use crate::{error::IsocapResult, scene::Scene};

pub const MANIFEST_SUFFIX: &str = " - object description.json";

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ObjectDescription {
    pub dimensions: Dimensions,
    pub frames: Vec<FrameEntry>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Dimensions {
    pub x: u32,
    pub y: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameEntry {
    pub name: String,
    pub sprite_id: i32,
    pub sprite_id_reverse_x: bool,
    pub sprite_id_reverse_y: bool,
    pub palette_id: i32,
}

/// Builds the manifest from the observed frame range: one entry per frame,
/// in order, with marker names where they exist.
pub fn build(scene: &Scene) -> ObjectDescription {
    let config = &scene.config;
    let mut frames = Vec::new();

    for frame in config.observed_frame_start..=config.observed_frame_end {
        let ids = config.ids_for_frame(frame);
        frames.push(FrameEntry {
            name: scene.frame_display_name(frame),
            sprite_id: ids.sprite_id,
            sprite_id_reverse_x: ids.sprite_id_reverse_x,
            sprite_id_reverse_y: ids.sprite_id_reverse_y,
            palette_id: ids.palette_id,
        });
    }

    ObjectDescription {
        dimensions: Dimensions {
            x: config.footprint.x,
            y: config.footprint.y,
        },
        frames,
    }
}

pub fn manifest_path(scene: &Scene) -> IsocapResult<PathBuf> {
    let name = scene.object_name()?;
    Ok(scene.source_dir()?.join(format!("{name}{MANIFEST_SUFFIX}")))
}

/// Writes the manifest next to the scene source file and returns its path.
pub fn write(scene: &Scene) -> IsocapResult<PathBuf> {
    let path = manifest_path(scene)?;
    let description = build(scene);
    let file = std::fs::File::create(&path)
        .with_context(|| format!("create manifest '{}'", path.display()))?;
    serde_json::to_writer_pretty(file, &description)
        .with_context(|| format!("write manifest '{}'", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{config::FrameIds, scene::TimelineMarker};

    fn scene_with_range(start: i32, end: i32) -> Scene {
        let mut scene = Scene::new();
        scene.config.observed_frame_start = start;
        scene.config.observed_frame_end = end;
        scene
    }

    #[test]
    fn manifest_covers_the_observed_range_in_order() {
        let mut scene = scene_with_range(1, 3);
        scene.markers.push(TimelineMarker {
            name: "open".to_string(),
            frame: 2,
        });

        let description = build(&scene);
        let names: Vec<&str> = description.frames.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["1", "open", "3"]);
    }

    #[test]
    fn manifest_reads_per_frame_id_overrides() {
        let mut scene = scene_with_range(1, 2);
        scene.config.default_ids.sprite_id = 10;
        scene.config.frame_ids.insert(
            2,
            FrameIds {
                sprite_id: 42,
                sprite_id_reverse_y: true,
                palette_id: 3,
                ..FrameIds::default()
            },
        );

        let description = build(&scene);
        assert_eq!(description.frames[0].sprite_id, 10);
        assert_eq!(description.frames[1].sprite_id, 42);
        assert!(description.frames[1].sprite_id_reverse_y);
        assert_eq!(description.frames[1].palette_id, 3);
    }

    #[test]
    fn manifest_json_matches_the_compiler_contract() {
        let mut scene = scene_with_range(1, 1);
        scene.config.footprint = crate::config::FootprintDimensions::new(2, 1).unwrap();

        let json = serde_json::to_value(build(&scene)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "dimensions": {"x": 2, "y": 1},
                "frames": [{
                    "name": "1",
                    "sprite_id": 0,
                    "sprite_id_reverse_x": false,
                    "sprite_id_reverse_y": false,
                    "palette_id": 0,
                }],
            })
        );
    }

    #[test]
    fn write_places_the_manifest_next_to_the_scene() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = scene_with_range(1, 1);
        scene.source_path = Some(dir.path().join("lamp.json"));

        let path = write(&scene).unwrap();
        assert_eq!(path, dir.path().join("lamp - object description.json"));

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: ObjectDescription = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, build(&scene));
    }
}
