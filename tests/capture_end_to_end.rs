mod common;

use std::path::Path;

use glam::DVec3;
use pretty_assertions::assert_eq;

use common::StubRenderer;
use isocap::{
    manifest, pipeline,
    scene::{Object, ObjectKind, Scene},
};

fn export_scene(dir: &Path) -> Scene {
    let mut scene = Scene::new();
    scene.source_path = Some(dir.join("toaster.json"));

    let mut cube = Object::new("toaster body", ObjectKind::Mesh);
    cube.location = DVec3::new(0.0, 0.0, 0.5);
    scene.add_object(cube).unwrap();

    scene
}

fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn single_frame_export_produces_the_full_file_set() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = export_scene(dir.path());
    let mut renderer = StubRenderer::new();

    let summary = pipeline::render_sprites(&mut scene, &mut renderer, None).unwrap();
    assert_eq!(summary.frames, 1);
    assert_eq!(summary.captures, 4);

    let frame_dir = dir.path().join("toaster - full sprites").join("1");
    let files = list_files(&frame_dir);

    let color = files.iter().filter(|f| f.ends_with("_color.png")).count();
    let alpha = files.iter().filter(|f| f.ends_with("_alpha.exr")).count();
    let depth = files.iter().filter(|f| f.contains("_depth")).count();
    assert_eq!(color, 4);
    assert_eq!(alpha, 4);
    // 4 directions x 3 tiers, doubled by the extra sweep.
    assert_eq!(depth, 24);
    assert_eq!(files.len(), 32);

    // 4 x (6 depth renders + 1 color/alpha render).
    assert_eq!(renderer.calls, 28);
}

#[test]
fn high_precision_depth_halves_the_depth_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = export_scene(dir.path());
    scene.config.high_precision_depth = true;
    let mut renderer = StubRenderer::new();

    pipeline::render_sprites(&mut scene, &mut renderer, None).unwrap();

    let frame_dir = dir.path().join("toaster - full sprites").join("1");
    let files = list_files(&frame_dir);
    let depth = files.iter().filter(|f| f.contains("_depth")).count();
    assert_eq!(depth, 12);
    assert!(!files.iter().any(|f| f.contains("_depth_extra")));
    assert_eq!(renderer.calls, 16);
}

#[test]
fn export_matches_its_own_plan_and_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = export_scene(dir.path());

    let planned: Vec<String> = pipeline::planned_files(&scene)
        .unwrap()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    let mut planned_sorted = planned.clone();
    planned_sorted.sort();

    let mut renderer = StubRenderer::new();
    pipeline::render_sprites(&mut scene, &mut renderer, None).unwrap();
    let frame_dir = dir.path().join("toaster - full sprites").join("1");
    let first_run = list_files(&frame_dir);
    assert_eq!(first_run, planned_sorted);

    // A second run overwrites in place: same names, nothing extra.
    pipeline::render_sprites(&mut scene, &mut renderer, None).unwrap();
    assert_eq!(list_files(&frame_dir), first_run);
}

#[test]
fn color_outputs_are_valid_png_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = export_scene(dir.path());
    let mut renderer = StubRenderer::new();
    pipeline::render_sprites(&mut scene, &mut renderer, None).unwrap();

    let color_path = dir
        .path()
        .join("toaster - full sprites")
        .join("1")
        .join("nw_color.png");
    let decoded = image::open(&color_path).unwrap();
    assert_eq!(decoded.width(), 1);
}

#[test]
fn marker_names_become_frame_directories() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = export_scene(dir.path());
    scene.frame_end = 2;
    scene.markers.push(isocap::scene::TimelineMarker {
        name: "closed".to_string(),
        frame: 1,
    });

    let mut renderer = StubRenderer::new();
    let summary = pipeline::render_sprites(&mut scene, &mut renderer, None).unwrap();
    assert_eq!(summary.frames, 2);

    let sheet_dir = dir.path().join("toaster - full sprites");
    assert!(sheet_dir.join("closed").is_dir());
    assert!(sheet_dir.join("2").is_dir());
}

#[test]
fn frame_directories_are_cleared_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = export_scene(dir.path());
    let mut renderer = StubRenderer::new();

    pipeline::render_sprites(&mut scene, &mut renderer, None).unwrap();
    let frame_dir = dir.path().join("toaster - full sprites").join("1");
    std::fs::write(frame_dir.join("stale_artifact.txt"), b"old").unwrap();

    pipeline::render_sprites(&mut scene, &mut renderer, None).unwrap();
    assert!(!frame_dir.join("stale_artifact.txt").exists());
}

#[test]
fn manifest_describes_the_exported_range() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = export_scene(dir.path());
    let mut renderer = StubRenderer::new();
    pipeline::render_sprites(&mut scene, &mut renderer, None).unwrap();

    let path = manifest::write(&scene).unwrap();
    assert_eq!(
        path,
        dir.path().join("toaster - object description.json")
    );

    let parsed: manifest::ObjectDescription =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(parsed.dimensions, manifest::Dimensions { x: 1, y: 1 });
    assert_eq!(parsed.frames.len(), 1);
    assert_eq!(parsed.frames[0].name, "1");
}

#[test]
fn variant_export_fans_out_into_separate_sheets() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = export_scene(dir.path());
    scene.variants = vec![
        isocap::scene::MaterialVariant {
            name: "chrome".to_string(),
        },
        isocap::scene::MaterialVariant {
            name: "matte".to_string(),
        },
    ];
    scene.config.render_all_variants = true;

    let mut renderer = StubRenderer::new();
    let summary = pipeline::render_sprites(&mut scene, &mut renderer, None).unwrap();
    assert_eq!(summary.frames, 2);
    assert_eq!(summary.captures, 8);

    assert!(dir.path().join("toaster - chrome - full sprites").is_dir());
    assert!(dir.path().join("toaster - matte - full sprites").is_dir());
    // The displayed variant is put back after the export.
    assert_eq!(scene.displayed_variant, None);
}

#[test]
fn only_the_active_variant_renders_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let mut scene = export_scene(dir.path());
    scene.variants = vec![
        isocap::scene::MaterialVariant {
            name: "chrome".to_string(),
        },
        isocap::scene::MaterialVariant {
            name: "matte".to_string(),
        },
    ];
    scene.active_variant = 1;

    let mut renderer = StubRenderer::new();
    pipeline::render_sprites(&mut scene, &mut renderer, None).unwrap();

    assert!(!dir.path().join("toaster - chrome - full sprites").exists());
    assert!(dir.path().join("toaster - matte - full sprites").is_dir());
}
