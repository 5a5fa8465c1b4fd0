//! Top-level export sequencing: preconditions, global state save/restore,
//! the frame-range walk with per-direction captures, material-variant
//! fan-out, and the best-effort handoff to the asset compiler.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::{
    capture,
    compiler::{AssetCompiler, CompilerOutcome},
    config::{Direction, ResolutionTier},
    error::{IsocapError, IsocapResult},
    graph, manifest,
    render::Renderer,
    rig,
    scene::{MaterialOverride, RenderEngine, Scene},
    snapshot::{RenderSetting, SettingsSnapshot},
};

/// Directory suffix of an object's rendered sprite sheets.
pub const SPRITES_SUFFIX: &str = " - full sprites";

/// Global render state saved around a whole export. The resolution
/// percentage is excluded: each capture restores it itself.
const GLOBAL_RENDER_SETTINGS: [RenderSetting; 9] = [
    RenderSetting::FrameCurrent,
    RenderSetting::FilmTransparent,
    RenderSetting::UsePassZ,
    RenderSetting::ActiveCamera,
    RenderSetting::ResolutionX,
    RenderSetting::ResolutionY,
    RenderSetting::UseBorder,
    RenderSetting::UseCropToBorder,
    RenderSetting::Border,
];

/// One chained compiler invocation in an export summary.
#[derive(Debug)]
pub struct CompilerStep {
    pub step: &'static str,
    pub variant: Option<String>,
    pub outcome: CompilerOutcome,
}

#[derive(Debug, Default)]
pub struct ExportSummary {
    /// Frame visits across all variants.
    pub frames: usize,
    /// Rotations captured.
    pub captures: usize,
    pub compiler_steps: Vec<CompilerStep>,
}

/// Prepares a fresh scene for capturing: resets the frame range to a single
/// frame and builds the rig and compositing graph.
pub fn setup(scene: &mut Scene) -> IsocapResult<()> {
    scene.frame_start = 1;
    scene.frame_end = 1;
    rig::ensure_rig(scene)?;
    graph::ensure_graph(scene)?;
    Ok(())
}

/// Renders every frame in the authored range for every enabled direction,
/// fanning out over material variants when the scene defines them, and runs
/// the configured compiler chain afterwards.
///
/// All renderer state touched by the export is restored before returning,
/// also when a capture fails partway.
#[tracing::instrument(skip_all)]
pub fn render_sprites(
    scene: &mut Scene,
    renderer: &mut dyn Renderer,
    compiler: Option<&AssetCompiler>,
) -> IsocapResult<ExportSummary> {
    if scene.render.engine != RenderEngine::PathTraced {
        return Err(IsocapError::precondition(
            "rendering requires the path-traced engine",
        ));
    }
    let object_name = scene.object_name()?;
    scene.validate()?;
    if scene.config.auto_split && compiler.is_none() {
        return Err(IsocapError::precondition(
            "auto split requires a configured asset compiler",
        ));
    }

    let rig_state = rig::ensure_rig(scene)?;
    graph::ensure_graph(scene)?;

    if !scene.variants.is_empty() && scene.active_variant >= scene.variants.len() {
        scene.active_variant = scene.variants.len() - 1;
    }

    let original_rotation = scene.object(rig_state.origin).rotation;
    let original_displayed = scene.displayed_variant;
    let global = SettingsSnapshot::capture(scene, &GLOBAL_RENDER_SETTINGS);

    let result = export_body(scene, renderer, &object_name);

    global.restore(scene)?;
    scene.object_mut(rig_state.origin).rotation = original_rotation;
    scene.displayed_variant = original_displayed;
    scene.depth_override_material = None;
    scene.material_override = None;

    let (frames, captures) = result?;
    let mut summary = ExportSummary {
        frames,
        captures,
        compiler_steps: Vec::new(),
    };

    if scene.config.auto_split {
        if let Some(compiler) = compiler {
            summary.compiler_steps = split_sprites(scene, compiler)?;
        }
    }

    Ok(summary)
}

fn export_body(
    scene: &mut Scene,
    renderer: &mut dyn Renderer,
    object_name: &str,
) -> IsocapResult<(usize, usize)> {
    scene.render.film_transparent = true;
    scene.render.use_pass_z = true;
    scene.render.use_border = true;
    scene.render.use_crop_to_border = false;
    rig::apply_resolution_and_camera(scene)?;

    scene.depth_override_material = Some(if scene.config.high_precision_depth {
        MaterialOverride::Blank
    } else {
        MaterialOverride::CameraDistance
    });

    let mut frames = 0;
    let mut captures = 0;

    if scene.variants.is_empty() {
        let (f, c) = render_frames(scene, renderer, object_name)?;
        frames += f;
        captures += c;
    } else {
        let variant_names: Vec<String> =
            scene.variants.iter().map(|v| v.name.clone()).collect();
        for (index, variant_name) in variant_names.iter().enumerate() {
            if !scene.config.render_all_variants && index != scene.active_variant {
                continue;
            }
            scene.display_variant(index)?;
            let (f, c) = render_frames(
                scene,
                renderer,
                &format!("{object_name} - {variant_name}"),
            )?;
            frames += f;
            captures += c;
        }
    }

    Ok((frames, captures))
}

/// Walks the authored frame range once for one object (or variant) name.
/// Widens the persisted observed range first, clears each frame's output
/// directory, then captures every enabled direction in fixed order.
pub fn render_frames(
    scene: &mut Scene,
    renderer: &mut dyn Renderer,
    object_name: &str,
) -> IsocapResult<(usize, usize)> {
    let (frame_start, frame_end) = (scene.frame_start, scene.frame_end);
    scene.config.widen_observed_range(frame_start, frame_end);

    let sheet_dir = scene
        .source_dir()?
        .join(format!("{object_name}{SPRITES_SUFFIX}"));

    let mut frames = 0;
    let mut captures = 0;
    let mut seen_names = BTreeSet::new();

    for frame in frame_start..=frame_end {
        scene.frame_set(frame);
        let frame_name = scene.frame_display_name(frame);
        if !seen_names.insert(frame_name.clone()) {
            tracing::warn!(
                frame,
                name = %frame_name,
                "frame name collides with an earlier frame; its output will be overwritten"
            );
        }

        let frame_dir = sheet_dir.join(&frame_name);
        if frame_dir.is_dir() {
            std::fs::remove_dir_all(&frame_dir).with_context(|| {
                format!("clear frame directory '{}'", frame_dir.display())
            })?;
        }
        std::fs::create_dir_all(&frame_dir).with_context(|| {
            format!("create frame directory '{}'", frame_dir.display())
        })?;

        for direction in scene.config.directions.enabled() {
            capture::capture_rotation(scene, renderer, direction, &frame_dir)?;
            captures += 1;
        }
        frames += 1;
    }

    Ok((frames, captures))
}

/// Writes the manifest and splits the rendered sheets into sprites, then
/// follows the configured chain (update-xml, compile). Failed steps are
/// recorded, not raised.
pub fn split_sprites(
    scene: &Scene,
    compiler: &AssetCompiler,
) -> IsocapResult<Vec<CompilerStep>> {
    let object_name = scene.object_name()?;
    let source_dir = scene.source_dir()?.to_path_buf();

    manifest::write(scene)?;

    let mut steps = Vec::new();
    if scene.variants.is_empty() {
        let outcome = compiler.split(&source_dir, &object_name, None)?;
        steps.push(CompilerStep {
            step: "split",
            variant: None,
            outcome,
        });
    } else {
        for (index, variant) in scene.variants.iter().enumerate() {
            if !scene.config.render_all_variants && index != scene.active_variant {
                continue;
            }
            let outcome =
                compiler.split(&source_dir, &object_name, Some(&variant.name))?;
            steps.push(CompilerStep {
                step: "split",
                variant: Some(variant.name.clone()),
                outcome,
            });
        }
    }

    if scene.config.auto_update_xml {
        steps.extend(update_xml(scene, compiler)?);
    } else if scene.config.auto_compile {
        steps.extend(compile_steps(scene, compiler)?);
    }

    Ok(steps)
}

/// Updates the object XML with the split sprites, following the compile
/// chain when configured.
pub fn update_xml(
    scene: &Scene,
    compiler: &AssetCompiler,
) -> IsocapResult<Vec<CompilerStep>> {
    let object_name = scene.object_name()?;
    let source_dir = scene.source_dir()?;

    let variant_name = scene.variants.first().map(|v| v.name.clone());
    let outcome = compiler.update_xml(source_dir, &object_name, variant_name.as_deref())?;

    let mut steps = vec![CompilerStep {
        step: "update-xml",
        variant: variant_name,
        outcome,
    }];

    if scene.config.auto_compile {
        steps.extend(compile_steps(scene, compiler)?);
    }

    Ok(steps)
}

fn compile_steps(
    scene: &Scene,
    compiler: &AssetCompiler,
) -> IsocapResult<Vec<CompilerStep>> {
    if scene.config.advanced_compile {
        compile_advanced_object(scene, compiler)
    } else {
        compile_object(scene, compiler).map(|step| vec![step])
    }
}

/// Compiles the object XML into the final archive.
pub fn compile_object(
    scene: &Scene,
    compiler: &AssetCompiler,
) -> IsocapResult<CompilerStep> {
    let object_name = scene.object_name()?;
    let xml_path = scene.source_dir()?.join(format!("{object_name}.xml"));
    let outcome = compiler.compile(&xml_path)?;
    Ok(CompilerStep {
        step: "compile",
        variant: None,
        outcome,
    })
}

/// Advanced compile, once per selected variant when the scene defines them.
pub fn compile_advanced_object(
    scene: &Scene,
    compiler: &AssetCompiler,
) -> IsocapResult<Vec<CompilerStep>> {
    let object_name = scene.object_name()?;
    let source_dir = scene.source_dir()?;
    let config = &scene.config;

    let mut steps = Vec::new();
    if scene.variants.is_empty() {
        let outcome = compiler.compile_advanced(
            source_dir,
            &config.format_string,
            &config.creator_name,
            &object_name,
            None,
        )?;
        steps.push(CompilerStep {
            step: "compile-advanced",
            variant: None,
            outcome,
        });
    } else {
        let first_variant = scene.variants[0].name.clone();
        for (index, variant) in scene.variants.iter().enumerate() {
            if !config.compile_all_variants && index != scene.active_variant {
                continue;
            }
            let outcome = compiler.compile_advanced(
                source_dir,
                &config.format_string,
                &config.creator_name,
                &object_name,
                Some((&first_variant, &variant.name)),
            )?;
            steps.push(CompilerStep {
                step: "compile-advanced",
                variant: Some(variant.name.clone()),
                outcome,
            });
        }
    }

    Ok(steps)
}

/// Adds the four rotations to the object XML's draw groups.
pub fn add_rotations(
    scene: &Scene,
    compiler: &AssetCompiler,
) -> IsocapResult<CompilerStep> {
    let object_name = scene.object_name()?;
    let xml_path = scene.source_dir()?.join(format!("{object_name}.xml"));
    let outcome = compiler.add_rotations(&xml_path)?;
    Ok(CompilerStep {
        step: "add-rotations",
        variant: None,
        outcome,
    })
}

/// Every file a full export of the current configuration would produce, in
/// capture order. Deterministic: repeated exports write the same set.
pub fn planned_files(scene: &Scene) -> IsocapResult<Vec<PathBuf>> {
    let object_name = scene.object_name()?;
    let source_dir = scene.source_dir()?;

    let mut sheet_names = Vec::new();
    if scene.variants.is_empty() {
        sheet_names.push(object_name.clone());
    } else {
        for (index, variant) in scene.variants.iter().enumerate() {
            if !scene.config.render_all_variants && index != scene.active_variant {
                continue;
            }
            sheet_names.push(format!("{object_name} - {}", variant.name));
        }
    }

    let mut files = Vec::new();
    for sheet_name in &sheet_names {
        let sheet_dir = source_dir.join(format!("{sheet_name}{SPRITES_SUFFIX}"));
        for frame in scene.frame_start..=scene.frame_end {
            let frame_dir = sheet_dir.join(scene.frame_display_name(frame));
            for direction in scene.config.directions.enabled() {
                push_direction_files(&mut files, &frame_dir, direction, scene);
            }
        }
    }
    Ok(files)
}

fn push_direction_files(
    files: &mut Vec<PathBuf>,
    frame_dir: &Path,
    direction: Direction,
    scene: &Scene,
) {
    for tier in ResolutionTier::ALL {
        files.push(frame_dir.join(format!(
            "{}_{}_depth.exr",
            tier.label(),
            direction.label()
        )));
    }
    if !scene.config.high_precision_depth {
        for tier in ResolutionTier::ALL {
            files.push(frame_dir.join(format!(
                "{}_{}_depth_extra.exr",
                tier.label(),
                direction.label()
            )));
        }
    }
    files.push(frame_dir.join(format!("{}_color.png", direction.label())));
    files.push(frame_dir.join(format!("{}_alpha.exr", direction.label())));
}
