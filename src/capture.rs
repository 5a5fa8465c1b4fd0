//! One rotation's capture: crop framing, graph wiring, sampler overrides,
//! the three-tier depth sweep and the color+alpha pass, with every mutated
//! setting restored before returning, error or not.

use std::path::Path;

use anyhow::Context as _;

use crate::{
    config::{Direction, ResolutionTier},
    error::{IsocapError, IsocapResult},
    framing,
    graph::CompositingGraph,
    render::Renderer,
    rig,
    scene::Scene,
    snapshot::{self, RenderSetting, SAMPLER_SETTINGS},
};

/// Captures one direction of the current frame into `output_dir`: six (or
/// three, with high-precision depth) depth files across the resolution
/// tiers, then one color and one alpha file at 200% resolution.
///
/// The rig, compositing graph and depth override material must already be
/// set up; `output_dir` must exist.
#[tracing::instrument(skip_all, fields(direction = direction.label()))]
pub fn capture_rotation(
    scene: &mut Scene,
    renderer: &mut dyn Renderer,
    direction: Direction,
    output_dir: &Path,
) -> IsocapResult<()> {
    rig::set_view(scene, direction)?;

    let crop = framing::compute_crop(scene)?;
    scene.render.border = crop;

    let high_precision = scene.config.high_precision_depth;
    let override_material = scene.depth_override_material.ok_or_else(|| {
        IsocapError::precondition("the depth override material has not been created")
    })?;

    {
        let graph = require_graph(scene)?;
        graph.set_depth_switch(high_precision)?;
        graph.wire_depth()?;
        graph.set_output_base_paths(output_dir)?;
    }

    snapshot::with_restored(scene, &[RenderSetting::ResolutionPercentage], |scene| {
        let depth_result =
            snapshot::with_restored(scene, &SAMPLER_SETTINGS, |scene| {
                scene.sampler.max_bounces = 0;
                scene.sampler.filter_width = 1.0;
                scene.sampler.use_denoising = false;
                scene.sampler.use_adaptive_sampling = false;

                scene.material_override = Some(override_material);

                let original_samples = scene.sampler.samples;
                if !high_precision {
                    // Depth is deterministic; one sample is enough.
                    scene.sampler.samples = 1;
                }
                render_depth_tiers(scene, renderer, direction, output_dir, false)?;
                scene.sampler.samples = original_samples;

                if !high_precision {
                    render_depth_tiers(scene, renderer, direction, output_dir, true)?;
                }
                Ok(())
            });

        // The override and the depth link come off whether or not the depth
        // sweep succeeded; a failed invocation must not leak either.
        scene.material_override = None;
        require_graph(scene)?.unwire_depth()?;
        depth_result?;

        require_graph(scene)?.wire_color_alpha()?;
        scene.render.resolution_percentage = 200;
        let color_result = renderer
            .render_still(scene)
            .and_then(|()| rename_color_and_alpha(scene, direction, output_dir));
        require_graph(scene)?.unwire_color_alpha()?;
        color_result
    })
}

fn require_graph(scene: &mut Scene) -> IsocapResult<&mut CompositingGraph> {
    scene.compositing.as_mut().ok_or_else(|| {
        IsocapError::precondition("the compositing graph has not been set up")
    })
}

fn render_depth_tiers(
    scene: &mut Scene,
    renderer: &mut dyn Renderer,
    direction: Direction,
    output_dir: &Path,
    extra: bool,
) -> IsocapResult<()> {
    for tier in ResolutionTier::ALL {
        scene.render.resolution_percentage = tier.percentage();
        tracing::debug!(tier = tier.label(), extra, "rendering depth pass");
        renderer.render_still(scene)?;
        rename_depth(scene, tier, direction, output_dir, extra)?;
    }
    Ok(())
}

fn rename_depth(
    scene: &Scene,
    tier: ResolutionTier,
    direction: Direction,
    output_dir: &Path,
    extra: bool,
) -> IsocapResult<()> {
    let produced = output_dir.join(format!("depth{:04}.exr", scene.frame_current));
    let suffix = if extra { "_depth_extra.exr" } else { "_depth.exr" };
    let target = output_dir.join(format!("{}_{}{}", tier.label(), direction.label(), suffix));
    std::fs::rename(&produced, &target).with_context(|| {
        format!(
            "move depth render '{}' to '{}'",
            produced.display(),
            target.display()
        )
    })?;
    Ok(())
}

fn rename_color_and_alpha(
    scene: &Scene,
    direction: Direction,
    output_dir: &Path,
) -> IsocapResult<()> {
    let frame = scene.frame_current;

    let produced = output_dir.join(format!("color{frame:04}.png"));
    let target = output_dir.join(format!("{}_color.png", direction.label()));
    std::fs::rename(&produced, &target).with_context(|| {
        format!(
            "move color render '{}' to '{}'",
            produced.display(),
            target.display()
        )
    })?;

    let produced = output_dir.join(format!("alpha{frame:04}.exr"));
    let target = output_dir.join(format!("{}_alpha.exr", direction.label()));
    std::fs::rename(&produced, &target).with_context(|| {
        format!(
            "move alpha render '{}' to '{}'",
            produced.display(),
            target.display()
        )
    })?;

    Ok(())
}
