//! Seam to the external renderer. The engine never rasterizes anything
//! itself; it mutates the [`Scene`] and asks the renderer for one still at a
//! time.

use crate::{error::IsocapResult, scene::Scene};

/// A capability-complete external renderer.
///
/// `render_still` renders the scene's current frame, honoring the render and
/// sampler settings, the active camera, the crop border, any material
/// override, and the compositing graph: for every file output currently
/// reachable from a wired group-input socket (see
/// [`crate::graph::CompositingGraph::active_outputs`]) it must write
/// `<base_path>/<slot><frame:04>.<ext>` before returning. Invocations are
/// synchronous; the orchestrator renames those files immediately after the
/// call.
pub trait Renderer {
    fn render_still(&mut self, scene: &Scene) -> IsocapResult<()>;
}
