//! Shared stub renderer for integration tests: writes a placeholder file for
//! every file output the compositing graph currently feeds, which is exactly
//! the contract the orchestrator relies on for its renames.

use isocap::{IsocapError, IsocapResult, Renderer, Scene};
use isocap::graph::OutputFormat;

pub struct StubRenderer {
    pub calls: u32,
    pub fail_on_call: Option<u32>,
}

impl StubRenderer {
    pub fn new() -> Self {
        Self {
            calls: 0,
            fail_on_call: None,
        }
    }

    pub fn failing_on(call: u32) -> Self {
        Self {
            calls: 0,
            fail_on_call: Some(call),
        }
    }
}

impl Renderer for StubRenderer {
    fn render_still(&mut self, scene: &Scene) -> IsocapResult<()> {
        self.calls += 1;
        if self.fail_on_call == Some(self.calls) {
            return Err(IsocapError::render("stub renderer failure"));
        }

        let graph = scene
            .compositing
            .as_ref()
            .expect("compositing graph must be built before rendering");

        for output in graph.active_outputs() {
            let path = output.frame_file_path(scene.frame_current);
            match output.format {
                OutputFormat::Png => {
                    image::RgbaImage::new(1, 1)
                        .save(&path)
                        .expect("write placeholder png");
                }
                OutputFormat::OpenExr => {
                    std::fs::write(&path, b"exr-placeholder").expect("write placeholder exr");
                }
            }
        }
        Ok(())
    }
}
