//! The pass that draws the scene graph.

use crate::backend::Output;
use crate::params::Parameters;
use crate::render_graph::{Pass, PassContext, PassRole, RenderTarget};

/// Rasterizes the full scene into its output.
///
/// The pipeline creates exactly one of these and pins it at index 0. It
/// ignores its input and has no parameters. When every other pass is
/// disabled it renders straight to the screen.
pub struct RenderScenePass {
    parameters: Parameters,
}

impl RenderScenePass {
    pub const NAME: &'static str = "render_scene";

    pub fn new() -> Self {
        Self {
            parameters: Parameters::new(),
        }
    }
}

impl Default for RenderScenePass {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for RenderScenePass {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn role(&self) -> PassRole {
        PassRole::Scene
    }

    fn execute(&self, ctx: &mut PassContext<'_>, _input: Option<&RenderTarget>, output: Output<'_>) {
        ctx.backend.render_scene(output, ctx.frame);
    }

    fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }
}
