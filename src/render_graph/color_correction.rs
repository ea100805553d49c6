//! Final linear-to-sRGB encoding pass.

use crate::backend::Output;
use crate::params::{Parameter, Parameters};
use crate::render_graph::{Pass, PassContext, PassRole, RenderTarget, ShaderEffectPass};
use crate::shader::{ShaderProgram, builtin};

/// Converts the pipeline's linear color to display-encoded sRGB.
///
/// Any color-altering pass placed after this one would either skip the
/// correction or apply it twice, so the pipeline refuses such orders with
/// [`ComposerError::OrderingViolation`](crate::ComposerError::OrderingViolation).
/// Antialiasing and color-preserving custom effects may still follow it.
pub struct ColorCorrectionPass {
    inner: ShaderEffectPass,
}

impl ColorCorrectionPass {
    pub const NAME: &'static str = "color_correction";

    pub fn new() -> Self {
        Self {
            inner: ShaderEffectPass::from_parts(
                Self::NAME,
                ShaderProgram::compose(Self::NAME, builtin::COLOR_CORRECTION),
                Parameters::new().with(Parameter::new("exposure", 1.0).range(0.0, 4.0)),
            ),
        }
    }
}

impl Default for ColorCorrectionPass {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for ColorCorrectionPass {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn role(&self) -> PassRole {
        PassRole::ColorCorrection
    }

    fn execute(&self, ctx: &mut PassContext<'_>, input: Option<&RenderTarget>, output: Output<'_>) {
        self.inner.execute(ctx, input, output);
    }

    fn parameters(&self) -> &Parameters {
        self.inner.parameters()
    }

    fn parameters_mut(&mut self) -> &mut Parameters {
        self.inner.parameters_mut()
    }
}
