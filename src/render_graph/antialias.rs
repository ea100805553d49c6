//! Post-process edge antialiasing, used when the backend cannot multisample.

use glam::Vec2;

use crate::backend::Output;
use crate::params::{Parameter, Parameters};
use crate::render_graph::{Pass, PassContext, PassRole, RenderTarget, ShaderEffectPass};
use crate::shader::{ShaderProgram, builtin};
use crate::uniforms::{MAX_PARAMS, PassUniforms};

/// Resolution-dependent edge search kernel.
///
/// Packed into the uniform slot right after the pass parameters as
/// `(texel.x, texel.y, search_steps, 0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeKernel {
    pub width: u32,
    pub height: u32,
    pub texel_size: Vec2,
    pub search_steps: u32,
}

impl EdgeKernel {
    const MIN_STEPS: u32 = 4;
    const MAX_STEPS: u32 = 16;
    /// Pixels of the longer axis per search step.
    const PIXELS_PER_STEP: u32 = 240;

    pub fn new(width: u32, height: u32) -> Self {
        let longest = width.max(height);
        let search_steps = longest
            .div_ceil(Self::PIXELS_PER_STEP)
            .clamp(Self::MIN_STEPS, Self::MAX_STEPS);

        Self {
            width,
            height,
            texel_size: Vec2::new(1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32),
            search_steps,
        }
    }

    fn slot(&self) -> [f32; 4] {
        [
            self.texel_size.x,
            self.texel_size.y,
            self.search_steps as f32,
            0.0,
        ]
    }
}

/// Detects luma edges in its input and blends samples along them.
///
/// Inserted by [`CapabilityPolicy`](crate::CapabilityPolicy) on low-density
/// displays whose backend lacks multisampled targets. It does not alter
/// color, so it may run after color correction.
pub struct AntialiasPass {
    inner: ShaderEffectPass,
    kernel: Option<EdgeKernel>,
    kernel_builds: u32,
}

impl AntialiasPass {
    pub const NAME: &'static str = "antialias";

    pub fn new() -> Self {
        Self {
            inner: ShaderEffectPass::from_parts(
                Self::NAME,
                ShaderProgram::compose(Self::NAME, builtin::ANTIALIAS),
                Parameters::new().with(Parameter::new("threshold", 0.1).range(0.0, 0.5)),
            ),
            kernel: None,
            kernel_builds: 0,
        }
    }

    pub fn kernel(&self) -> Option<&EdgeKernel> {
        self.kernel.as_ref()
    }

    /// How many times the kernel has been regenerated.
    pub fn kernel_builds(&self) -> u32 {
        self.kernel_builds
    }
}

impl Default for AntialiasPass {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for AntialiasPass {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn role(&self) -> PassRole {
        PassRole::Antialias
    }

    fn execute(&self, ctx: &mut PassContext<'_>, input: Option<&RenderTarget>, output: Output<'_>) {
        let kernel = self
            .kernel
            .unwrap_or_else(|| EdgeKernel::new(ctx.width, ctx.height));
        let parameters = self.inner.parameters();
        // The schema is fixed at construction, so the kernel slot is too.
        debug_assert!(parameters.len() < MAX_PARAMS);
        let uniforms = PassUniforms::new(ctx.width, ctx.height, ctx.frame)
            .with_parameters(parameters)
            .with_slot(parameters.len(), kernel.slot());
        self.inner.draw(ctx, input, output, &uniforms);
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self
            .kernel
            .is_some_and(|k| k.width == width && k.height == height)
        {
            return;
        }
        let kernel = EdgeKernel::new(width, height);
        log::debug!(
            "antialias kernel rebuilt for {}x{} ({} search steps)",
            width,
            height,
            kernel.search_steps
        );
        self.kernel = Some(kernel);
        self.kernel_builds += 1;
    }

    fn parameters(&self) -> &Parameters {
        self.inner.parameters()
    }

    fn parameters_mut(&mut self) -> &mut Parameters {
        self.inner.parameters_mut()
    }
}
