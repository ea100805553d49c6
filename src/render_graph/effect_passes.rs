//! Screen-space effect passes: built-in presets and caller-supplied effects.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::{Vec2, Vec3};

use crate::backend::{FullscreenDraw, Output};
use crate::error::Result;
use crate::params::{Parameter, Parameters};
use crate::render_graph::{Pass, PassContext, RenderTarget};
use crate::shader::{ShaderProgram, builtin};
use crate::uniforms::PassUniforms;

/// A fullscreen fragment program applied to the previous pass output.
///
/// `ShaderEffectPass` samples its single input texture and writes one
/// output. It keeps no state across frames: anything time-varying comes
/// from the frame context (`u.time` in the shader).
///
/// The presets cover the classic effect-composer set:
///
/// | Preset | Parameters |
/// |---|---|
/// | [`rgb_shift`](Self::rgb_shift) | `amount`, `angle` |
/// | [`dot_screen`](Self::dot_screen) | `center`, `angle`, `scale` |
/// | [`glitch`](Self::glitch) | `intensity`, `go_wild` |
/// | [`bloom`](Self::bloom) | `strength`, `radius`, `threshold` |
/// | [`tint`](Self::tint) | `tint` |
/// | [`displacement`](Self::displacement) | `strength`, `frequency` |
///
/// # Example
///
/// ```ignore
/// let mut shift = ShaderEffectPass::rgb_shift();
/// shift.set_parameter("amount", 0.01_f32.into())?;
/// pipeline.insert_pass(1, shift)?;
/// ```
pub struct ShaderEffectPass {
    name: String,
    program: ShaderProgram,
    parameters: Parameters,
}

impl ShaderEffectPass {
    /// Wraps a composed program with its parameter schema.
    ///
    /// The schema is validated like [`CustomEffectPass::new`]'s: duplicate
    /// names and schemas larger than [`Parameters::MAX`] are rejected, so
    /// every accepted parameter has a uniform slot.
    pub fn new(
        name: impl Into<String>,
        program: ShaderProgram,
        schema: impl IntoIterator<Item = Parameter>,
    ) -> Result<Self> {
        let name = name.into();
        let parameters = Parameters::declare(&name, schema)?;
        Ok(Self::from_parts(name, program, parameters))
    }

    /// Built-in schemas are known to fit.
    pub(crate) fn from_parts(
        name: impl Into<String>,
        program: ShaderProgram,
        parameters: Parameters,
    ) -> Self {
        debug_assert!(parameters.len() <= Parameters::MAX);
        Self {
            name: name.into(),
            program,
            parameters,
        }
    }

    fn builtin(name: &str, body: &str, parameters: Parameters) -> Self {
        Self::from_parts(name, ShaderProgram::compose(name, body), parameters)
    }

    /// Splits the red and blue channels along a direction.
    pub fn rgb_shift() -> Self {
        Self::builtin(
            "rgb_shift",
            builtin::RGB_SHIFT,
            Parameters::new()
                .with(Parameter::new("amount", 0.005).range(0.0, 0.1))
                .with(Parameter::new("angle", 0.0).range(0.0, TAU)),
        )
    }

    /// Halftone dot pattern over a grayscale image.
    pub fn dot_screen() -> Self {
        Self::builtin(
            "dot_screen",
            builtin::DOT_SCREEN,
            Parameters::new()
                .with(Parameter::new("center", Vec2::splat(0.5)))
                .with(Parameter::new("angle", FRAC_PI_2).range(0.0, TAU))
                .with(Parameter::new("scale", 1.0).range(0.1, 4.0)),
        )
    }

    /// Scanline tearing and channel splits in short bursts, or every frame
    /// when `go_wild` is set.
    pub fn glitch() -> Self {
        Self::builtin(
            "glitch",
            builtin::GLITCH,
            Parameters::new()
                .with(Parameter::new("intensity", 1.0).range(0.0, 1.0))
                .with(Parameter::new("go_wild", false)),
        )
    }

    /// Single-pass bloom: bright areas above `threshold` glow outward.
    pub fn bloom() -> Self {
        Self::builtin(
            "bloom",
            builtin::BLOOM,
            Parameters::new()
                .with(Parameter::new("strength", 0.3).range(0.0, 2.0))
                .with(Parameter::new("radius", 1.0).range(0.0, 2.0))
                .with(Parameter::new("threshold", 0.6).range(0.0, 1.0)),
        )
    }

    /// Adds a constant color offset.
    pub fn tint() -> Self {
        Self::builtin(
            "tint",
            builtin::TINT,
            Parameters::new().with(Parameter::new("tint", Vec3::ZERO).range(-1.0, 1.0)),
        )
    }

    /// Animated vertical wave distortion.
    pub fn displacement() -> Self {
        Self::builtin(
            "displacement",
            builtin::DISPLACEMENT,
            Parameters::new()
                .with(Parameter::new("strength", 0.1).range(0.0, 0.5))
                .with(Parameter::new("frequency", 10.0).range(0.0, 50.0)),
        )
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    /// Runs the program with the parameters packed into the uniform block.
    pub(crate) fn draw(
        &self,
        ctx: &mut PassContext<'_>,
        input: Option<&RenderTarget>,
        output: Output<'_>,
        uniforms: &PassUniforms,
    ) {
        log::trace!("{} -> {}", self.name, if output.is_screen() { "screen" } else { "target" });
        ctx.backend.draw_fullscreen(FullscreenDraw {
            pass: &self.name,
            program: &self.program,
            input,
            output,
            uniforms,
        });
    }
}

impl Pass for ShaderEffectPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &mut PassContext<'_>, input: Option<&RenderTarget>, output: Output<'_>) {
        let uniforms =
            PassUniforms::new(ctx.width, ctx.height, ctx.frame).with_parameters(&self.parameters);
        self.draw(ctx, input, output, &uniforms);
    }

    fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }
}

/// A caller-defined effect: WGSL effect body plus a full parameter schema.
///
/// The body is composed after the shared prelude and must define
/// `fn effect(uv: vec2f) -> vec4f`. Parameter `i` of the schema is readable
/// as `u.params[i]`. The schema is fixed at construction so every
/// `set_parameter` can be validated.
///
/// # Example
///
/// ```ignore
/// let vignette = CustomEffectPass::new(
///     "vignette",
///     r#"
///     fn effect(uv: vec2f) -> vec4f {
///         let color = sample_input(uv);
///         let d = distance(uv, vec2f(0.5));
///         return vec4f(color.rgb * (1.0 - d * u.params[0].x), color.a);
///     }
///     "#,
///     [Parameter::new("darkness", 0.8).range(0.0, 2.0)],
/// )?;
/// ```
pub struct CustomEffectPass {
    inner: ShaderEffectPass,
    alters_color: bool,
}

impl CustomEffectPass {
    pub fn new(
        name: impl Into<String>,
        effect_body: &str,
        schema: impl IntoIterator<Item = Parameter>,
    ) -> Result<Self> {
        let name = name.into();
        let program = ShaderProgram::compose(name.clone(), effect_body);

        Ok(Self {
            inner: ShaderEffectPass::new(name, program, schema)?,
            alters_color: true,
        })
    }

    /// Marks the effect as moving pixels without changing their values
    /// (distortions, pixelation), so it may follow color correction.
    pub fn preserves_color(mut self) -> Self {
        self.alters_color = false;
        self
    }

    pub fn program(&self) -> &ShaderProgram {
        self.inner.program()
    }
}

impl Pass for CustomEffectPass {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn alters_color(&self) -> bool {
        self.alters_color
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
