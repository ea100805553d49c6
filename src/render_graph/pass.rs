//! The core pass trait for the pipeline.

use crate::backend::Output;
use crate::error::Result;
use crate::params::{ParamValue, Parameters};
use crate::render_graph::{PassContext, RenderTarget};

/// What a pass does to the image, used to enforce composition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassRole {
    /// Rasterizes the scene. Pinned first, always enabled.
    Scene,
    /// A screen-space effect that samples the previous output.
    Effect,
    /// Edge antialiasing. Reads and writes color without altering tone.
    Antialias,
    /// Linear to display encoding. Must follow every color-altering pass.
    ColorCorrection,
}

/// Trait for passes that the pipeline can execute.
///
/// Implement this trait to create custom passes. Each pass receives the
/// previous enabled pass's output (if any) and writes either a target lent
/// by the pipeline or the screen.
///
/// # Execution Flow
///
/// 1. `resize()` runs when the pass is inserted and on every output size change
/// 2. `execute()` runs once per frame, in list order, with ping-pong targets
/// 3. The last enabled pass writes the screen
///
/// Passes never own render targets. Anything resolution-dependent they keep
/// must be plain data rebuilt in `resize()`.
pub trait Pass: Send {
    /// Display name, also used in errors and debug labels.
    fn name(&self) -> &str;

    fn role(&self) -> PassRole {
        PassRole::Effect
    }

    /// Whether this pass changes color values.
    ///
    /// Color-altering passes may not follow a color-correction pass.
    fn alters_color(&self) -> bool {
        matches!(self.role(), PassRole::Effect | PassRole::ColorCorrection)
    }

    /// Executes this pass.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Backend, frame context and physical output size
    /// * `input` - Previous pass output, or `None` for the scene pass
    /// * `output` - Target to write, or [`Output::Screen`] for the last pass
    fn execute(&self, ctx: &mut PassContext<'_>, input: Option<&RenderTarget>, output: Output<'_>);

    /// Rebuilds resolution-dependent state. The default does nothing.
    fn resize(&mut self, _width: u32, _height: u32) {}

    /// Declared parameters with their current values.
    fn parameters(&self) -> &Parameters;

    fn parameters_mut(&mut self) -> &mut Parameters;

    /// Writes a declared parameter.
    ///
    /// Fails with [`ParameterError`](crate::ParameterError) for unknown names
    /// or mismatched kinds, leaving every parameter unchanged.
    fn set_parameter(&mut self, name: &str, value: ParamValue) -> Result<()> {
        let pass = self.name().to_string();
        self.parameters_mut().set(&pass, name, value)?;
        Ok(())
    }

    fn parameter(&self, name: &str) -> Option<ParamValue> {
        self.parameters().get(name)
    }
}
