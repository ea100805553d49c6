//! The narrow interface between the pass pipeline and a graphics backend.
//!
//! The pipeline never rasterizes anything itself. It allocates render
//! targets, asks for the scene to be drawn, and runs fullscreen programs,
//! all through [`Backend`]. [`WgpuBackend`](crate::WgpuBackend) is the
//! shipped implementation; tests use a recording mock.

use crate::error::Result;
use crate::frame::FrameContext;
use crate::render_graph::RenderTarget;
use crate::shader::ShaderProgram;
use crate::uniforms::PassUniforms;

/// Backend-reported features that shape the pipeline at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Multisampled render targets can be allocated and resolved.
    pub supports_native_multisample: bool,
    /// Largest sample count accepted for render targets.
    pub max_sample_count: u32,
}

impl Capabilities {
    /// A backend without multisampling.
    pub const SINGLE_SAMPLE: Self = Self {
        supports_native_multisample: false,
        max_sample_count: 1,
    };
}

/// Color storage format of an off-screen target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorFormat {
    /// 8-bit linear color.
    Rgba8Unorm,
    /// 16-bit float linear color (headroom for bloom and exposure).
    #[default]
    Rgba16Float,
}

/// Opaque backend handle of an allocated target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetHandle(pub u64);

/// Everything needed to allocate one render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    /// 0 means single sampled.
    pub samples: u32,
    pub format: ColorFormat,
    pub depth: bool,
}

/// Where a pass writes its color output.
#[derive(Debug, Clone, Copy)]
pub enum Output<'a> {
    /// The presentable surface. Only the last enabled pass writes here.
    Screen,
    /// An off-screen target lent by the pipeline for one execution.
    Target(&'a RenderTarget),
}

impl Output<'_> {
    pub fn is_screen(&self) -> bool {
        matches!(self, Output::Screen)
    }

    pub fn target(&self) -> Option<&RenderTarget> {
        match self {
            Output::Screen => None,
            Output::Target(target) => Some(target),
        }
    }
}

/// One fullscreen program invocation.
pub struct FullscreenDraw<'a> {
    /// Name of the pass issuing the draw (debug labels, logs).
    pub pass: &'a str,
    pub program: &'a ShaderProgram,
    /// Sampled input, `None` only for passes that read nothing.
    pub input: Option<&'a RenderTarget>,
    pub output: Output<'a>,
    pub uniforms: &'a PassUniforms,
}

/// A graphics backend the pipeline drives once per frame.
///
/// Calls within a frame are ordered: `begin_frame`, then any number of
/// `render_scene` / `draw_fullscreen`, then `end_frame`. Work is only
/// enqueued; no call waits for the GPU.
pub trait Backend {
    /// Feature flags, queried once when the pipeline is built.
    fn capabilities(&self) -> Capabilities;

    /// Allocates a target.
    ///
    /// Must return [`ComposerError::ResourceExhausted`](crate::ComposerError::ResourceExhausted)
    /// when the size or sample count cannot be honored.
    fn allocate_target(&mut self, descriptor: &TargetDescriptor) -> Result<TargetHandle>;

    /// Frees a target. Unknown handles are ignored.
    fn release_target(&mut self, handle: TargetHandle);

    /// Prepares the frame (acquire the surface, open an encoder).
    fn begin_frame(&mut self) -> Result<()> {
        Ok(())
    }

    /// Draws the scene graph from the current camera into `output`.
    fn render_scene(&mut self, output: Output<'_>, frame: &FrameContext);

    /// Runs one fullscreen program.
    fn draw_fullscreen(&mut self, draw: FullscreenDraw<'_>);

    /// Submits the frame's work and presents.
    fn end_frame(&mut self) {}
}
