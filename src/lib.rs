//! # Passchain
//!
//! **Multi-pass post-processing for wgpu, with ping-pong render targets.**
//!
//! A [`PassPipeline`] owns an ordered chain of passes. The first pass draws
//! the scene; every later enabled pass samples the previous pass's output and
//! writes the next intermediate target; the last enabled pass writes the
//! screen. Passes can be toggled, reordered and re-parameterized between
//! frames, and the pipeline reallocates its targets when the display size or
//! pixel density changes.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use passchain::*;
//!
//! struct Clear;
//! impl SceneRenderer for Clear {
//!     fn render(&mut self, _: &GpuContext, _: &mut wgpu::RenderPass<'_>, _: &SceneTarget, _: &FrameContext) {}
//! }
//!
//! # fn demo(window: Arc<winit::window::Window>) -> passchain::Result<()> {
//! let gpu = GpuContext::new(window.clone())?;
//! let backend = WgpuBackend::new(gpu, Clear);
//!
//! // Logical size plus scale factor; the pipeline applies the density cap.
//! let mut pipeline = PassPipeline::builder(backend)
//!     .resize_event(ResizeEvent::from_window(&window))
//!     .pass(ShaderEffectPass::tint())
//!     .pass(ColorCorrectionPass::new())
//!     .build()?;
//!
//! // Present at the capped size the passes render at.
//! let (width, height) = pipeline.physical_size();
//! pipeline.backend_mut().resize_surface(width, height);
//!
//! let tint = pipeline.find("tint").unwrap();
//! pipeline.set_parameter(tint, "tint", Vec3::new(0.1, 0.0, 0.0).into())?;
//! pipeline.render(&FrameContext::at(0.0))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Composition rules
//!
//! - The scene pass is first, always enabled, and cannot be removed.
//! - No color-altering pass may come after a [`ColorCorrectionPass`].
//! - An [`AntialiasPass`] is appended when [`CapabilityPolicy`] decides the
//!   backend cannot multisample the targets itself.

mod backend;
mod config;
mod error;
mod frame;
mod gpu;
mod params;
mod render_graph;
mod shader;
mod uniforms;
mod wgpu_backend;

#[cfg(test)]
mod testing;

pub use backend::{
    Backend, Capabilities, ColorFormat, FullscreenDraw, Output, TargetDescriptor, TargetHandle,
};
pub use config::PipelineConfig;
pub use error::{ComposerError, ParameterError, Result};
pub use frame::FrameContext;
pub use gpu::GpuContext;
pub use params::{ParamKind, ParamValue, Parameter, Parameters};
pub use render_graph::{
    AntialiasPass, CapabilityDecision, CapabilityPolicy, ColorCorrectionPass, CustomEffectPass,
    EdgeKernel, FrameStats, Pass, PassContext, PassId, PassInfo, PassPipeline,
    PassPipelineBuilder, PassRole, RenderScenePass, RenderTarget, ResizeEvent, ShaderEffectPass,
    SharedPipeline,
};
pub use shader::{PRELUDE, ShaderProgram};
pub use uniforms::{MAX_PARAMS, PassUniforms};
pub use wgpu_backend::{SceneRenderer, SceneTarget, WgpuBackend};

// Re-export commonly used types
pub use glam::{Vec2, Vec3, Vec4};
