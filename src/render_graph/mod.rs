//! Composable multi-pass post-processing with ping-pong render targets.
//!
//! This module provides an ordered chain of passes. Each pass reads the
//! previous enabled pass's output and writes the next intermediate target;
//! the last enabled pass writes the screen.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │ RenderScene │───▶│ ShaderEffect│───▶│ ColorCorrect│───▶│  Antialias  │
//! │   (first)   │    │   (tint)    │    │   (sRGB)    │    │  (policy)   │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//!       │                  │                  │                  │
//!       ▼                  ▼                  ▼                  ▼
//!   Target A           Target B           Target A            Screen
//! ```
//!
//! # Pass Types
//!
//! - [`RenderScenePass`]: draws the scene graph; pinned first, always enabled
//! - [`ShaderEffectPass`]: built-in screen-space effects (rgb shift, glitch, bloom, ...)
//! - [`CustomEffectPass`]: caller-supplied WGSL effect body and parameter schema
//! - [`ColorCorrectionPass`]: linear to sRGB; the last color-altering pass
//! - [`AntialiasPass`]: edge blending, inserted by [`CapabilityPolicy`]
//!
//! # Example
//!
//! ```ignore
//! use passchain::{ColorCorrectionPass, FrameContext, PassPipeline, ShaderEffectPass};
//!
//! let mut pipeline = PassPipeline::builder(backend)
//!     .size(800, 600)
//!     .disabled(ShaderEffectPass::glitch())
//!     .pass(ShaderEffectPass::tint())
//!     .pass(ColorCorrectionPass::new())
//!     .build()?;
//!
//! // In render loop:
//! pipeline.render(&FrameContext::at(time))?;
//! ```

mod antialias;
mod capability;
mod color_correction;
mod effect_passes;
mod graph;
mod pass;
mod render_target;
mod scene_pass;
mod shared;

#[cfg(test)]
mod tests;

pub use antialias::{AntialiasPass, EdgeKernel};
pub use capability::{CapabilityDecision, CapabilityPolicy};
pub use color_correction::ColorCorrectionPass;
pub use effect_passes::{CustomEffectPass, ShaderEffectPass};
pub use graph::{FrameStats, PassId, PassInfo, PassPipeline, PassPipelineBuilder, ResizeEvent};
pub use pass::{Pass, PassRole};
pub use render_target::{PassContext, RenderTarget};
pub use scene_pass::RenderScenePass;
pub use shared::SharedPipeline;
