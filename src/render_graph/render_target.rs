//! Render targets and execution context for the pass pipeline.

use crate::backend::{Backend, ColorFormat, TargetDescriptor, TargetHandle};
use crate::error::{ComposerError, Result};
use crate::frame::FrameContext;

/// An off-screen render target used for intermediate pass results.
///
/// Render targets can be both rendered to and sampled from. This dual use
/// enables ping-pong rendering where one pass writes target A while reading
/// target B, then the next pass reverses the roles.
///
/// Targets are never resized in place: a size or sample-count change
/// allocates a fresh target and releases the old one. Anything holding a
/// target's handle across a resize holds a dead handle, which is why only
/// the pipeline owns targets.
#[derive(Debug, PartialEq, Eq)]
pub struct RenderTarget {
    handle: TargetHandle,
    descriptor: TargetDescriptor,
}

impl RenderTarget {
    /// Allocates a target through the backend.
    ///
    /// Returns [`ComposerError::ResourceExhausted`] if the backend refuses the
    /// size or sample count; retrying with `samples = 0` is left to the caller.
    pub fn allocate(backend: &mut dyn Backend, descriptor: TargetDescriptor) -> Result<Self> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(ComposerError::InvalidSize {
                width: descriptor.width,
                height: descriptor.height,
            });
        }

        let handle = backend.allocate_target(&descriptor)?;
        log::debug!(
            "allocated {} {}x{} ({} samples) as {:?}",
            descriptor.label,
            descriptor.width,
            descriptor.height,
            descriptor.samples,
            handle
        );
        Ok(Self { handle, descriptor })
    }

    /// Replaces this target with a freshly allocated one of the new size.
    ///
    /// On failure the current target is kept and still valid.
    pub fn resize(&mut self, backend: &mut dyn Backend, width: u32, height: u32) -> Result<()> {
        let descriptor = TargetDescriptor {
            width,
            height,
            ..self.descriptor
        };
        let fresh = Self::allocate(backend, descriptor)?;
        let stale = std::mem::replace(self, fresh);
        stale.release(backend);
        Ok(())
    }

    /// Frees the backend resource.
    pub fn release(self, backend: &mut dyn Backend) {
        backend.release_target(self.handle);
    }

    pub fn handle(&self) -> TargetHandle {
        self.handle
    }

    pub fn descriptor(&self) -> &TargetDescriptor {
        &self.descriptor
    }

    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    pub fn samples(&self) -> u32 {
        self.descriptor.samples
    }

    pub fn format(&self) -> ColorFormat {
        self.descriptor.format
    }

    pub fn has_depth(&self) -> bool {
        self.descriptor.depth
    }
}

/// Execution context passed to each pass during a frame.
///
/// The `'a` lifetime ties the backend borrow to the frame, so passes cannot
/// hold onto it between frames.
pub struct PassContext<'a> {
    pub backend: &'a mut dyn Backend,
    pub frame: &'a FrameContext,
    /// Physical output width in pixels.
    pub width: u32,
    /// Physical output height in pixels.
    pub height: u32,
}
