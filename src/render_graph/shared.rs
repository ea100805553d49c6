//! A pipeline handle that can be shared with asynchronous resize sources.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::backend::Backend;
use crate::error::Result;
use crate::frame::FrameContext;
use crate::render_graph::{FrameStats, PassPipeline, ResizeEvent};

/// Shared, lock-guarded access to a [`PassPipeline`].
///
/// `render` reads target dimensions that `resize` replaces, so the two must
/// never interleave. Every operation here holds the same lock for its whole
/// duration, which makes a window-resize callback on another thread safe
/// against the frame loop.
pub struct SharedPipeline<B: Backend> {
    inner: Arc<Mutex<PassPipeline<B>>>,
}

impl<B: Backend> Clone for SharedPipeline<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Backend> SharedPipeline<B> {
    /// Wraps a built pipeline.
    pub fn new(pipeline: PassPipeline<B>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pipeline)),
        }
    }

    /// [`PassPipeline::render`] under the lock.
    pub fn render(&self, frame: &FrameContext) -> Result<FrameStats> {
        self.inner.lock().render(frame)
    }

    /// [`PassPipeline::resize`] under the lock. Never interleaves with a frame.
    pub fn resize(&self, width: u32, height: u32, pixel_density: f32) -> Result<bool> {
        self.inner.lock().resize(width, height, pixel_density)
    }

    /// [`PassPipeline::handle_resize`] under the lock.
    pub fn handle_resize(&self, event: ResizeEvent) -> Result<bool> {
        self.inner.lock().handle_resize(event)
    }

    /// Runs `f` with exclusive access, e.g. to toggle passes between frames.
    pub fn with<R>(&self, f: impl FnOnce(&mut PassPipeline<B>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Holds the lock until the guard drops.
    pub fn lock(&self) -> MutexGuard<'_, PassPipeline<B>> {
        self.inner.lock()
    }
}
