//! Per-frame inputs shared by every pass.

/// Explicit per-frame state handed to [`PassPipeline::render`](crate::PassPipeline::render).
///
/// Time-varying effects (glitch, displacement) read their clock from here
/// rather than from global state, so a test can drive deterministic frames.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameContext {
    /// Elapsed time in seconds since the session started.
    pub time: f32,
    /// Seconds since the previous frame.
    pub delta: f32,
    /// Monotonic frame counter.
    pub index: u64,
}

impl FrameContext {
    /// A frame at `time` seconds with no history.
    pub fn at(time: f32) -> Self {
        Self {
            time,
            delta: 0.0,
            index: 0,
        }
    }

    /// Derives the next frame from this one.
    pub fn advance(&self, time: f32) -> Self {
        Self {
            time,
            delta: (time - self.time).max(0.0),
            index: self.index + 1,
        }
    }
}
