//! Pipeline configuration: density cap, sample count and target format.

use crate::backend::ColorFormat;

/// Configuration for a [`PassPipeline`](crate::PassPipeline).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    /// Upper bound on the pixel density used to size targets.
    ///
    /// Very dense displays would otherwise multiply memory and bandwidth for
    /// no visible gain. Defaults to 2.
    pub density_cap: f32,
    /// Sample count requested when the capability policy picks multisampled
    /// targets. Clamped to what the backend reports.
    pub preferred_samples: u32,
    /// Color format of the ping-pong targets. Linear; color correction encodes.
    pub color_format: ColorFormat,
    /// Give the ping-pong targets a depth buffer for the scene pass.
    pub depth: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            density_cap: 2.0,
            preferred_samples: 4,
            color_format: ColorFormat::Rgba16Float,
            depth: true,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the upper bound on pixel density.
    pub fn density_cap(mut self, cap: f32) -> Self {
        self.density_cap = cap;
        self
    }

    /// Sets the requested sample count. 0 or 1 asks for single-sampled targets.
    pub fn preferred_samples(mut self, samples: u32) -> Self {
        self.preferred_samples = samples;
        self
    }

    /// Sets the ping-pong target format.
    pub fn color_format(mut self, format: ColorFormat) -> Self {
        self.color_format = format;
        self
    }

    /// Enables or disables the target depth buffer.
    pub fn depth(mut self, depth: bool) -> Self {
        self.depth = depth;
        self
    }

    /// Pixel density after capping. Non-positive or non-finite input counts as 1.
    pub fn effective_density(&self, pixel_density: f32) -> f32 {
        if pixel_density.is_finite() && pixel_density > 0.0 {
            pixel_density.min(self.density_cap)
        } else {
            1.0
        }
    }

    /// Physical buffer size for a logical size: `round(logical * min(density, cap))`.
    pub fn physical_size(&self, width: u32, height: u32, pixel_density: f32) -> (u32, u32) {
        let scale = self.effective_density(pixel_density);
        let scaled = |v: u32| ((v as f32 * scale).round() as u32).max(1);
        (scaled(width), scaled(height))
    }
}
