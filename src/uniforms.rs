//! The uniform block every fullscreen program reads.

use crate::frame::FrameContext;
use crate::params::Parameters;

/// Number of vec4 parameter slots in the uniform block.
pub const MAX_PARAMS: usize = 16;

/// Uniform block shared by every fullscreen pass program.
///
/// Matches the `PassUniforms` struct declared by the WGSL prelude:
/// ```wgsl
/// struct PassUniforms {
///     resolution: vec2f,
///     time: f32,
///     delta: f32,
///     params: array<vec4f, 16>,
/// }
/// ```
/// Parameters occupy one slot each, in declaration order. Passes with
/// internal state (the antialias kernel) append it after their parameters.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PassUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub delta: f32,
    pub params: [[f32; 4]; MAX_PARAMS],
}

impl PassUniforms {
    pub fn new(width: u32, height: u32, frame: &FrameContext) -> Self {
        Self {
            resolution: [width as f32, height as f32],
            time: frame.time,
            delta: frame.delta,
            params: [[0.0; 4]; MAX_PARAMS],
        }
    }

    /// Packs every declared parameter into its slot.
    pub fn with_parameters(mut self, parameters: &Parameters) -> Self {
        for (slot, parameter) in self.params.iter_mut().zip(parameters.iter()) {
            *slot = parameter.value().to_slot();
        }
        self
    }

    /// Overwrites one slot. Out-of-range indices are ignored.
    pub fn with_slot(mut self, index: usize, value: [f32; 4]) -> Self {
        if let Some(slot) = self.params.get_mut(index) {
            *slot = value;
        }
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
