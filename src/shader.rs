//! Shader programs run by fullscreen passes.
//!
//! Every program is built the same way: the shared [`PRELUDE`] (uniform
//! block, input texture bindings, fullscreen vertex stage and a fragment
//! entry point) followed by an effect body that defines
//!
//! ```wgsl
//! fn effect(uv: vec2f) -> vec4f
//! ```
//!
//! Custom effects extend the base program through this one seam instead of
//! patching shader text, so every program has the same binding layout and
//! the backend can treat them uniformly.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// WGSL shared by every fullscreen pass program.
pub const PRELUDE: &str = include_str!("shaders/prelude.wgsl");

/// A composed WGSL program plus a stable identity for pipeline caching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderProgram {
    label: String,
    source: String,
    id: u64,
}

impl ShaderProgram {
    /// Composes the prelude with an effect body.
    pub fn compose(label: impl Into<String>, effect_body: &str) -> Self {
        let source = format!("{PRELUDE}\n// ---- effect ----\n{effect_body}\n");
        let mut hasher = DefaultHasher::new();
        source.hash(&mut hasher);

        Self {
            label: label.into(),
            id: hasher.finish(),
            source,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Full WGSL source, prelude included.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Content hash of the composed source.
    ///
    /// Two programs with identical source share an id, and so share a
    /// compiled pipeline in the backend.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Effect bodies of the built-in passes.
pub(crate) mod builtin {
    pub const RGB_SHIFT: &str = include_str!("shaders/rgb_shift.wgsl");
    pub const DOT_SCREEN: &str = include_str!("shaders/dot_screen.wgsl");
    pub const GLITCH: &str = include_str!("shaders/glitch.wgsl");
    pub const BLOOM: &str = include_str!("shaders/bloom.wgsl");
    pub const TINT: &str = include_str!("shaders/tint.wgsl");
    pub const DISPLACEMENT: &str = include_str!("shaders/displacement.wgsl");
    pub const COLOR_CORRECTION: &str = include_str!("shaders/color_correction.wgsl");
    pub const ANTIALIAS: &str = include_str!("shaders/antialias.wgsl");
}
