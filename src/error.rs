//! Error types returned by pipeline operations.
//!
//! Every error is returned synchronously to the caller of the mutating
//! operation. Nothing is retried or swallowed internally: when a target
//! allocation is refused, choosing a smaller size or sample count is the
//! caller's decision.

use thiserror::Error;

use crate::params::ParamKind;
use crate::render_graph::PassId;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ComposerError>;

/// Errors produced by the pass pipeline and its backends.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComposerError {
    /// The backend refused a render target allocation.
    ///
    /// Retry with `samples = 0` or a smaller size.
    #[error("render target allocation refused ({width}x{height}, {samples} samples): {reason}")]
    ResourceExhausted {
        width: u32,
        height: u32,
        samples: u32,
        reason: String,
    },

    /// A parameter write was rejected. Pass state is unchanged.
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// The requested pass order would break a composition rule.
    #[error("ordering violation: {0}")]
    OrderingViolation(String),

    /// No pass with this id lives in the pipeline.
    #[error("no pass with id {0} in the pipeline")]
    UnknownPass(PassId),

    /// Insertion index past the end of the pass list.
    #[error("insert index {index} out of range for {len} passes")]
    IndexOutOfRange { index: usize, len: usize },

    /// Zero-sized output requested.
    #[error("invalid output size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    /// The backend failed outside of target allocation (lost surface, device error).
    #[error("backend error: {0}")]
    Backend(String),
}

/// Rejections raised when declaring or writing pass parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    /// The pass does not declare a parameter with this name.
    #[error("pass '{pass}' has no parameter named '{name}'")]
    Unknown { pass: String, name: String },

    /// The value's kind differs from the declared kind.
    #[error("parameter '{name}' on pass '{pass}' expects {expected}, got {found}")]
    KindMismatch {
        pass: String,
        name: String,
        expected: ParamKind,
        found: ParamKind,
    },

    /// A schema declared the same name twice.
    #[error("pass '{pass}' declares parameter '{name}' more than once")]
    Duplicate { pass: String, name: String },

    /// A schema does not fit in the uniform block.
    #[error("pass '{pass}' declares {count} parameters, at most {max} fit the uniform block")]
    TooMany {
        pass: String,
        count: usize,
        max: usize,
    },
}
