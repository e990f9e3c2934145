//! Parse errors for the shared types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("identifier must not be empty")]
    EmptyId,

    #[error("invalid identifier: expected {expected} hex chars, got {got}")]
    InvalidIdLength { expected: usize, got: usize },

    #[error("identifier contains non-hex characters")]
    InvalidIdHex,

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}
