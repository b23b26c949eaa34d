//! Error types for the JSON codec.

/// Errors produced while parsing or reading JSON values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JsonError {
    /// The input could not be parsed. `pos` is the byte offset at which
    /// parsing failed.
    #[error("parse error at offset {pos}: {reason}")]
    Parse { pos: usize, reason: String },

    /// A strict accessor was applied to the wrong variant.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl JsonError {
    pub(crate) fn parse(pos: usize, reason: impl Into<String>) -> Self {
        JsonError::Parse {
            pos,
            reason: reason.into(),
        }
    }

    pub(crate) fn mismatch(expected: &'static str, found: &'static str) -> Self {
        JsonError::TypeMismatch { expected, found }
    }
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, JsonError>;
