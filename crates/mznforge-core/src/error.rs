//! Error types for the dzn codec

use thiserror::Error;

/// Raised when dzn text cannot be matched to the value grammar, or when a
/// value cannot be written as dzn.
///
/// Positions are byte offsets into the decoded text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedDataError {
    #[error("unexpected {found} at byte {pos}, expected {expected}")]
    UnexpectedToken {
        pos: usize,
        found: String,
        expected: &'static str,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    #[error("unterminated {what} starting at byte {pos}")]
    Unterminated { what: &'static str, pos: usize },

    #[error("invalid number literal '{literal}' at byte {pos}")]
    InvalidNumber { literal: String, pos: usize },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("index sets describe {expected} elements but {found} were given")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("array{declared}d given {found} index sets")]
    ArityMismatch { declared: usize, found: usize },

    #[error("unknown enum '{0}'")]
    UnknownEnum(String),

    #[error("'{literal}' is not a literal of any known enum")]
    UnknownEnumLiteral { literal: String },

    #[error("enum '{0}' is used with conflicting literals")]
    ConflictingDomain(String),

    #[error("unsupported index set: {0}")]
    UnsupportedIndexSet(String),

    #[error("duplicate identifier '{0}'")]
    DuplicateIdentifier(String),

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("value cannot be represented in dzn: {0}")]
    Unrepresentable(String),
}
