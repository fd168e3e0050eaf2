use thiserror::Error;

/// Errors returned by forest operations.
#[derive(Error, Debug)]
pub enum ForestError {
    #[error("forest: dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("forest: ordinal {ordinal} out of range (len={len})")]
    OutOfRange { ordinal: usize, len: usize },

    #[error("forest: corrupt index: {0}")]
    CorruptIndex(String),

    #[error("forest: invalid config: {0}")]
    InvalidConfig(String),

    #[error("forest: {0}")]
    Io(String),

    #[error("forest: json: {0}")]
    Json(String),
}
