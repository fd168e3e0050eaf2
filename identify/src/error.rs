use thiserror::Error;

use visage_forest::ForestError;

/// Errors returned by identity matching.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("identify: index not loaded")]
    IndexNotLoaded,

    #[error("identify: index already loaded")]
    AlreadyLoaded,

    #[error("identify: metadata: {0}")]
    Metadata(String),

    #[error(transparent)]
    Forest(#[from] ForestError),
}
