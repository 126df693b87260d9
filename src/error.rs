//! Error types for canopy.

use thiserror::Error;

/// Errors that can occur during index construction and search.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexError {
    /// The clustering fan-out is below the minimum the algorithm supports.
    #[error("Branching factor must be at least 2")]
    BranchingTooSmall,

    /// Unrecognized center-initialization algorithm name or tag.
    #[error("Unknown algorithm for choosing initial centers")]
    UnknownCentersInit,

    /// Empty index (no vectors loaded).
    #[error("index is empty")]
    EmptyIndex,

    /// Search before `build()` was called.
    #[error("index is not built")]
    NotBuilt,

    /// Dimension mismatch between a supplied vector and the index.
    #[error("dimension mismatch: vector has {vector_dim} dimensions, index has {index_dim}")]
    DimensionMismatch {
        vector_dim: usize,
        index_dim: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type alias for canopy operations.
pub type Result<T> = std::result::Result<T, IndexError>;
