//! Error types for the clustering core.

use thiserror::Error;

/// Result type alias for clustering operations.
pub type Result<T> = std::result::Result<T, ClusteringError>;

/// Errors that can occur in the clustering core.
#[derive(Error, Debug)]
pub enum ClusteringError {
    /// Hyperparameter outside its allowed domain. Raised at construction
    /// time, before any computation.
    #[error("invalid configuration for {name}: {message}")]
    InvalidConfiguration {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: &'static str,
    },

    /// An embedding has zero magnitude, so cosine distance is undefined.
    /// Fails the whole batch; no partial output is produced.
    #[error("degenerate embedding for image {id}: zero magnitude")]
    DegenerateVector {
        /// Id of the offending image.
        id: String,
    },

    /// Embeddings in one batch have inconsistent dimensionality.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Dimensionality of the first embedding in the batch.
        expected: usize,
        /// Dimensionality of the offending embedding.
        found: usize,
    },
}
