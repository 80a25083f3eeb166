//! Stage contracts for the clustering pipeline.
//!
//! Each stage is a single-method trait so that implementations stay
//! swappable: the sequencer in [`crate::orchestrator`] is generic over any
//! set of them. Network-bound stages (embedding, captioning) are async; the
//! clustering core is a pure synchronous computation and stays a plain
//! trait.
//!
//! Stage implementations return their own typed errors; `anyhow` carries
//! them across the seam unchanged so the boundary layer can translate them
//! for users.

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{Cluster, EmbeddingVector, ImageItem};

/// Extracts one embedding per image, preserving input order.
///
/// Implementations must return unit-normalized vectors of a single
/// dimensionality for the whole batch.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Extract embeddings for a batch of images.
    async fn extract(&self, images: Vec<ImageItem>) -> Result<Vec<EmbeddingVector>>;
}

/// Partitions a batch of embeddings into clusters.
///
/// Every input item appears in exactly one output cluster; labels are
/// pairwise distinct and non-negative. The whole batch must be materialized
/// before this is called — there is no streaming contract.
pub trait Clusterer: Send + Sync {
    /// Group embeddings into clusters of similar images.
    fn cluster(&self, embeddings: Vec<EmbeddingVector>) -> Result<Vec<Cluster>>;
}

/// Fills in the `description` field of each cluster.
///
/// The describer takes ownership of the cluster list for the duration of the
/// call and returns the updated list. Implementations may skip clusters with
/// no images.
#[async_trait]
pub trait Describer: Send + Sync {
    /// Generate a description for each cluster.
    async fn describe(&self, clusters: Vec<Cluster>) -> Result<Vec<Cluster>>;
}

/// Renders clusters to a wire format.
pub trait Renderer {
    /// Render a list of clusters into a string.
    fn render(&self, clusters: &[Cluster]) -> Result<String>;
}

/// Persists clusters and their images.
pub trait Storage {
    /// Save a list of clusters to storage.
    fn save(&self, clusters: &[Cluster]) -> Result<()>;
}
