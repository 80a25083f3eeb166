//! Domain model shared by all pipeline stages.
//!
//! Everything here is created fresh per pipeline invocation; ownership flows
//! stage to stage (the embedder consumes images, the clusterer consumes
//! vectors, the describer consumes and returns clusters). Pixel payloads are
//! moved, never copied, between stages.

use image::DynamicImage;

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// An image held in memory together with its batch-unique identifier.
///
/// The id is typically the uploaded filename; it doubles as the filename
/// used by [`crate::DiskStorage`] when a cluster is persisted.
#[derive(Debug, Clone)]
pub struct ImageItem {
    /// Identifier, unique within a batch.
    pub id: String,

    /// Decoded pixel data. Never mutated by the pipeline.
    pub data: DynamicImage,
}

impl ImageItem {
    /// Create a new image item.
    pub fn new(id: impl Into<String>, data: DynamicImage) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// The embedding of a single image, paired with the image it came from.
///
/// Produced by an [`crate::Embedder`], unit-normalized, and consumed exactly
/// once by a [`crate::Clusterer`]. All vectors in one batch share the same
/// dimensionality.
#[derive(Debug, Clone)]
pub struct EmbeddingVector {
    /// The image this embedding was extracted from.
    pub image: ImageItem,

    /// The embedding vector.
    pub value: Embedding,
}

impl EmbeddingVector {
    /// Create a new embedding vector.
    pub fn new(image: ImageItem, value: Embedding) -> Self {
        Self { image, value }
    }
}

/// A group of similar images.
///
/// Labels are opaque identifiers: distinct between clusters of one batch but
/// not contiguous and not meaningful as ranks. Downstream consumers must not
/// read anything into their numeric values.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Opaque, batch-unique label. Always non-negative in pipeline output.
    pub label: i64,

    /// Member images, in their original relative order.
    pub images: Vec<ImageItem>,

    /// Short textual description, filled in by a [`crate::Describer`].
    pub description: Option<String>,
}

impl Cluster {
    /// Create a new cluster with no description.
    pub fn new(label: i64, images: Vec<ImageItem>) -> Self {
        Self {
            label,
            images,
            description: None,
        }
    }

    /// Ids of the member images, in order.
    pub fn image_ids(&self) -> Vec<&str> {
        self.images.iter().map(|img| img.id.as_str()).collect()
    }
}
