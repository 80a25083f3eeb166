//! The clustering capability: embeddings in, described-ready clusters out.

use mosaic_pipeline::{Cluster, EmbeddingVector, stages::Clusterer};
use tracing::{debug, info};

use crate::assemble::assemble_clusters;
use crate::coverage::resolve_noise;
use crate::distance::cosine_distance_matrix;
use crate::error::Result;
use crate::hdbscan::{HdbscanClusterer, HdbscanConfig, NOISE};

/// Groups a batch of image embeddings into clusters of similar images.
///
/// Wires the core steps together: cosine distance matrix, HDBSCAN labeling,
/// noise coverage, assembly. Every input image appears in exactly one output
/// cluster; labels are pairwise distinct, non-negative, and opaque.
#[derive(Debug, Clone)]
pub struct ImageClusterer {
    algorithm: HdbscanClusterer,
}

impl ImageClusterer {
    /// Build a clusterer from validated hyperparameters.
    pub fn new(config: HdbscanConfig) -> Result<Self> {
        Ok(Self {
            algorithm: HdbscanClusterer::new(config)?,
        })
    }

    /// The effective hyperparameters.
    pub fn config(&self) -> &HdbscanConfig {
        self.algorithm.config()
    }

    /// Cluster a batch of embeddings. An empty batch yields an empty
    /// cluster list, not an error.
    pub fn cluster(&self, embeddings: Vec<EmbeddingVector>) -> Result<Vec<Cluster>> {
        if embeddings.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Computing cosine distance matrix for {} embeddings", embeddings.len());
        let distances = cosine_distance_matrix(&embeddings)?;

        debug!("Clustering with HDBSCAN");
        let mut labels = self.algorithm.fit(&distances);

        let dense: std::collections::HashSet<i64> =
            labels.iter().copied().filter(|&l| l != NOISE).collect();
        let noise = labels.iter().filter(|&&l| l == NOISE).count();
        info!("Found {} dense clusters and {noise} outliers", dense.len());

        resolve_noise(&mut labels);
        Ok(assemble_clusters(embeddings, &labels))
    }
}

impl Default for ImageClusterer {
    fn default() -> Self {
        match Self::new(HdbscanConfig::default()) {
            Ok(clusterer) => clusterer,
            Err(_) => unreachable!("the default configuration is valid"),
        }
    }
}

impl Clusterer for ImageClusterer {
    fn cluster(&self, embeddings: Vec<EmbeddingVector>) -> anyhow::Result<Vec<Cluster>> {
        Ok(ImageClusterer::cluster(self, embeddings)?)
    }
}
