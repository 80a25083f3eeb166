//! Pipeline sequencer.
//!
//! Calls the stages in strict order — extract, cluster, describe — and
//! threads each stage's output into the next stage's input. Errors are never
//! caught here; they propagate to the caller, which owns user-facing
//! translation.

use anyhow::Result;
use tracing::info;

use crate::model::{Cluster, EmbeddingVector, ImageItem};
use crate::stages::{Clusterer, Describer, Embedder};

/// Run the full pipeline: extract embeddings, cluster images, and generate
/// descriptions.
///
/// Rendering and persistence are intentionally not part of this function;
/// callers compose [`crate::Renderer`] and [`crate::Storage`] on the result
/// as they see fit.
pub async fn run_pipeline<E, C, D>(
    images: Vec<ImageItem>,
    embedder: &E,
    clusterer: &C,
    describer: &D,
) -> Result<Vec<Cluster>>
where
    E: Embedder + ?Sized,
    C: Clusterer + ?Sized,
    D: Describer + ?Sized,
{
    info!("Starting pipeline with {} images", images.len());

    let embeddings: Vec<EmbeddingVector> = embedder.extract(images).await?;
    info!("Extracted {} embeddings", embeddings.len());

    let clusters: Vec<Cluster> = clusterer.cluster(embeddings)?;
    info!("Generated {} clusters", clusters.len());

    let clusters = describer.describe(clusters).await?;
    info!("Pipeline completed");

    Ok(clusters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::DynamicImage;
    use pretty_assertions::assert_eq;

    /// Embedder stub: a constant unit vector per image.
    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn extract(&self, images: Vec<ImageItem>) -> Result<Vec<EmbeddingVector>> {
            Ok(images
                .into_iter()
                .map(|img| EmbeddingVector::new(img, vec![1.0, 0.0]))
                .collect())
        }
    }

    /// Clusterer stub: everything in a single cluster, in input order.
    struct OneCluster;

    impl Clusterer for OneCluster {
        fn cluster(&self, embeddings: Vec<EmbeddingVector>) -> Result<Vec<Cluster>> {
            let images = embeddings.into_iter().map(|e| e.image).collect();
            Ok(vec![Cluster::new(0, images)])
        }
    }

    /// Describer stub: labels every cluster with its size.
    struct CountingDescriber;

    #[async_trait]
    impl Describer for CountingDescriber {
        async fn describe(&self, mut clusters: Vec<Cluster>) -> Result<Vec<Cluster>> {
            for cluster in &mut clusters {
                cluster.description = Some(format!("{} images", cluster.images.len()));
            }
            Ok(clusters)
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn extract(&self, _images: Vec<ImageItem>) -> Result<Vec<EmbeddingVector>> {
            anyhow::bail!("embedding backend unavailable")
        }
    }

    fn items(ids: &[&str]) -> Vec<ImageItem> {
        ids.iter()
            .map(|id| ImageItem::new(*id, DynamicImage::new_rgb8(1, 1)))
            .collect()
    }

    #[tokio::test]
    async fn stages_run_in_order_and_thread_outputs() {
        let clusters = run_pipeline(
            items(&["a.png", "b.png", "c.png"]),
            &FixedEmbedder,
            &OneCluster,
            &CountingDescriber,
        )
        .await
        .unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].image_ids(), vec!["a.png", "b.png", "c.png"]);
        assert_eq!(clusters[0].description.as_deref(), Some("3 images"));
    }

    #[tokio::test]
    async fn empty_batch_flows_through() {
        let clusters = run_pipeline(Vec::new(), &FixedEmbedder, &OneCluster, &CountingDescriber)
            .await
            .unwrap();
        assert_eq!(clusters.len(), 1); // the stub always emits one cluster
        assert!(clusters[0].images.is_empty());
    }

    #[tokio::test]
    async fn stage_errors_propagate_unchanged() {
        let err = run_pipeline(
            items(&["a.png"]),
            &FailingEmbedder,
            &OneCluster,
            &CountingDescriber,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("embedding backend unavailable"));
    }
}
