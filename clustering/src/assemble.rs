//! Grouping of labeled images into cluster records.

use indexmap::IndexMap;
use mosaic_pipeline::{Cluster, EmbeddingVector, ImageItem};

/// Group images by their final label into [`Cluster`] records.
///
/// `labels` must be 1:1 with `embeddings` and free of noise entries (see
/// [`crate::resolve_noise`]). Images keep their original relative order
/// inside each cluster, and clusters come out in first-occurrence order of
/// their label while scanning the input — not sorted numerically.
/// Descriptions start unset.
pub fn assemble_clusters(embeddings: Vec<EmbeddingVector>, labels: &[i64]) -> Vec<Cluster> {
    debug_assert_eq!(embeddings.len(), labels.len());

    let mut groups: IndexMap<i64, Vec<ImageItem>> = IndexMap::new();
    for (embedding, &label) in embeddings.into_iter().zip(labels.iter()) {
        groups.entry(label).or_default().push(embedding.image);
    }

    groups
        .into_iter()
        .map(|(label, images)| Cluster::new(label, images))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;
    use pretty_assertions::assert_eq;

    fn embedding(id: &str) -> EmbeddingVector {
        EmbeddingVector::new(
            ImageItem::new(id, DynamicImage::new_rgb8(1, 1)),
            vec![1.0, 0.0],
        )
    }

    #[test]
    fn groups_in_first_occurrence_order() {
        let batch = vec![
            embedding("a"),
            embedding("b"),
            embedding("c"),
            embedding("d"),
        ];
        // Label 5 is seen before label 0; the output must not be sorted.
        let clusters = assemble_clusters(batch, &[5, 0, 5, 2]);

        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters[0].label, 5);
        assert_eq!(clusters[0].image_ids(), vec!["a", "c"]);
        assert_eq!(clusters[1].label, 0);
        assert_eq!(clusters[1].image_ids(), vec!["b"]);
        assert_eq!(clusters[2].label, 2);
        assert_eq!(clusters[2].image_ids(), vec!["d"]);
    }

    #[test]
    fn descriptions_start_unset() {
        let clusters = assemble_clusters(vec![embedding("a")], &[0]);
        assert_eq!(clusters[0].description, None);
    }

    #[test]
    fn empty_input_yields_no_clusters() {
        let clusters = assemble_clusters(Vec::new(), &[]);
        assert!(clusters.is_empty());
    }

    #[test]
    fn every_image_lands_in_exactly_one_cluster() {
        let batch = vec![
            embedding("a"),
            embedding("b"),
            embedding("c"),
            embedding("d"),
            embedding("e"),
        ];
        let clusters = assemble_clusters(batch, &[1, 1, 0, 2, 0]);

        let total: usize = clusters.iter().map(|c| c.images.len()).sum();
        assert_eq!(total, 5);

        let mut ids: Vec<&str> = clusters.iter().flat_map(|c| c.image_ids()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
    }
}
