//! Pairwise cosine distances over a batch of embeddings.

use mosaic_pipeline::EmbeddingVector;

use crate::error::{ClusteringError, Result};

/// A square, symmetric, non-negative distance matrix with a zero diagonal.
///
/// Stored flat in row-major order. Derived and ephemeral: it exists only for
/// the duration of one clustering call.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    n: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    pub(crate) fn from_raw(n: usize, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), n * n);
        Self { n, values }
    }

    /// Number of items (rows) in the matrix.
    pub fn len(&self) -> usize {
        self.n
    }

    /// Whether the matrix covers zero items.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Distance between items `i` and `j`.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }
}

/// Build the pairwise cosine-distance matrix for a batch of embeddings:
/// `d(u, v) = 1 - u·v / (‖u‖·‖v‖)`.
///
/// The diagonal is zero and the matrix symmetric by construction. An empty
/// batch short-circuits to an empty matrix before any work. A zero-magnitude
/// embedding makes cosine distance undefined and fails the whole batch with
/// [`ClusteringError::DegenerateVector`]; mixed dimensionalities fail with
/// [`ClusteringError::DimensionMismatch`].
pub fn cosine_distance_matrix(embeddings: &[EmbeddingVector]) -> Result<DistanceMatrix> {
    let n = embeddings.len();
    if n == 0 {
        return Ok(DistanceMatrix::from_raw(0, Vec::new()));
    }

    let dim = embeddings[0].value.len();
    let mut norms = Vec::with_capacity(n);
    for embedding in embeddings {
        if embedding.value.len() != dim {
            return Err(ClusteringError::DimensionMismatch {
                expected: dim,
                found: embedding.value.len(),
            });
        }
        let norm = embedding
            .value
            .iter()
            .map(|x| f64::from(*x) * f64::from(*x))
            .sum::<f64>()
            .sqrt();
        if norm == 0.0 {
            return Err(ClusteringError::DegenerateVector {
                id: embedding.image.id.clone(),
            });
        }
        norms.push(norm);
    }

    let mut values = vec![0.0f64; n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            let dot: f64 = embeddings[i]
                .value
                .iter()
                .zip(embeddings[j].value.iter())
                .map(|(a, b)| f64::from(*a) * f64::from(*b))
                .sum();
            // Rounding can push 1 - cos(u, v) a hair below zero for
            // identical directions; the matrix must stay non-negative.
            let d = (1.0 - dot / (norms[i] * norms[j])).max(0.0);
            values[i * n + j] = d;
            values[j * n + i] = d;
        }
    }

    Ok(DistanceMatrix::from_raw(n, values))
}
