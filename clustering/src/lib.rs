//! # Clustering
//!
//! Density-based clustering core for the Mosaic pipeline. Consumes one
//! embedding per image and partitions the batch into groups of visually
//! similar images, with a total-coverage guarantee: every input image ends
//! up in exactly one output cluster.
//!
//! ## Stages
//!
//! ```text
//! embeddings ──► cosine distance matrix ──► HDBSCAN ──► coverage ──► clusters
//!                     (distance)            (hdbscan)   (coverage)   (assemble)
//! ```
//!
//! - [`distance`] builds a symmetric pairwise cosine-distance matrix.
//! - [`hdbscan`] runs hierarchical density-based clustering over the
//!   precomputed matrix, labeling sparse points as noise.
//! - [`coverage`] converts every noise point into its own singleton label so
//!   nothing is dropped downstream.
//! - [`assemble`] groups images by final label into [`Cluster`] records.
//!
//! [`ImageClusterer`] wires the four steps together and implements the
//! pipeline's `Clusterer` capability.
//!
//! The whole core is a pure, single-threaded computation: no I/O, no state
//! across invocations, deterministic for a given input order.
//!
//! [`Cluster`]: mosaic_pipeline::Cluster

pub mod assemble;
pub mod clusterer;
pub mod coverage;
pub mod distance;
pub mod error;
pub mod hdbscan;

pub use assemble::assemble_clusters;
pub use clusterer::ImageClusterer;
pub use coverage::resolve_noise;
pub use distance::{DistanceMatrix, cosine_distance_matrix};
pub use error::{ClusteringError, Result};
pub use hdbscan::{HdbscanClusterer, HdbscanConfig, NOISE, SelectionMethod};
