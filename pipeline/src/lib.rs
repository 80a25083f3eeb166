//! # Pipeline
//!
//! This crate provides the domain model and stage contracts for the Mosaic
//! image clustering system, plus the sequencer that threads a batch of
//! images through the stages.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Mosaic Pipeline                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Embedder ──► Clusterer ──► Describer ──► Renderer / Storage   │
//! │     │             │             │               │               │
//! │     ▼             ▼             ▼               ▼               │
//! │  vectors       clusters     described       JSON / disk         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each stage is a single-method capability trait; [`run_pipeline`] is
//! generic over any implementations. Rendering and persistence are left to
//! the caller so that the HTTP boundary and the CLI can compose them
//! differently.

pub mod model;
pub mod orchestrator;
pub mod render;
pub mod stages;
pub mod storage;

pub use model::{Cluster, Embedding, EmbeddingVector, ImageItem};
pub use orchestrator::run_pipeline;
pub use render::JsonRenderer;
pub use stages::{Clusterer, Describer, Embedder, Renderer, Storage};
pub use storage::DiskStorage;
