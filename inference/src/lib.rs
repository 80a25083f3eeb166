//! # Inference
//!
//! Remote model-inference adapters for the Mosaic pipeline:
//!
//! - [`RemoteEmbedder`] — the embedding stage, backed by an HTTP embedding
//!   API that turns images into fixed-length feature vectors
//! - [`RemoteCaptioner`] — the description stage, backed by an HTTP
//!   captioning API
//!
//! Both adapters ship images as base64-encoded PNG payloads and carry their
//! endpoint, model, and credentials as constructor configuration — there is
//! no process-global device or backend state.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::DynamicImage;

pub mod captioner;
pub mod embedder;
pub mod error;

pub use captioner::RemoteCaptioner;
pub use embedder::RemoteEmbedder;
pub use error::{InferenceError, Result};

/// Encode an image as a base64 PNG payload for an inference API.
pub(crate) fn encode_png(image: &DynamicImage) -> Result<String> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(STANDARD.encode(buffer.into_inner()))
}
