//! Remote image-embedding adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use mosaic_pipeline::{Embedder, Embedding, EmbeddingVector, ImageItem};

use crate::encode_png;
use crate::error::{InferenceError, Result};

/// Embedding stage backed by an HTTP embedding API.
///
/// Images are shipped in batches as base64 PNG payloads; the returned
/// vectors are normalized to unit length before they leave this adapter, so
/// downstream cosine math can rely on well-formed embeddings.
pub struct RemoteEmbedder {
    /// API base URL.
    base_url: String,

    /// Optional bearer token.
    api_key: Option<String>,

    /// Model to request.
    model: String,

    /// Images per request.
    batch_size: usize,

    /// HTTP client.
    client: reqwest::Client,
}

impl RemoteEmbedder {
    /// Create an embedder against the given API base URL.
    ///
    /// The bearer token is taken from `MOSAIC_API_KEY` when set.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: std::env::var("MOSAIC_API_KEY").ok(),
            model: "clip-vit-b-32".to_string(),
            batch_size: 16,
            client: reqwest::Client::new(),
        }
    }

    /// Set the bearer token.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the model to request.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the number of images per request.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Embedding>> {
        let body = EmbeddingRequest {
            model: &self.model,
            inputs,
        };

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(InferenceError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::ApiRequest(format!(
                "embedding API error: {error_text}"
            )));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        if parsed.data.len() != inputs.len() {
            return Err(InferenceError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                parsed.data.len()
            )));
        }

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn extract(&self, images: Vec<ImageItem>) -> anyhow::Result<Vec<EmbeddingVector>> {
        info!(
            "Extracting embeddings for {} images with model {}",
            images.len(),
            self.model
        );

        let mut embeddings = Vec::with_capacity(images.len());
        let mut queue = images.into_iter();
        loop {
            let batch: Vec<ImageItem> = queue.by_ref().take(self.batch_size).collect();
            if batch.is_empty() {
                break;
            }

            let payloads: Vec<String> = batch
                .iter()
                .map(|img| encode_png(&img.data))
                .collect::<Result<_>>()?;
            let vectors = self.embed_batch(&payloads).await?;
            debug!("Embedded batch of {} images", batch.len());

            for (image, mut value) in batch.into_iter().zip(vectors) {
                normalize(&mut value);
                embeddings.push(EmbeddingVector::new(image, value));
            }
        }

        info!("Extracted {} embeddings", embeddings.len());
        Ok(embeddings)
    }
}

/// Normalize an embedding to unit length. Zero vectors are left untouched;
/// the clustering core rejects them explicitly.
fn normalize(embedding: &mut Embedding) {
    let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in embedding.iter_mut() {
            *x /= magnitude;
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    inputs: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
