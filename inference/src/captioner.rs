//! Remote captioning adapter for cluster descriptions.

use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::info;

use mosaic_pipeline::{Cluster, Describer};

use crate::encode_png;
use crate::error::{InferenceError, Result};

/// Description stage backed by an HTTP captioning API.
///
/// Each non-empty cluster is described by captioning a handful of its
/// leading images, deduplicating the captions, and joining them with
/// `" / "`. Empty clusters are skipped.
pub struct RemoteCaptioner {
    /// API base URL.
    base_url: String,

    /// Optional bearer token.
    api_key: Option<String>,

    /// Model to request.
    model: String,

    /// How many images per cluster to caption.
    max_images: usize,

    /// HTTP client.
    client: reqwest::Client,
}

impl RemoteCaptioner {
    /// Create a captioner against the given API base URL.
    ///
    /// The bearer token is taken from `MOSAIC_API_KEY` when set.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: std::env::var("MOSAIC_API_KEY").ok(),
            model: "blip-image-captioning-base".to_string(),
            max_images: 3,
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

    /// Set how many images per cluster are captioned.
    pub fn with_max_images(mut self, max_images: usize) -> Self {
        self.max_images = max_images.max(1);
        self
    }

    async fn caption(&self, image: &DynamicImage) -> Result<String> {
        let payload = encode_png(image)?;
        let body = CaptionRequest {
            model: &self.model,
            image: &payload,
        };

        let mut request = self
            .client
            .post(format!("{}/captions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::ApiRequest(format!(
                "caption API error: {error_text}"
            )));
        }

        let parsed: CaptionResponse = response.json().await?;
        Ok(parsed.caption)
    }
}

#[async_trait]
impl Describer for RemoteCaptioner {
    async fn describe(&self, mut clusters: Vec<Cluster>) -> anyhow::Result<Vec<Cluster>> {
        info!("Generating descriptions for {} clusters", clusters.len());

        for cluster in &mut clusters {
            if cluster.images.is_empty() {
                continue;
            }

            let mut captions: Vec<String> = Vec::new();
            for image in cluster.images.iter().take(self.max_images) {
                let caption = self.caption(&image.data).await?;
                if !captions.contains(&caption) {
                    captions.push(caption);
                }
            }

            let description = captions.join(" / ");
            info!("Cluster {} description: {description}", cluster.label);
            cluster.description = Some(description);
        }

        Ok(clusters)
    }
}

#[derive(Debug, Serialize)]
struct CaptionRequest<'a> {
    model: &'a str,
    image: &'a str,
}

#[derive(Debug, Deserialize)]
struct CaptionResponse {
    caption: String,
}
