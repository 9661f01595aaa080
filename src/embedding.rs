//! Image embedding
//!
//! [`ImageEmbedder`] turns photo bytes into a fixed-length vector. Failures never cross
//! this boundary: they are logged and reported as `None`, and the pipeline skips the photo.

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::EmbeddingConfig;
use crate::{Result, SnapTripError};

#[async_trait]
pub trait ImageEmbedder: Send + Sync {
    /// Embedding of `image`, or `None` when the image could not be embedded
    async fn embed(&self, image: &[u8]) -> Option<Vec<f32>>;
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Client for an HTTP embedding service.
///
/// Raw image bytes are posted to `{base_url}/embed`; the service answers with
/// `{"embedding": [...]}`. Transient failures are retried with exponential backoff.
pub struct HttpEmbedder {
    client: ClientWithMiddleware,
    endpoint: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("SnapTrip/", env!("CARGO_PKG_VERSION")))
            .build()
            .with_context(|| "Failed to create HTTP client")?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            endpoint: format!("{}/embed", config.base_url.trim_end_matches('/')),
            dimension: config.dimension,
        })
    }

    async fn request_embedding(&self, image: &[u8]) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| SnapTripError::embedding(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SnapTripError::embedding(format!(
                "Embedding service answered {status}"
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| SnapTripError::embedding(format!("Invalid response: {e}")))?;

        check_dimension(body.embedding, self.dimension)
    }
}

fn check_dimension(embedding: Vec<f32>, dimension: usize) -> Result<Vec<f32>> {
    if embedding.len() != dimension {
        return Err(SnapTripError::embedding(format!(
            "Expected {dimension} dimensions, got {}",
            embedding.len()
        )));
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(SnapTripError::embedding("Embedding contains non-finite values"));
    }
    Ok(embedding)
}

#[async_trait]
impl ImageEmbedder for HttpEmbedder {
    #[instrument(name = "embed_image", skip(self, image), fields(bytes = image.len()))]
    async fn embed(&self, image: &[u8]) -> Option<Vec<f32>> {
        let start_time = Instant::now();

        match self.request_embedding(image).await {
            Ok(embedding) => {
                debug!(
                    "Embedded image in {:.3}s",
                    start_time.elapsed().as_secs_f64()
                );
                Some(embedding)
            }
            Err(e) => {
                warn!("Image embedding failed: {}", e);
                None
            }
        }
    }
}
