use crate::config::OpenAiConfig;
use crate::error::CapabilityError;
use crate::net::with_retry;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_HASH_DIMENSIONS: usize = 256;

/// Opaque text-to-vector capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Deterministic offline embedder hashing word tokens and character
/// trigrams into a fixed number of buckets. No network, no model weights;
/// the same text always maps to the same vector.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    pub dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_HASH_DIMENSIONS,
        }
    }
}

impl HashEmbedder {
    fn bucket(token: &str, buckets: usize) -> usize {
        let mut hash = 1469598103934665603u64;
        for byte in token.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(1099511628211);
        }
        (hash % buckets as u64) as usize
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();

        let len = vector.len();
        for word in lowered.split_whitespace() {
            vector[Self::bucket(word, len)] += 1.0;
        }

        let chars: Vec<char> = lowered.chars().collect();
        for window in chars.windows(3) {
            let gram: String = window.iter().collect();
            vector[Self::bucket(&gram, len)] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError> {
        Ok(self.embed_sync(text))
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding client for an OpenAI-compatible `/embeddings` endpoint, with a
/// request timeout and bounded retry.
pub struct OpenAiEmbedder {
    config: OpenAiConfig,
    base: Url,
    client: Client,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiConfig) -> Result<Self, CapabilityError> {
        let base = config.base_url()?;
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            base,
            client,
        })
    }

    async fn embed_once(&self, input: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        let url = self.base.join("embeddings")?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&EmbeddingRequest {
                model: &self.config.embedding_model,
                input,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CapabilityError::Backend {
                service: "embeddings",
                details: response.status().to_string(),
            });
        }

        let body: EmbeddingResponse = response.json().await?;
        if body.data.len() != input.len() {
            return Err(CapabilityError::Backend {
                service: "embeddings",
                details: format!(
                    "expected {} embeddings, got {}",
                    input.len(),
                    body.data.len()
                ),
            });
        }

        let mut vectors = vec![Vec::new(); input.len()];
        for item in body.data {
            let slot = vectors
                .get_mut(item.index)
                .ok_or_else(|| CapabilityError::Backend {
                    service: "embeddings",
                    details: format!("embedding index {} out of range", item.index),
                })?;
            *slot = item.embedding;
        }

        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.config.embedding_dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError> {
        let input = [text.to_string()];
        let mut vectors = with_retry(self.config.retry, || self.embed_once(&input)).await?;
        vectors.pop().ok_or(CapabilityError::Backend {
            service: "embeddings",
            details: "response carried no embedding".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        with_retry(self.config.retry, || self.embed_once(texts)).await
    }
}
