//! Embedding Providers
//!
//! Turns text into fixed-dimension vectors for similarity recall.
//!
//! # Providers
//!
//! - `OpenAiEmbedding` - OpenAI-compatible `/embeddings` endpoint
//! - `HashedEmbedding` - deterministic offline feature hashing
//! - `FastEmbedProvider` - local all-MiniLM-L6-v2 (`local-embeddings` feature)
//!
//! Providers do not retry or cache. Every vector produced by one provider
//! instance has `dimensions()` elements.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{ConfigValidationError, EmbeddingBackend, EmbeddingConfig};
use crate::{MemoryError, MemoryResult};

/// Text to vector collaborator
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate the embedding for a single text
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>>;

    /// Get the model name being used
    fn model_name(&self) -> &str;

    /// Get the embedding dimensions
    fn dimensions(&self) -> usize;
}

/// Build the provider selected by the configuration
pub fn create_provider(config: &EmbeddingConfig) -> MemoryResult<Arc<dyn EmbeddingProvider>> {
    match config.backend {
        EmbeddingBackend::OpenAi => {
            let api_key = config.resolved_api_key().ok_or_else(|| {
                ConfigValidationError::MissingApiKey {
                    backend: "embedding".into(),
                }
            })?;
            Ok(Arc::new(OpenAiEmbedding::new(
                api_key,
                config.model.clone(),
                config.dimensions,
                config.base_url.clone(),
            )))
        }
        EmbeddingBackend::Hashed => Ok(Arc::new(HashedEmbedding::new(config.dimensions))),
        #[cfg(feature = "local-embeddings")]
        EmbeddingBackend::Local => Ok(Arc::new(FastEmbedProvider::new())),
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingBackend::Local => Err(ConfigValidationError::FeatureDisabled {
            feature: "local-embeddings".into(),
        }
        .into()),
    }
}

/// Compute cosine similarity between two vectors
///
/// Returns a value between -1.0 and 1.0, where 1.0 means identical,
/// 0.0 means orthogonal, and -1.0 means opposite. Mismatched lengths and
/// zero vectors yield 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Euclidean distance between two vectors of equal length
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI
// ─────────────────────────────────────────────────────────────────────────────

/// OpenAI-compatible embedding provider
pub struct OpenAiEmbedding {
    api_key: String,
    model: String,
    dimensions: usize,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiEmbedding {
    pub fn new(api_key: String, model: String, dimensions: usize, base_url: String) -> Self {
        Self {
            api_key,
            model,
            dimensions,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn request(&self, text: &str) -> EmbeddingRequest {
        // Only the text-embedding-3 family accepts a custom output size.
        let dimensions = self
            .model
            .starts_with("text-embedding-3")
            .then_some(self.dimensions);

        EmbeddingRequest {
            input: vec![text.to_string()],
            model: self.model.clone(),
            dimensions,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    input: Vec<String>,
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request(text))
            .send()
            .await
            .map_err(|e| MemoryError::embedding(format!("HTTP error: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::embedding(format!(
                "embedding API error {}: {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::embedding(format!("JSON parse error: {}", e)))?;

        let vector = result
            .data
            .into_iter()
            .min_by_key(|d| d.index)
            .map(|d| d.embedding)
            .ok_or_else(|| MemoryError::embedding("No embedding returned"))?;

        if vector.len() != self.dimensions {
            return Err(MemoryError::embedding(format!(
                "model {} returned {} dimensions, expected {}",
                self.model,
                vector.len(),
                self.dimensions
            )));
        }

        Ok(vector)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Feature hashing
// ─────────────────────────────────────────────────────────────────────────────

/// Deterministic bag-of-words embeddings.
///
/// Each lowercase alphanumeric token is hashed with SHA-256 into a signed
/// bucket; the result is L2-normalised. Texts sharing vocabulary land close
/// together, identical texts map to identical vectors. Needs no network.
pub struct HashedEmbedding {
    dimensions: usize,
}

impl HashedEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Synchronous embedding used by the async trait method
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return vector;
        }

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashedEmbedding {
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn model_name(&self) -> &str {
        "hashed-bow"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Local model
// ─────────────────────────────────────────────────────────────────────────────

/// Embedding dimensions for all-MiniLM-L6-v2
pub const LOCAL_EMBEDDING_DIMENSIONS: usize = 384;

/// Local embeddings using `fastembed` with lazy model loading
#[cfg(feature = "local-embeddings")]
pub struct FastEmbedProvider {
    model: tokio::sync::RwLock<Option<fastembed::TextEmbedding>>,
}

#[cfg(feature = "local-embeddings")]
impl Default for FastEmbedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "local-embeddings")]
impl FastEmbedProvider {
    pub fn new() -> Self {
        Self {
            model: tokio::sync::RwLock::new(None),
        }
    }

    async fn ensure_model(&self) -> MemoryResult<()> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        if self.model.read().await.is_some() {
            return Ok(());
        }

        let mut model_guard = self.model.write().await;
        if model_guard.is_some() {
            return Ok(());
        }

        tracing::info!("Loading embedding model: all-MiniLM-L6-v2");
        let start = std::time::Instant::now();

        let mut init_options = InitOptions::default();
        init_options.model_name = EmbeddingModel::AllMiniLML6V2;
        init_options.show_download_progress = false;

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| MemoryError::embedding(format!("Failed to load embedding model: {}", e)))?;

        tracing::info!("Embedding model loaded in {:?}", start.elapsed());

        *model_guard = Some(model);
        Ok(())
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        self.ensure_model().await?;

        let model_guard = self.model.read().await;
        let model = model_guard
            .as_ref()
            .ok_or_else(|| MemoryError::embedding("Embedding model not initialized"))?;

        model
            .embed(vec![text], None)
            .map_err(|e| MemoryError::embedding(format!("Failed to generate embedding: {}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::embedding("No embedding generated"))
    }

    fn model_name(&self) -> &str {
        "all-MiniLM-L6-v2"
    }

    fn dimensions(&self) -> usize {
        LOCAL_EMBEDDING_DIMENSIONS
    }
}
