//! Mnemos Configuration
//!
//! Configuration is an explicit value handed to constructors. Nothing in the
//! crate reads process-wide mutable state except the `OPENAI_API_KEY`
//! fallback when no key is configured.

use serde::{Deserialize, Serialize};

use crate::memory::Metric;

/// Environment variable consulted when no API key is configured
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default OpenAI-compatible API base URL
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MnemosConfig {
    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Similarity index configuration
    pub index: IndexConfig,

    /// Memory store configuration
    pub store: StoreConfig,

    /// Cognition (chat model) configuration
    pub cognition: CognitionConfig,

    /// Consolidation cycle configuration
    pub consolidation: ConsolidationConfig,
}

/// Which embedding adapter to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// OpenAI-compatible `/embeddings` endpoint
    OpenAi,
    /// Deterministic offline feature hashing
    Hashed,
    /// Local fastembed model (requires the `local-embeddings` feature)
    Local,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Adapter to use (default: openai)
    pub backend: EmbeddingBackend,

    /// Model name (default: text-embedding-3-small)
    pub model: String,

    /// Vector dimension produced by the provider (default: 1536)
    pub dimensions: usize,

    /// API key, falls back to `OPENAI_API_KEY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// API base URL
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::OpenAi,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536, // OpenAI default
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }
}

impl EmbeddingConfig {
    /// Offline hashed embeddings with the given dimension
    pub fn hashed(dimensions: usize) -> Self {
        Self {
            backend: EmbeddingBackend::Hashed,
            model: "hashed-bow".to_string(),
            dimensions,
            ..Default::default()
        }
    }

    /// API key from the config, or from the environment
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_api_key(self.api_key.as_deref())
    }
}

/// Which similarity index to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Hierarchical navigable small world graph
    Hnsw,
    /// Exact linear scan
    Flat,
}

/// Similarity index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Index implementation (default: hnsw)
    pub kind: IndexKind,

    /// Distance metric fixed at construction (default: cosine)
    pub metric: Metric,

    /// Maximum neighbours per node on upper layers (default: 16)
    pub max_connections: usize,

    /// Beam width while inserting (default: 200)
    pub ef_construction: usize,

    /// Beam width while querying (default: 64)
    pub ef_search: usize,

    /// Seed for the level generator, random when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            kind: IndexKind::Hnsw,
            metric: Metric::Cosine,
            max_connections: 16,
            ef_construction: 200,
            ef_search: 64,
            seed: None,
        }
    }
}

/// Memory store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Neighbours requested per recall (default: 10)
    pub recall_limit: usize,

    /// Minimum cosine similarity kept by recall (default: 0.1)
    pub recall_threshold: f32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            recall_limit: 10,
            recall_threshold: 0.1,
        }
    }
}

/// Chat model configuration used by the LLM-backed cognition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CognitionConfig {
    /// Chat model (default: gpt-4o-mini)
    pub model: String,

    /// Sampling temperature (default: 0.2)
    pub temperature: f32,

    /// API key, falls back to `OPENAI_API_KEY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// API base URL
    pub base_url: String,
}

impl Default for CognitionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }
}

impl CognitionConfig {
    /// API key from the config, or from the environment
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_api_key(self.api_key.as_deref())
    }
}

/// Consolidation cycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Per collaborator call timeout in seconds (default: 120)
    pub call_timeout_secs: u64,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: 120, // 2 minutes
        }
    }
}

impl ConsolidationConfig {
    /// Timeout applied to each collaborator call
    pub fn call_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.call_timeout_secs)
    }
}

fn resolve_api_key(configured: Option<&str>) -> Option<String> {
    configured
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .or_else(|| std::env::var(OPENAI_API_KEY_ENV).ok())
        .filter(|key| !key.is_empty())
}

impl MnemosConfig {
    /// Set embedding configuration
    pub fn with_embedding(mut self, embedding: EmbeddingConfig) -> Self {
        self.embedding = embedding;
        self
    }

    /// Set index configuration
    pub fn with_index(mut self, index: IndexConfig) -> Self {
        self.index = index;
        self
    }

    /// Set store configuration
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Set cognition configuration
    pub fn with_cognition(mut self, cognition: CognitionConfig) -> Self {
        self.cognition = cognition;
        self
    }

    /// Set consolidation configuration
    pub fn with_consolidation(mut self, consolidation: ConsolidationConfig) -> Self {
        self.consolidation = consolidation;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.embedding.dimensions == 0 {
            return Err(ConfigValidationError::invalid(
                "embedding.dimensions",
                "must be greater than 0",
            ));
        }

        if self.index.max_connections < 2 {
            return Err(ConfigValidationError::invalid(
                "index.max_connections",
                "must be at least 2",
            ));
        }

        if self.index.ef_construction < self.index.max_connections {
            return Err(ConfigValidationError::invalid(
                "index.ef_construction",
                "must be at least index.max_connections",
            ));
        }

        if self.index.ef_search == 0 {
            return Err(ConfigValidationError::invalid(
                "index.ef_search",
                "must be greater than 0",
            ));
        }

        if self.store.recall_limit == 0 {
            return Err(ConfigValidationError::invalid(
                "store.recall_limit",
                "must be greater than 0",
            ));
        }

        if !(-1.0..=1.0).contains(&self.store.recall_threshold) {
            return Err(ConfigValidationError::invalid(
                "store.recall_threshold",
                "must be between -1 and 1",
            ));
        }

        if !(0.0..=2.0).contains(&self.cognition.temperature) {
            return Err(ConfigValidationError::invalid(
                "cognition.temperature",
                "must be between 0 and 2",
            ));
        }

        if self.consolidation.call_timeout_secs == 0 {
            return Err(ConfigValidationError::invalid(
                "consolidation.call_timeout_secs",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("{backend} requires an API key (set api_key or OPENAI_API_KEY)")]
    MissingApiKey { backend: String },

    #[error("{feature} support is not compiled in")]
    FeatureDisabled { feature: String },
}

impl ConfigValidationError {
    fn invalid(field: &str, message: &str) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MnemosConfig::default();
        assert_eq!(config.embedding.backend, EmbeddingBackend::OpenAi);
        assert_eq!(config.embedding.dimensions, 1536);
        assert_eq!(config.index.kind, IndexKind::Hnsw);
        assert_eq!(config.index.max_connections, 16);
        assert_eq!(config.index.ef_construction, 200);
        assert_eq!(config.store.recall_limit, 10);
        assert!((config.store.recall_threshold - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.consolidation.call_timeout_secs, 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = MnemosConfig::default()
            .with_embedding(EmbeddingConfig::hashed(64))
            .with_store(StoreConfig {
                recall_limit: 5,
                recall_threshold: 0.5,
            });

        assert_eq!(config.embedding.backend, EmbeddingBackend::Hashed);
        assert_eq!(config.embedding.dimensions, 64);
        assert_eq!(config.store.recall_limit, 5);
    }

    #[test]
    fn test_config_validation() {
        let mut config = MnemosConfig::default();
        config.embedding.dimensions = 0;
        assert!(config.validate().is_err());

        let mut config = MnemosConfig::default();
        config.store.recall_threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("store.recall_threshold"));

        let mut config = MnemosConfig::default();
        config.index.ef_construction = 4;
        assert!(config.validate().is_err());

        let mut config = MnemosConfig::default();
        config.consolidation.call_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: MnemosConfig = toml::from_str(
            r#"
            [embedding]
            backend = "hashed"
            dimensions = 256

            [index]
            kind = "flat"
            "#,
        )
        .unwrap();

        assert_eq!(config.embedding.backend, EmbeddingBackend::Hashed);
        assert_eq!(config.embedding.dimensions, 256);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.index.kind, IndexKind::Flat);
        assert_eq!(config.index.metric, Metric::Cosine);
        assert_eq!(config.store.recall_limit, 10);
    }

    #[test]
    fn test_configured_api_key_wins() {
        let config = EmbeddingConfig {
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        assert_eq!(config.resolved_api_key().as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_missing_api_key_message() {
        let err = ConfigValidationError::MissingApiKey {
            backend: "cognition".into(),
        };
        assert_eq!(
            err.to_string(),
            "cognition requires an API key (set api_key or OPENAI_API_KEY)"
        );
    }
}
