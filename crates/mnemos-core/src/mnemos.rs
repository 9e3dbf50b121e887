//! Main entry point.
//!
//! Wires provider, index, store, cognition and controller from one
//! `MnemosConfig`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::memory::embeddings::create_provider;
use crate::memory::index::create_index;
use crate::memory::{
    ChatCognition, Cognition, ConsolidationController, CycleReport, EmbeddingProvider,
    MemoryStore, OpenAiChatClient, SimilarityIndex,
};
use crate::{MemoryResult, MnemosConfig};

/// Mnemos - tiered semantic memory
///
/// # Example
///
/// ```rust,no_run
/// use mnemos_core::{Mnemos, MnemosConfig};
///
/// async fn example() -> anyhow::Result<()> {
///     let mnemos = Mnemos::new(MnemosConfig::default())?;
///
///     // Feed an observation through a consolidation cycle
///     mnemos.observe("We moved session storage from Redis to Postgres").await?;
///
///     // Recall what is known about storage
///     let related = mnemos.store().recall("session storage", 5, 0.2).await;
///
///     Ok(())
/// }
/// ```
pub struct Mnemos {
    config: MnemosConfig,
    store: Arc<MemoryStore>,
    controller: ConsolidationController,
}

impl Mnemos {
    /// Build every component from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - A required API key is missing
    /// - The provider and index disagree on dimensions
    pub fn new(config: MnemosConfig) -> MemoryResult<Self> {
        config.validate()?;

        let provider = create_provider(&config.embedding)?;
        let index = create_index(&config.index, provider.dimensions());
        let cognition = Arc::new(ChatCognition::new(OpenAiChatClient::from_config(
            &config.cognition,
        )?));

        Self::with_components(config, provider, index, cognition)
    }

    /// Build with caller-supplied collaborators.
    pub fn with_components(
        config: MnemosConfig,
        provider: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn SimilarityIndex>,
        cognition: Arc<dyn Cognition>,
    ) -> MemoryResult<Self> {
        config.validate()?;

        let store = Arc::new(MemoryStore::new(provider, index, config.store.clone())?);
        let controller =
            ConsolidationController::new(store.clone(), cognition, config.consolidation.clone());

        tracing::debug!(
            "Mnemos ready: {:?} index, {} dimensions",
            config.index.kind,
            store.dimensions()
        );

        Ok(Self {
            config,
            store,
            controller,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &MnemosConfig {
        &self.config
    }

    /// The memory store
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// The consolidation controller
    pub fn controller(&self) -> &ConsolidationController {
        &self.controller
    }

    /// Run one consolidation cycle
    pub async fn observe(&self, observation: &str) -> MemoryResult<CycleReport> {
        self.controller.cycle(observation).await
    }

    /// Run one consolidation cycle that stops when `cancel` fires
    pub async fn observe_with_cancel(
        &self,
        observation: &str,
        cancel: &CancellationToken,
    ) -> MemoryResult<CycleReport> {
        self.controller.cycle_with_cancel(observation, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingConfig, IndexConfig, IndexKind};
    use crate::memory::HashedEmbedding;
    use crate::memory::testing::{ScriptedCognition, candidate};

    fn offline_config() -> MnemosConfig {
        MnemosConfig::default()
            .with_embedding(EmbeddingConfig::hashed(64))
            .with_index(IndexConfig {
                seed: Some(11),
                ..Default::default()
            })
    }

    #[tokio::test]
    async fn test_observe_with_injected_components() {
        let config = offline_config();
        let provider = Arc::new(HashedEmbedding::new(64));
        let index = create_index(&config.index, 64);
        let cognition = Arc::new(
            ScriptedCognition::default()
                .summarize_to(vec![candidate("Team", "reviews need two approvals", 6)]),
        );

        let mnemos = Mnemos::with_components(config, provider, index, cognition).unwrap();
        let report = mnemos.observe("process notes").await.unwrap();

        assert_eq!(report.committed.len(), 1);
        assert!(mnemos.store().context().await.contains("reviews need two approvals"));
        let hits = mnemos.store().recall("reviews need two approvals", 3, 0.5).await;
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_new_requires_cognition_key_or_env() {
        let mut config = offline_config();
        config.cognition.api_key = Some("sk-test".into());
        assert!(Mnemos::new(config).is_ok());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = offline_config();
        config.store.recall_limit = 0;
        assert!(Mnemos::new(config).is_err());
    }

    #[test]
    fn test_flat_index_from_config() {
        let mut config = offline_config();
        config.index.kind = IndexKind::Flat;
        config.cognition.api_key = Some("sk-test".into());
        let mnemos = Mnemos::new(config).unwrap();
        assert_eq!(mnemos.store().dimensions(), 64);
    }
}
