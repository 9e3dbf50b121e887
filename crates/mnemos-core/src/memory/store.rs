//! Two-tier memory store.
//!
//! Holds the hot context and the cold record map behind one reader/writer
//! lock. Vectors live in a `SimilarityIndex` that has its own lock; the
//! store always takes its own lock before the index lock.
//!
//! Every cold record has exactly one vector in the index under the same id,
//! and every indexed vector belongs to a cold record, after each `commit`
//! or `delete` returns.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use super::embeddings::{EmbeddingProvider, cosine_similarity};
use super::index::SimilarityIndex;
use super::types::{CandidateMemory, MemoryRecord, MemorySnapshot, ScoredRecord, StoreStats};
use crate::config::StoreConfig;
use crate::{MemoryError, MemoryResult};

#[derive(Default)]
struct StoreState {
    hot_context: String,
    records: HashMap<String, MemoryRecord>,
}

/// Hot context plus cold records with similarity recall
pub struct MemoryStore {
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn SimilarityIndex>,
    config: StoreConfig,
    state: RwLock<StoreState>,
}

impl MemoryStore {
    /// Create an empty store.
    ///
    /// Fails with `DimensionMismatch` when the provider and the index
    /// disagree on vector size.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn SimilarityIndex>,
        config: StoreConfig,
    ) -> MemoryResult<Self> {
        if provider.dimensions() != index.dimensions() {
            return Err(MemoryError::dimension_mismatch(
                index.dimensions(),
                provider.dimensions(),
            ));
        }

        Ok(Self {
            provider,
            index,
            config,
            state: RwLock::new(StoreState::default()),
        })
    }

    /// Store configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Vector dimension shared by the provider and the index
    pub fn dimensions(&self) -> usize {
        self.index.dimensions()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cold tier
    // ─────────────────────────────────────────────────────────────────────────

    /// Vectorise and persist a candidate, returning the new record id.
    pub async fn commit(&self, candidate: &CandidateMemory) -> MemoryResult<String> {
        let embedding = self.embed(&candidate.content).await?;
        let record = MemoryRecord::new(candidate, embedding);
        let id = record.id.clone();

        let vector = record.embedding.clone();
        let mut state = self.state.write().await;
        state.records.insert(id.clone(), record);

        if let Err(e) = self.index.insert(&id, &vector) {
            state.records.remove(&id);
            tracing::warn!("Rolled back memory {} after index insert failed: {}", id, e);
            return Err(e);
        }

        tracing::debug!(
            "Committed memory {} [{}] importance {}",
            id,
            candidate.category,
            candidate.importance
        );
        Ok(id)
    }

    /// Remove a record and evict its vector.
    pub async fn delete(&self, id: &str) -> MemoryResult<()> {
        let mut state = self.state.write().await;
        if state.records.remove(id).is_none() {
            return Err(MemoryError::not_found(id));
        }

        if !self.index.remove(id) {
            tracing::warn!("Memory {} had no vector in the index", id);
        }

        tracing::debug!("Deleted memory {}", id);
        Ok(())
    }

    /// Whether a record with this id is in the cold tier
    pub async fn exists(&self, id: &str) -> bool {
        self.state.read().await.records.contains_key(id)
    }

    /// Fetch a record by id
    pub async fn get(&self, id: &str) -> Option<MemoryRecord> {
        self.state
            .read()
            .await
            .records
            .get(id)
            .map(MemoryRecord::detached)
    }

    /// All records, oldest first
    pub async fn all(&self) -> Vec<MemoryRecord> {
        let state = self.state.read().await;
        let mut records: Vec<MemoryRecord> =
            state.records.values().map(MemoryRecord::detached).collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        records
    }

    /// Number of cold records
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Hot tier
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the hot context. Last writer wins.
    pub async fn set_context(&self, text: impl Into<String>) {
        self.state.write().await.hot_context = text.into();
    }

    /// Current hot context
    pub async fn context(&self) -> String {
        self.state.read().await.hot_context.clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Recall
    // ─────────────────────────────────────────────────────────────────────────

    /// Records similar to `query`, best first.
    ///
    /// Asks the index for up to `k` neighbours, re-checks each with exact
    /// cosine similarity and keeps those at or above `threshold`. Provider or
    /// index failures are logged and produce an empty result.
    pub async fn recall(&self, query: &str, k: usize, threshold: f32) -> Vec<MemoryRecord> {
        self.recall_scored(query, k, threshold)
            .await
            .into_iter()
            .map(|scored| scored.record)
            .collect()
    }

    /// Like `recall`, keeping the similarity of each hit.
    pub async fn recall_scored(&self, query: &str, k: usize, threshold: f32) -> Vec<ScoredRecord> {
        if k == 0 {
            return Vec::new();
        }

        let vector = match self.embed(query).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!("Recall skipped, query embedding failed: {}", e);
                return Vec::new();
            }
        };

        let state = self.state.read().await;
        let neighbors = match self.index.query(&vector, k) {
            Ok(neighbors) => neighbors,
            Err(e) => {
                tracing::warn!("Recall skipped, index query failed: {}", e);
                return Vec::new();
            }
        };

        let mut hits: Vec<ScoredRecord> = neighbors
            .into_iter()
            .filter_map(|neighbor| {
                let Some(record) = state.records.get(&neighbor.id) else {
                    tracing::debug!("Index returned {} with no backing record", neighbor.id);
                    return None;
                };
                let similarity = cosine_similarity(&vector, &neighbor.vector);
                (similarity >= threshold).then(|| ScoredRecord {
                    record: record.detached(),
                    similarity,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits
    }

    /// Records related to any candidate, deduplicated by id.
    ///
    /// Uses the configured recall limit and threshold for each candidate.
    pub async fn related_to(&self, candidates: &[CandidateMemory]) -> Vec<MemoryRecord> {
        let mut seen = HashSet::new();
        let mut related = Vec::new();

        for candidate in candidates {
            let hits = self
                .recall(
                    &candidate.content,
                    self.config.recall_limit,
                    self.config.recall_threshold,
                )
                .await;
            for record in hits {
                if seen.insert(record.id.clone()) {
                    related.push(record);
                }
            }
        }

        related
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────────────────────────────────────

    /// Consistent view of both tiers
    pub async fn snapshot(&self) -> MemorySnapshot {
        let state = self.state.read().await;
        let mut records: Vec<MemoryRecord> =
            state.records.values().map(MemoryRecord::detached).collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        MemorySnapshot {
            hot_context: state.hot_context.clone(),
            records,
            taken_at: Utc::now(),
        }
    }

    /// All records as pretty-printed JSON
    pub async fn memories_json(&self) -> MemoryResult<String> {
        Ok(serde_json::to_string_pretty(&self.all().await)?)
    }

    /// Record, vector and context counts
    pub async fn stats(&self) -> StoreStats {
        let state = self.state.read().await;
        StoreStats {
            records: state.records.len(),
            indexed: self.index.len(),
            context_chars: state.hot_context.chars().count(),
        }
    }

    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        let vector = self.provider.embed(text).await.map_err(|e| match e {
            MemoryError::Embedding { .. } => e,
            other => MemoryError::embedding(format!("{}: {}", self.provider.model_name(), other)),
        })?;
        if vector.len() != self.dimensions() {
            return Err(MemoryError::embedding(format!(
                "{} returned {} dimensions, expected {}",
                self.provider.model_name(),
                vector.len(),
                self.dimensions()
            )));
        }
        Ok(vector)
    }
}
