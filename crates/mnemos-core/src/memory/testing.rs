//! Test doubles shared by the memory test suites.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::cognition::Cognition;
use super::embeddings::{EmbeddingProvider, HashedEmbedding};
use super::index::{FlatIndex, Metric, Neighbor, SimilarityIndex};
use super::types::{CandidateMemory, MemoryRecord};
use crate::config::StoreConfig;
use crate::memory::MemoryStore;
use crate::{MemoryError, MemoryResult};

pub const DIMS: usize = 64;

/// Hashed embeddings with call counting, fixed overrides and failure modes
pub struct StubEmbedding {
    inner: HashedEmbedding,
    table: HashMap<String, Vec<f32>>,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub time_out: AtomicBool,
    pub wrong_dimension: AtomicBool,
}

impl StubEmbedding {
    pub fn new() -> Self {
        Self {
            inner: HashedEmbedding::new(DIMS),
            table: HashMap::new(),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            time_out: AtomicBool::new(false),
            wrong_dimension: AtomicBool::new(false),
        }
    }

    /// Pin `text` to a one-hot-ish vector built from `weights`
    pub fn with_vector(mut self, text: &str, weights: &[f32]) -> Self {
        let mut vector = vec![0.0; DIMS];
        vector[..weights.len()].copy_from_slice(weights);
        self.table.insert(text.to_string(), vector);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedding {
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(MemoryError::embedding("provider offline"));
        }
        if self.time_out.load(Ordering::SeqCst) {
            return Err(MemoryError::timeout(30_000));
        }
        if self.wrong_dimension.load(Ordering::SeqCst) {
            return Ok(vec![1.0; DIMS + 1]);
        }
        Ok(self
            .table
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.inner.embed_sync(text)))
    }

    fn model_name(&self) -> &str {
        "stub"
    }

    fn dimensions(&self) -> usize {
        DIMS
    }
}

/// Flat index whose inserts can be made to fail
pub struct FlakyIndex {
    inner: FlatIndex,
    pub fail_inserts: AtomicBool,
}

impl FlakyIndex {
    pub fn new() -> Self {
        Self {
            inner: FlatIndex::new(DIMS, Metric::Cosine),
            fail_inserts: AtomicBool::new(false),
        }
    }
}

impl SimilarityIndex for FlakyIndex {
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn metric(&self) -> Metric {
        self.inner.metric()
    }

    fn insert(&self, id: &str, vector: &[f32]) -> MemoryResult<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(MemoryError::dimension_mismatch(DIMS, 0));
        }
        self.inner.insert(id, vector)
    }

    fn remove(&self, id: &str) -> bool {
        self.inner.remove(id)
    }

    fn query(&self, vector: &[f32], k: usize) -> MemoryResult<Vec<Neighbor>> {
        self.inner.query(vector, k)
    }

    fn contains(&self, id: &str) -> bool {
        self.inner.contains(id)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

pub fn store_with(provider: Arc<StubEmbedding>, index: Arc<FlakyIndex>) -> MemoryStore {
    let store_config = StoreConfig {
        recall_limit: 10,
        recall_threshold: 0.3,
    };
    MemoryStore::new(provider, index, store_config).unwrap()
}

pub fn test_store() -> (MemoryStore, Arc<StubEmbedding>, Arc<FlakyIndex>) {
    let provider = Arc::new(StubEmbedding::new());
    let index = Arc::new(FlakyIndex::new());
    (store_with(provider.clone(), index.clone()), provider, index)
}

pub fn candidate(category: &str, content: &str, importance: i32) -> CandidateMemory {
    CandidateMemory::new(category, content, importance)
}

/// Cognition returning queued answers and recording what it was asked
#[derive(Default)]
pub struct ScriptedCognition {
    pub summaries: Mutex<VecDeque<MemoryResult<Vec<CandidateMemory>>>>,
    pub merges: Mutex<VecDeque<MemoryResult<String>>>,
    pub stale: Mutex<VecDeque<MemoryResult<Vec<String>>>>,
    pub consolidate_calls: AtomicUsize,
    pub seen_related: Mutex<Vec<Vec<MemoryRecord>>>,
    pub consolidate_delay: Option<Duration>,
}

impl ScriptedCognition {
    pub fn summarize_to(self, candidates: Vec<CandidateMemory>) -> Self {
        self.summaries.lock().unwrap().push_back(Ok(candidates));
        self
    }

    pub fn summarize_err(self, message: &str) -> Self {
        self.summaries
            .lock()
            .unwrap()
            .push_back(Err(MemoryError::cognition(message)));
        self
    }

    pub fn merge_to(self, context: &str) -> Self {
        self.merges.lock().unwrap().push_back(Ok(context.to_string()));
        self
    }

    pub fn merge_err(self, message: &str) -> Self {
        self.merges
            .lock()
            .unwrap()
            .push_back(Err(MemoryError::cognition(message)));
        self
    }

    pub fn stale_ids(self, ids: Vec<String>) -> Self {
        self.stale.lock().unwrap().push_back(Ok(ids));
        self
    }

    pub fn stale_err(self, message: &str) -> Self {
        self.stale
            .lock()
            .unwrap()
            .push_back(Err(MemoryError::cognition(message)));
        self
    }

    pub fn with_consolidate_delay(mut self, delay: Duration) -> Self {
        self.consolidate_delay = Some(delay);
        self
    }

    pub fn consolidate_calls(&self) -> usize {
        self.consolidate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Cognition for ScriptedCognition {
    async fn summarize(&self, _observation: &str) -> MemoryResult<Vec<CandidateMemory>> {
        self.summaries
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn consolidate(
        &self,
        _prior_context: &str,
        _candidates: &[CandidateMemory],
        related: &[MemoryRecord],
    ) -> MemoryResult<String> {
        self.consolidate_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_related.lock().unwrap().push(related.to_vec());
        let answer = self
            .merges
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()));
        if let Some(delay) = self.consolidate_delay {
            tokio::time::sleep(delay).await;
        }
        answer
    }

    async fn select_stale(
        &self,
        _old: &[MemoryRecord],
        _new: &[CandidateMemory],
    ) -> MemoryResult<Vec<String>> {
        self.stale
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
