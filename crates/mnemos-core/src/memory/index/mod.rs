//! Similarity Indexes
//!
//! Nearest-neighbour structures over fixed-dimension vectors keyed by record
//! id. Each index carries its own lock; callers never hold it across an
//! await point.

mod flat;
mod hnsw;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::embeddings::{cosine_similarity, euclidean_distance};
use crate::config::{IndexConfig, IndexKind};
use crate::MemoryResult;

pub use flat::FlatIndex;
pub use hnsw::{HnswIndex, HnswParams};

/// Distance metric fixed at index construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// `1 - cosine_similarity`
    Cosine,
    /// L2 distance
    Euclidean,
}

impl Metric {
    /// Distance between two vectors, smaller is closer
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => 1.0 - cosine_similarity(a, b),
            Self::Euclidean => euclidean_distance(a, b),
        }
    }
}

/// A neighbour returned by `SimilarityIndex::query`
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: String,
    pub vector: Vec<f32>,
    pub distance: f32,
}

/// Approximate nearest-neighbour index
pub trait SimilarityIndex: Send + Sync {
    /// Vector dimension accepted by this index
    fn dimensions(&self) -> usize;

    /// Metric chosen at construction
    fn metric(&self) -> Metric;

    /// Add a vector, replacing any existing vector with the same id.
    ///
    /// Fails with `DimensionMismatch` when `vector.len() != dimensions()`.
    fn insert(&self, id: &str, vector: &[f32]) -> MemoryResult<()>;

    /// Remove a vector. Returns false when the id is absent.
    fn remove(&self, id: &str) -> bool;

    /// Up to `k` nearest neighbours, closest first.
    ///
    /// Fails with `DimensionMismatch` for a wrong-sized query.
    fn query(&self, vector: &[f32], k: usize) -> MemoryResult<Vec<Neighbor>>;

    /// Whether a vector is stored under `id`
    fn contains(&self, id: &str) -> bool;

    /// Number of stored vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the index selected by the configuration
pub fn create_index(config: &IndexConfig, dimensions: usize) -> Arc<dyn SimilarityIndex> {
    match config.kind {
        IndexKind::Hnsw => Arc::new(HnswIndex::new(
            dimensions,
            config.metric,
            HnswParams::from_config(config),
        )),
        IndexKind::Flat => Arc::new(FlatIndex::new(dimensions, config.metric)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_distance() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!(Metric::Cosine.distance(&a, &a).abs() < 0.001);
        assert!((Metric::Cosine.distance(&a, &b) - 1.0).abs() < 0.001);
        assert!((Metric::Euclidean.distance(&a, &b) - 2f32.sqrt()).abs() < 0.001);
    }

    #[test]
    fn test_create_index_by_kind() {
        let mut config = IndexConfig::default();
        let index = create_index(&config, 8);
        assert_eq!(index.dimensions(), 8);
        assert_eq!(index.metric(), Metric::Cosine);

        config.kind = IndexKind::Flat;
        config.metric = Metric::Euclidean;
        let index = create_index(&config, 4);
        assert_eq!(index.metric(), Metric::Euclidean);
        assert!(index.is_empty());
    }
}
