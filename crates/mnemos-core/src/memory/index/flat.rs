//! Exact linear-scan index.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::{Metric, Neighbor, SimilarityIndex};
use crate::{MemoryError, MemoryResult};

/// Brute-force index, exact results
pub struct FlatIndex {
    dimensions: usize,
    metric: Metric,
    vectors: RwLock<HashMap<String, Vec<f32>>>,
}

impl FlatIndex {
    pub fn new(dimensions: usize, metric: Metric) -> Self {
        Self {
            dimensions,
            metric,
            vectors: RwLock::new(HashMap::new()),
        }
    }

    fn check_dimensions(&self, vector: &[f32]) -> MemoryResult<()> {
        if vector.len() != self.dimensions {
            return Err(MemoryError::dimension_mismatch(self.dimensions, vector.len()));
        }
        Ok(())
    }
}

impl SimilarityIndex for FlatIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn insert(&self, id: &str, vector: &[f32]) -> MemoryResult<()> {
        self.check_dimensions(vector)?;
        self.vectors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), vector.to_vec());
        Ok(())
    }

    fn remove(&self, id: &str) -> bool {
        self.vectors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    fn query(&self, vector: &[f32], k: usize) -> MemoryResult<Vec<Neighbor>> {
        self.check_dimensions(vector)?;
        let vectors = self.vectors.read().unwrap_or_else(PoisonError::into_inner);

        let mut neighbors: Vec<Neighbor> = vectors
            .iter()
            .map(|(id, stored)| Neighbor {
                id: id.clone(),
                vector: stored.clone(),
                distance: self.metric.distance(vector, stored),
            })
            .collect();

        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(k);
        Ok(neighbors)
    }

    fn contains(&self, id: &str) -> bool {
        self.vectors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    fn len(&self) -> usize {
        self.vectors.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_orders_by_distance() {
        let index = FlatIndex::new(2, Metric::Cosine);
        index.insert("east", &[1.0, 0.0]).unwrap();
        index.insert("north", &[0.0, 1.0]).unwrap();
        index.insert("north-east", &[1.0, 1.0]).unwrap();

        let hits = index.query(&[1.0, 0.1], 2).unwrap();
        let ids: Vec<&str> = hits.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["east", "north-east"]);
        assert_eq!(hits[0].vector, vec![1.0, 0.0]);
    }

    #[test]
    fn test_insert_replaces_and_remove_is_idempotent() {
        let index = FlatIndex::new(2, Metric::Euclidean);
        index.insert("a", &[1.0, 0.0]).unwrap();
        index.insert("a", &[0.0, 1.0]).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.query(&[0.0, 1.0], 1).unwrap()[0].vector, vec![0.0, 1.0]);

        assert!(index.remove("a"));
        assert!(!index.remove("a"));
        assert!(index.is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let index = FlatIndex::new(3, Metric::Cosine);
        let err = index.insert("a", &[1.0]).unwrap_err();
        assert!(matches!(err, MemoryError::DimensionMismatch { expected: 3, actual: 1 }));
        assert!(index.query(&[1.0, 2.0], 1).is_err());
        assert!(!index.contains("a"));
    }
}
