//! Memory Type Definitions
//!
//! Defines the records held by the cold tier and the transient values that
//! flow through a consolidation cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A durable memory held in the cold tier.
///
/// Records are created by `MemoryStore::commit` and never mutated. The
/// embedding is private to the store and its index; records handed out by
/// the store always carry an empty embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique ID assigned at commit
    pub id: String,
    /// Free-form label such as "Architecture" or "Testing"
    pub category: String,
    /// Memory text
    pub content: String,
    /// Commit time
    pub created_at: DateTime<Utc>,
    /// Caller-assigned importance, larger is more important
    pub importance: i32,
    #[serde(skip)]
    pub(crate) embedding: Vec<f32>,
}

impl MemoryRecord {
    pub(crate) fn new(candidate: &CandidateMemory, embedding: Vec<f32>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            category: candidate.category.clone(),
            content: candidate.content.clone(),
            created_at: Utc::now(),
            importance: candidate.importance,
            embedding,
        }
    }

    /// The stored vector. Empty on every record returned by the store.
    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    /// Copy of this record with the embedding stripped
    pub(crate) fn detached(&self) -> Self {
        Self {
            embedding: Vec::new(),
            ..self.clone()
        }
    }
}

/// A proposed memory that has not been committed yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMemory {
    pub category: String,
    pub content: String,
    pub importance: i32,
}

impl CandidateMemory {
    /// Create a new candidate
    pub fn new(category: impl Into<String>, content: impl Into<String>, importance: i32) -> Self {
        Self {
            category: category.into(),
            content: content.into(),
            importance,
        }
    }
}

impl From<&MemoryRecord> for CandidateMemory {
    fn from(record: &MemoryRecord) -> Self {
        Self {
            category: record.category.clone(),
            content: record.content.clone(),
            importance: record.importance,
        }
    }
}

/// A recalled record with its exact cosine similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    pub similarity: f32,
}

/// Point-in-time view of both tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Hot context at snapshot time
    pub hot_context: String,
    /// Cold records ordered by creation time, embeddings stripped
    pub records: Vec<MemoryRecord>,
    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,
}

/// Store statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Records in the cold tier
    pub records: usize,
    /// Vectors held by the similarity index
    pub indexed: usize,
    /// Length of the hot context in characters
    pub context_chars: usize,
}

impl StoreStats {
    /// True when every record has exactly one vector and vice versa
    pub fn is_consistent(&self) -> bool {
        self.records == self.indexed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_candidate() {
        let candidate = CandidateMemory::new("Architecture", "uses hexagonal layering", 7);
        let record = MemoryRecord::new(&candidate, vec![0.5, 0.5]);

        assert!(!record.id.is_empty());
        assert_eq!(record.category, "Architecture");
        assert_eq!(record.importance, 7);
        assert_eq!(record.embedding(), &[0.5, 0.5]);
        assert!(record.detached().embedding().is_empty());
        assert_eq!(CandidateMemory::from(&record), candidate);
    }

    #[test]
    fn test_record_serialization_skips_embedding() {
        let record = MemoryRecord::new(&CandidateMemory::new("Testing", "cargo test", 3), vec![1.0]);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["category"], "Testing");
        assert!(json.get("embedding").is_none());

        let back: MemoryRecord = serde_json::from_value(json).unwrap();
        assert!(back.embedding().is_empty());
        assert_eq!(back.id, record.id);
    }
}
