//! Tiered Semantic Memory
//!
//! Two tiers:
//! - Hot: one working-context string, replaced wholesale on every cycle
//! - Cold: durable records, recalled by embedding similarity
//!
//! # Architecture
//!
//! Observations flow through a consolidation cycle:
//! 1. Cognition summarizes the observation into candidate memories
//! 2. The store recalls existing records related to the candidates
//! 3. Cognition merges candidates and related records into a new hot context
//! 4. Superseded records are deleted and the candidates are committed

mod cognition;
mod consolidation;
pub mod embeddings;
pub mod index;
pub mod llm;
mod store;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use cognition::{Cognition, render_candidates};
pub use consolidation::{ConsolidationController, CycleReport};
pub use embeddings::{EmbeddingProvider, HashedEmbedding, OpenAiEmbedding, cosine_similarity};
pub use index::{FlatIndex, HnswIndex, Metric, Neighbor, SimilarityIndex};
pub use llm::{ChatClient, ChatCognition, ChatRequest, OpenAiChatClient, ResponseSchema};
pub use store::MemoryStore;
pub use types::{CandidateMemory, MemoryRecord, MemorySnapshot, ScoredRecord, StoreStats};

#[cfg(feature = "local-embeddings")]
pub use embeddings::FastEmbedProvider;
