//! Mnemos Core - Tiered Semantic Memory for LLM Agents
//!
//! Gives an agent bounded, retrievable knowledge across interactions:
//!
//! - **memory::store** - hot context plus cold records with similarity recall
//! - **memory::index** - HNSW and exact nearest-neighbour indexes
//! - **memory::embeddings** - OpenAI, hashed and local embedding providers
//! - **memory::llm** - chat-model backed Cognition with hand-written schemas
//! - **memory::consolidation** - the summarize / merge / prune / commit cycle
//!
//! # Example
//!
//! ```rust,no_run
//! use mnemos_core::{Mnemos, MnemosConfig};
//! use mnemos_core::config::EmbeddingConfig;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let config = MnemosConfig::default().with_embedding(EmbeddingConfig::hashed(256));
//!     let mnemos = Mnemos::new(config)?;
//!
//!     let report = mnemos.observe("CI now runs on self-hosted runners").await?;
//!     println!("committed {} memories", report.committed.len());
//!
//!     println!("{}", mnemos.store().context().await);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod memory;

mod error;
mod mnemos;

pub use config::{ConfigValidationError, MnemosConfig};
pub use error::{MemoryError, MemoryResult};
pub use mnemos::Mnemos;

pub use memory::{
    CandidateMemory, Cognition, ConsolidationController, CycleReport, EmbeddingProvider,
    MemoryRecord, MemorySnapshot, MemoryStore, SimilarityIndex,
};
