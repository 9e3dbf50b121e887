//! Cognition collaborator.
//!
//! The reasoning half of a consolidation cycle: turning raw observations
//! into candidate memories, merging them into the hot context, and picking
//! which old records have been superseded.

use async_trait::async_trait;

use super::types::{CandidateMemory, MemoryRecord};
use crate::MemoryResult;

/// Pluggable reasoning over memories, usually backed by a chat model
#[async_trait]
pub trait Cognition: Send + Sync {
    /// Extract candidate memories from a raw observation.
    ///
    /// Returning an empty list is valid and means nothing worth keeping.
    async fn summarize(&self, observation: &str) -> MemoryResult<Vec<CandidateMemory>>;

    /// Produce the new hot context from the prior one, the fresh candidates
    /// and the related records already in the cold tier.
    async fn consolidate(
        &self,
        prior_context: &str,
        candidates: &[CandidateMemory],
        related: &[MemoryRecord],
    ) -> MemoryResult<String>;

    /// Ids from `old` that are superseded by `new`.
    ///
    /// Implementations should only return ids present in `old`; the
    /// controller ignores anything else.
    async fn select_stale(
        &self,
        old: &[MemoryRecord],
        new: &[CandidateMemory],
    ) -> MemoryResult<Vec<String>>;
}

/// Render candidates as a hot context without consulting Cognition.
///
/// One line per candidate, highest importance first, content verbatim.
pub fn render_candidates(candidates: &[CandidateMemory]) -> String {
    let mut ordered: Vec<&CandidateMemory> = candidates.iter().collect();
    ordered.sort_by(|a, b| b.importance.cmp(&a.importance));

    ordered
        .into_iter()
        .map(|c| format!("- [{}] {} (importance {})", c.category, c.content, c.importance))
        .collect::<Vec<_>>()
        .join("\n")
}
