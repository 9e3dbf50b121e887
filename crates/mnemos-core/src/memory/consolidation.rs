//! Consolidation cycle.
//!
//! Runs one observation through the memory:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                      ConsolidationController                         │
//! │  ┌───────────┐  ┌───────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │ Summarize │─▶│ RelatedTo │─▶│ Consolidate │─▶│   SetContext    │  │
//! │  │ (fatal)   │  │           │  │ (fatal)     │  │                 │  │
//! │  └───────────┘  └───────────┘  └─────────────┘  └────────┬────────┘  │
//! │                                                          ▼           │
//! │                 ┌───────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │                 │  Commit   │◀─│   Delete    │◀─│  SelectStale    │  │
//! │                 │ (logged)  │  │  (logged)   │  │  (logged)       │  │
//! │                 └───────────┘  └─────────────┘  └─────────────────┘  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cycles on the same store are not serialised against each other. The hot
//! context is last-writer-wins: when two cycles overlap, whichever calls
//! `set_context` last decides the context, regardless of which observation
//! is newer.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::cognition::{Cognition, render_candidates};
use super::store::MemoryStore;
use crate::config::ConsolidationConfig;
use crate::{MemoryError, MemoryResult};

/// Result of a consolidation cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    /// Candidates produced by Summarize
    pub candidates: usize,
    /// Existing records found related to the candidates
    pub related: usize,
    /// Whether the candidates were rendered directly instead of consolidated
    pub consolidate_skipped: bool,
    /// Whether the hot context was replaced
    pub context_updated: bool,
    /// Ids deleted as stale
    pub deleted: Vec<String>,
    /// Ids of newly committed records
    pub committed: Vec<String>,
    /// Errors recovered during the cycle.
    pub errors: Vec<String>,
}

impl CycleReport {
    /// Check if any work was done.
    pub fn has_changes(&self) -> bool {
        self.context_updated || !self.deleted.is_empty() || !self.committed.is_empty()
    }

    /// Total records affected.
    pub fn total_affected(&self) -> usize {
        self.deleted.len() + self.committed.len()
    }
}

/// Drives Cognition and the store through one cycle per observation
pub struct ConsolidationController {
    store: Arc<MemoryStore>,
    cognition: Arc<dyn Cognition>,
    config: ConsolidationConfig,
}

impl ConsolidationController {
    pub fn new(
        store: Arc<MemoryStore>,
        cognition: Arc<dyn Cognition>,
        config: ConsolidationConfig,
    ) -> Self {
        Self {
            store,
            cognition,
            config,
        }
    }

    /// The store this controller writes to
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Run a cycle that can only end by timeout.
    pub async fn cycle(&self, observation: &str) -> MemoryResult<CycleReport> {
        self.cycle_with_cancel(observation, &CancellationToken::new())
            .await
    }

    /// Run a single consolidation cycle.
    ///
    /// Summarize and Consolidate failures abort the cycle; Summarize aborts
    /// before any state changes, Consolidate before the hot context changes.
    /// Failures after the hot context is replaced are logged, recorded in
    /// the report and skipped.
    pub async fn cycle_with_cancel(
        &self,
        observation: &str,
        cancel: &CancellationToken,
    ) -> MemoryResult<CycleReport> {
        let mut report = CycleReport::default();

        let candidates = self
            .guarded(cancel, self.cognition.summarize(observation))
            .await?;
        report.candidates = candidates.len();

        if candidates.is_empty() {
            tracing::debug!("Observation produced no candidate memories");
            return Ok(report);
        }

        let related = self
            .guarded(cancel, async {
                Ok::<_, MemoryError>(self.store.related_to(&candidates).await)
            })
            .await?;
        report.related = related.len();

        let prior = self.store.context().await;
        let merged = if prior.trim().is_empty() && related.is_empty() {
            report.consolidate_skipped = true;
            render_candidates(&candidates)
        } else {
            self.guarded(
                cancel,
                self.cognition.consolidate(&prior, &candidates, &related),
            )
            .await?
        };

        self.store.set_context(merged).await;
        report.context_updated = true;

        let stale = match self
            .guarded(cancel, self.cognition.select_stale(&related, &candidates))
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!("Failed to select stale memories: {}", e);
                report.errors.push(format!("select stale: {}", e));
                Vec::new()
            }
        };

        for id in stale {
            match self.guarded(cancel, self.store.delete(&id)).await {
                Ok(()) => report.deleted.push(id),
                Err(e) => {
                    tracing::warn!("Failed to delete stale memory {}: {}", id, e);
                    report.errors.push(format!("delete {}: {}", id, e));
                }
            }
        }

        for candidate in &candidates {
            match self.guarded(cancel, self.store.commit(candidate)).await {
                Ok(id) => report.committed.push(id),
                Err(e) => {
                    let excerpt = excerpt(&candidate.content);
                    tracing::warn!("Failed to commit memory \"{}\": {}", excerpt, e);
                    report.errors.push(format!("commit \"{}\": {}", excerpt, e));
                }
            }
        }

        tracing::info!(
            "Consolidation cycle: {} candidates, {} related, {} deleted, {} committed, {} errors",
            report.candidates,
            report.related,
            report.deleted.len(),
            report.committed.len(),
            report.errors.len()
        );

        Ok(report)
    }

    /// Race a collaborator call against cancellation and the call timeout.
    async fn guarded<T>(
        &self,
        cancel: &CancellationToken,
        call: impl Future<Output = MemoryResult<T>>,
    ) -> MemoryResult<T> {
        let limit = self.config.call_timeout();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MemoryError::Cancelled),
            result = tokio::time::timeout(limit, call) => match result {
                Ok(result) => result,
                Err(_) => Err(MemoryError::timeout(limit.as_millis() as u64)),
            },
        }
    }
}

fn excerpt(text: &str) -> String {
    const MAX_CHARS: usize = 60;
    if text.chars().count() <= MAX_CHARS {
        return text.to_string();
    }
    let mut short: String = text.chars().take(MAX_CHARS).collect();
    short.push('…');
    short
}
