//! In-memory completion ledger.
//!
//! Records that the pipeline for a `(uuid, plan_id)` pair has finished.
//! Flags are set once and never cleared; the ledger lives for the lifetime of
//! the process and is independent of the job registry.

use std::collections::HashSet;

use hvac_core::pipeline::ledger_key::completion_key;
use hvac_core::pipeline::state::CompletionStatus;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct CompletionLedger {
    completed: RwLock<HashSet<String>>,
}

impl CompletionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the pipeline for `(uuid, plan_id)` as complete. Idempotent.
    ///
    /// Returns the normalised ledger key.
    pub async fn mark_complete(&self, uuid: &str, plan_id: &str) -> String {
        let key = completion_key(uuid, plan_id);
        let newly_marked = self.completed.write().await.insert(key.clone());
        tracing::info!(pipeline_key = %key, newly_marked, "Marked pipeline as completed");
        key
    }

    /// Look up the completion flag; unknown keys are `Pending`.
    pub async fn check_status(&self, uuid: &str, plan_id: &str) -> CompletionStatus {
        let key = completion_key(uuid, plan_id);
        if self.completed.read().await.contains(&key) {
            CompletionStatus::Completed
        } else {
            CompletionStatus::Pending
        }
    }

    /// Number of recorded completions.
    pub async fn len(&self) -> usize {
        self.completed.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.completed.read().await.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
