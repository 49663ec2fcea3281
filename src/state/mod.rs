//! Orchestrator state model: the crash-consistent root of truth for issues,
//! manifests, attempts, locks, workers, and batches.

pub mod batch;
pub mod issue;
pub mod lock;
pub mod store;
pub mod worker;

pub use batch::{Batch, BatchStatus};
pub use issue::{AttemptRecord, AttemptResult, IssueState, IssueStatus};
pub use lock::{LockEntry, LockTable};
pub use store::StateStore;
pub use worker::{WorkerState, WorkerStatus};

use std::collections::BTreeMap;

use crate::ids::{BatchId, IssueId};

/// Current on-disk schema version. Bump when the JSON shape changes in a
/// way readers must be aware of; loaders tolerate unknown top-level keys
/// regardless.
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// The root persisted state object.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OrchestratorState {
    pub state_version: u32,
    pub project_name: String,
    pub last_saved: chrono::DateTime<chrono::Utc>,
    pub issues: BTreeMap<IssueId, IssueState>,
    pub pending_batches: Vec<Batch>,
    pub current_batch: Option<Batch>,
    pub next_batch_id: BatchId,
    pub workers: Vec<WorkerState>,
    pub locks: LockTable,
    pub total_iterations: u64,
    pub successful_completions: u64,
    pub failed_attempts: u64,
}

impl OrchestratorState {
    /// A fresh state for a new project, with `num_workers` idle slots.
    #[must_use]
    pub fn fresh(project_name: impl Into<String>, num_workers: usize) -> Self {
        Self {
            state_version: STATE_SCHEMA_VERSION,
            project_name: project_name.into(),
            last_saved: chrono::Utc::now(),
            issues: BTreeMap::new(),
            pending_batches: Vec::new(),
            current_batch: None,
            next_batch_id: BatchId::first(),
            workers: (0..num_workers).map(|_| WorkerState::idle()).collect(),
            locks: LockTable::new(),
            total_iterations: 0,
            successful_completions: 0,
            failed_attempts: 0,
        }
    }

    /// Every batch id that has ever existed in this state (pending, current,
    /// or already completed issues' attempt history doesn't carry batch ids,
    /// so only pending + current are in scope here).
    #[must_use]
    pub fn max_known_batch_id(&self) -> Option<BatchId> {
        self.pending_batches
            .iter()
            .chain(self.current_batch.iter())
            .map(|b| b.id)
            .max_by_key(|id| id.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_has_idle_workers_and_no_batches() {
        let state = OrchestratorState::fresh("demo", 3);
        assert_eq!(state.workers.len(), 3);
        assert!(state.workers.iter().all(|w| w.status == WorkerStatus::Idle));
        assert!(state.pending_batches.is_empty());
        assert!(state.current_batch.is_none());
        assert_eq!(state.next_batch_id, BatchId::first());
    }
}
