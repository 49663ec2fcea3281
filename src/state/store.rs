//! [`StateStore`]: the sole owner of [`super::OrchestratorState`], exposing
//! every state-mutating operation the rest of the orchestrator needs.

use std::path::{Path, PathBuf};

use crate::error::{OrchestratorError, Result};
use crate::ids::{BatchId, IssueId, WorkerId};
use crate::manifest::Manifest;

use super::{
    AttemptRecord, AttemptResult, Batch, BatchStatus, IssueState, IssueStatus, OrchestratorState,
    WorkerState, WorkerStatus,
};

/// Default threshold past which a lock is considered stale during crash
/// recovery and periodic cleanup.
#[must_use]
pub fn default_stale_lock_age() -> chrono::Duration {
    chrono::Duration::hours(2)
}

/// Owns the [`OrchestratorState`] tree and the on-disk snapshot it is
/// persisted to. All other components borrow from or mutate through this
/// type — there is no other path to the data.
pub struct StateStore {
    state: OrchestratorState,
    state_path: PathBuf,
}

impl StateStore {
    /// Load state from `<state_dir>/state.json`. A missing file produces a
    /// fresh state (not an error); a present-but-unparseable file is a
    /// [`OrchestratorError::StateCorrupted`].
    pub fn load(state_dir: &Path, project_name: &str, num_workers: usize) -> Result<Self> {
        std::fs::create_dir_all(state_dir)?;
        let state_path = state_dir.join("state.json");

        let state = match std::fs::read(&state_path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
                OrchestratorError::StateCorrupted {
                    path: state_path.clone(),
                    detail: err.to_string(),
                }
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                OrchestratorState::fresh(project_name, num_workers)
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Self { state, state_path })
    }

    #[must_use]
    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    /// Bump the iteration counter. Called once per orchestrator loop pass,
    /// including iterations resumed after a crash.
    pub fn record_iteration(&mut self) {
        self.state.total_iterations += 1;
    }

    /// Atomically persist the current state: write to a temp file in the
    /// same directory, back up the previous snapshot to `.bak`, then
    /// rename the temp file into place.
    pub fn save(&mut self) -> Result<()> {
        self.state.last_saved = chrono::Utc::now();
        let bytes = serde_json::to_vec_pretty(&self.state).map_err(|err| {
            OrchestratorError::StateCorrupted {
                path: self.state_path.clone(),
                detail: err.to_string(),
            }
        })?;

        let tmp_path = self.state_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &bytes)?;

        if self.state_path.exists() {
            let bak_path = self.state_path.with_extension("json.bak");
            std::fs::rename(&self.state_path, &bak_path)?;
        }
        std::fs::rename(&tmp_path, &self.state_path)?;
        Ok(())
    }

    // -- issue lifecycle ----------------------------------------------

    /// Ensure an issue exists in state (inserting a fresh `Pending` entry
    /// the first time it's seen) and return a mutable reference.
    pub fn ensure_issue(&mut self, id: &IssueId) -> &mut IssueState {
        self.state.issues.entry(id.clone()).or_default()
    }

    pub fn get_issue(&self, id: &IssueId) -> Option<&IssueState> {
        self.state.issues.get(id)
    }

    pub fn update_issue(&mut self, id: &IssueId, status: IssueStatus) -> Result<()> {
        let issue = self
            .state
            .issues
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::UnknownIssue { id: id.clone() })?;
        issue.status = status;
        Ok(())
    }

    /// Record an attempt, bumping `attempt_count` first so
    /// `attempt_number == issue.attempt_count` holds at insertion.
    pub fn record_attempt(
        &mut self,
        id: &IssueId,
        result: AttemptResult,
        files_touched: Vec<String>,
        notes: impl Into<String>,
    ) -> Result<()> {
        let issue = self
            .state
            .issues
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::UnknownIssue { id: id.clone() })?;
        issue.attempt_count += 1;
        let record = AttemptRecord {
            attempt_number: issue.attempt_count,
            timestamp: chrono::Utc::now(),
            result,
            files_touched,
            notes: notes.into(),
        };
        issue.last_attempt = Some(record);

        match result {
            AttemptResult::Success => self.state.successful_completions += 1,
            AttemptResult::Failed | AttemptResult::Timeout | AttemptResult::Violation => {
                self.state.failed_attempts += 1;
            }
        }
        Ok(())
    }

    pub fn set_manifest(&mut self, id: &IssueId, manifest: Manifest) -> Result<()> {
        let issue = self
            .state
            .issues
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::UnknownIssue { id: id.clone() })?;
        issue.manifest = Some(manifest);
        Ok(())
    }

    #[must_use]
    pub fn get_manifest(&self, id: &IssueId) -> Option<&Manifest> {
        self.state.issues.get(id).and_then(|i| i.manifest.as_ref())
    }

    // -- locks -----------------------------------------------------------

    /// See [`super::lock::LockTable::try_acquire`]. Requires a manifest to
    /// already be set on `id`. Returns [`OrchestratorError::LockConflict`]
    /// naming the path and the issue already holding it, rather than a bare
    /// `false`, so a caller can surface an agent-readable explanation.
    pub fn try_acquire_locks(&mut self, id: &IssueId, worker: WorkerId) -> Result<()> {
        let manifest = self
            .state
            .issues
            .get(id)
            .ok_or_else(|| OrchestratorError::UnknownIssue { id: id.clone() })?
            .manifest
            .clone()
            .unwrap_or_default();

        if self
            .state
            .locks
            .try_acquire(id, worker, &manifest, chrono::Utc::now())
        {
            return Ok(());
        }

        let conflicting_path = manifest
            .primary_base_paths()
            .into_iter()
            .find(|path| self.state.locks.get(path).is_some_and(|lock| &lock.issue_id != id));
        let holder = conflicting_path
            .and_then(|path| self.state.locks.get(path))
            .map(|lock| lock.issue_id.clone())
            .unwrap_or_else(|| id.clone());
        Err(OrchestratorError::LockConflict {
            path: conflicting_path.unwrap_or_default().into(),
            holder,
            requester: id.clone(),
        })
    }

    pub fn release_locks(&mut self, id: &IssueId) {
        self.state.locks.release(id);
    }

    pub fn cleanup_stale_locks(&mut self, max_age: chrono::Duration) -> usize {
        self.state.locks.cleanup_stale(max_age, chrono::Utc::now())
    }

    /// `true` iff issues `a` and `b` have manifests whose primary-file base
    /// paths intersect. Issues without manifests never conflict.
    #[must_use]
    pub fn issues_conflict(&self, a: &IssueId, b: &IssueId) -> bool {
        let Some(manifest_a) = self.state.issues.get(a).and_then(|i| i.manifest.as_ref()) else {
            return false;
        };
        let Some(manifest_b) = self.state.issues.get(b).and_then(|i| i.manifest.as_ref()) else {
            return false;
        };
        super::LockTable::manifests_conflict(manifest_a, manifest_b)
    }

    // -- workers -----------------------------------------------------------

    #[must_use]
    pub fn find_idle_worker(&self) -> Option<WorkerId> {
        self.state
            .workers
            .iter()
            .position(|w| w.status.is_available())
            .and_then(|idx| WorkerId::new(idx).ok())
    }

    pub fn assign_worker(&mut self, worker: WorkerId, issue: &IssueId) -> Result<()> {
        let slot = self.worker_slot_mut(worker)?;
        slot.status = WorkerStatus::Starting;
        slot.current_issue = Some(issue.clone());
        slot.started_at = Some(chrono::Utc::now());

        if let Some(issue_state) = self.state.issues.get_mut(issue) {
            issue_state.status = IssueStatus::Assigned;
            issue_state.assigned_worker = Some(worker);
        }
        Ok(())
    }

    /// Advance a `Starting` slot to `Running` once its child process has
    /// produced its first output or otherwise confirmed it's alive. A
    /// no-op on a slot that's already past `Starting` (e.g. a respawn
    /// within the same dispatch that already advanced it).
    pub fn mark_worker_running(&mut self, worker: WorkerId) -> Result<()> {
        let slot = self.worker_slot_mut(worker)?;
        if slot.status == WorkerStatus::Starting {
            slot.status = WorkerStatus::Running;
        }
        Ok(())
    }

    /// Mark a worker's current task complete, freeing the slot and clearing
    /// the owning issue's `assigned_worker`.
    pub fn complete_worker(&mut self, worker: WorkerId, success: bool) -> Result<()> {
        let current_issue = self.worker_slot(worker)?.current_issue.clone();
        let slot = self.worker_slot_mut(worker)?;
        slot.status = if success {
            WorkerStatus::Completed
        } else {
            WorkerStatus::Failed
        };
        slot.current_issue = None;

        if let Some(id) = current_issue {
            self.release_locks(&id);
            if let Some(issue_state) = self.state.issues.get_mut(&id) {
                issue_state.assigned_worker = None;
                issue_state.status = if success {
                    IssueStatus::Completed
                } else {
                    IssueStatus::Failed
                };
            }
        }
        Ok(())
    }

    /// Mark a worker's current task as timed out: a distinct terminal state
    /// from `complete_worker(worker, false)` so a status dump can tell a
    /// hung agent apart from one that ran to a clean failure.
    pub fn timeout_worker(&mut self, worker: WorkerId) -> Result<()> {
        let current_issue = self.worker_slot(worker)?.current_issue.clone();
        let slot = self.worker_slot_mut(worker)?;
        slot.status = WorkerStatus::Timeout;
        slot.current_issue = None;

        if let Some(id) = current_issue {
            self.release_locks(&id);
            if let Some(issue_state) = self.state.issues.get_mut(&id) {
                issue_state.assigned_worker = None;
                issue_state.status = IssueStatus::Failed;
            }
        }
        Ok(())
    }

    fn worker_slot(&self, worker: WorkerId) -> Result<&WorkerState> {
        self.state
            .workers
            .get(worker.index())
            .ok_or(OrchestratorError::InvalidWorker {
                index: worker.index(),
                num_workers: self.state.workers.len(),
            })
    }

    fn worker_slot_mut(&mut self, worker: WorkerId) -> Result<&mut WorkerState> {
        let num_workers = self.state.workers.len();
        self.state
            .workers
            .get_mut(worker.index())
            .ok_or(OrchestratorError::InvalidWorker {
                index: worker.index(),
                num_workers,
            })
    }

    // -- batches -----------------------------------------------------------

    /// Append a new pending batch, assigning it the next monotonic id.
    pub fn add_batch(&mut self, issue_ids: Vec<IssueId>) -> BatchId {
        let id = self.state.next_batch_id;
        self.state.next_batch_id = id.next();
        self.state.pending_batches.push(Batch::new(id, issue_ids));
        id
    }

    /// Pop the next pending batch and make it current.
    pub fn get_next_pending_batch(&mut self) -> Option<Batch> {
        if self.state.pending_batches.is_empty() {
            return None;
        }
        let mut batch = self.state.pending_batches.remove(0);
        batch.status = BatchStatus::Running;
        batch.started_at = Some(chrono::Utc::now());
        self.state.current_batch = Some(batch.clone());
        Some(batch)
    }

    /// Mark the current batch completed and clear it.
    pub fn complete_current_batch(&mut self) {
        if let Some(mut batch) = self.state.current_batch.take() {
            batch.status = BatchStatus::Completed;
            batch.completed_at = Some(chrono::Utc::now());
        }
    }

    /// Re-queue the current batch (e.g. on interrupt) back onto the front
    /// of the pending queue.
    pub fn requeue_current_batch(&mut self) {
        if let Some(mut batch) = self.state.current_batch.take() {
            batch.status = BatchStatus::Pending;
            batch.started_at = None;
            self.state.pending_batches.insert(0, batch);
        }
    }

    pub fn clear_pending_batches(&mut self) {
        self.state.pending_batches.clear();
    }

    // -- crash recovery ------------------------------------------------

    /// Release locks and reset state for any worker left `starting`/
    /// `running` from a previous crashed run, then run stale-lock cleanup.
    /// Returns the total number of items touched (workers reset + locks
    /// dropped). Idempotent.
    pub fn recover_from_crash(&mut self) -> usize {
        let mut recovered = 0;

        let stuck_issue_ids: Vec<IssueId> = self
            .state
            .workers
            .iter()
            .filter(|w| w.status.is_in_flight())
            .filter_map(|w| w.current_issue.clone())
            .collect();

        for id in &stuck_issue_ids {
            self.release_locks(id);
            if let Some(issue) = self.state.issues.get_mut(id) {
                issue.status = IssueStatus::Pending;
                issue.assigned_worker = None;
            }
            recovered += 1;
        }

        for worker in &mut self.state.workers {
            if worker.status.is_in_flight() {
                worker.reset_to_idle();
                recovered += 1;
            }
        }

        recovered += self.cleanup_stale_locks(default_stale_lock_age());
        recovered
    }
}
