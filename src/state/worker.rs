//! Per-worker-slot state owned by the [`crate::state::StateStore`].

use crate::ids::IssueId;

/// Status of one worker slot.
///
/// Invariant: a slot with status `Starting` or `Running` always has
/// `current_issue` set; every other status has it cleared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Starting,
    Running,
    Completed,
    Failed,
    Timeout,
}

impl WorkerStatus {
    /// A worker is available for dispatch when idle, or has reached any
    /// terminal state from a previous task (completed, failed, timed out).
    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Idle | Self::Completed | Self::Failed | Self::Timeout)
    }

    /// A worker is "in flight" when starting or running — the states that
    /// require `current_issue` to be set.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}

/// Snapshot of one worker slot.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WorkerState {
    pub status: WorkerStatus,
    pub current_issue: Option<IssueId>,
    pub process_pid: Option<u32>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl WorkerState {
    #[must_use]
    pub fn idle() -> Self {
        Self {
            status: WorkerStatus::Idle,
            current_issue: None,
            process_pid: None,
            started_at: None,
        }
    }

    /// Reset this slot back to idle, clearing every in-flight field.
    pub fn reset_to_idle(&mut self) {
        *self = Self::idle();
    }

    /// `true` iff this slot satisfies the current_issue invariant.
    #[must_use]
    pub fn invariant_holds(&self) -> bool {
        self.status.is_in_flight() == self.current_issue.is_some()
    }
}

impl Default for WorkerState {
    fn default() -> Self {
        Self::idle()
    }
}
