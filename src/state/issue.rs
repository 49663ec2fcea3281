//! Per-issue state owned by the [`crate::state::StateStore`].

use crate::ids::WorkerId;
use crate::manifest::Manifest;

/// Status of a single issue as tracked by the orchestrator (distinct from
/// whatever status vocabulary the external tracker itself uses).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Pending,
    Assigned,
    Running,
    Completed,
    Failed,
}

/// The outcome of a single implementation attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptResult {
    Success,
    Failed,
    Timeout,
    Violation,
}

/// One pass of an implementation agent against one issue.
///
/// Invariant: `attempt_number == issue.attempt_count` at the moment of
/// insertion (enforced by [`crate::state::StateStore::record_attempt`]).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AttemptRecord {
    pub attempt_number: u32,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub result: AttemptResult,
    pub files_touched: Vec<String>,
    pub notes: String,
}

/// Everything the orchestrator tracks about one issue.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IssueState {
    pub status: IssueStatus,
    pub attempt_count: u32,
    pub manifest: Option<Manifest>,
    pub assigned_worker: Option<WorkerId>,
    pub last_attempt: Option<AttemptRecord>,
}

impl IssueState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: IssueStatus::Pending,
            attempt_count: 0,
            manifest: None,
            assigned_worker: None,
            last_attempt: None,
        }
    }
}

impl Default for IssueState {
    fn default() -> Self {
        Self::new()
    }
}
