//! Batch type owned by the [`crate::state::StateStore`].

use crate::ids::{BatchId, IssueId};

/// Status of a batch as it moves through dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Running,
    Completed,
}

/// A set of currently-ready issues whose primary-file sets are pairwise
/// disjoint, dispatched together to the worker pool.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub issue_ids: Vec<IssueId>,
    pub status: BatchStatus,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Batch {
    #[must_use]
    pub fn new(id: BatchId, issue_ids: Vec<IssueId>) -> Self {
        Self {
            id,
            issue_ids,
            status: BatchStatus::Pending,
            started_at: None,
            completed_at: None,
        }
    }
}
