//! The issue-tracker boundary: [`Tracker`] is the narrow contract the
//! planner and orchestrator loop depend on.

pub mod bd;

use crate::error::Result;
use crate::ids::IssueId;

pub use bd::BdTracker;

/// Everything the orchestrator needs from the external issue tracker.
pub trait Tracker {
    /// Issues ready to be picked up by a worker (not blocked, not already
    /// in flight).
    fn ready_issues(&self) -> Result<Vec<IssueId>>;

    /// Issues the tracker currently reports as blocked on something else.
    fn blocked_issues(&self) -> Result<Vec<IssueId>>;

    /// Every comment body on `id`, oldest first — the planner scans these
    /// for `MANIFEST:` markers.
    fn comments(&self, id: &IssueId) -> Result<Vec<String>>;

    /// Move `id` to a new tracker-defined status string.
    fn update_status(&self, id: &IssueId, status: &str) -> Result<()>;

    /// Close `id`, recording `reason` as the closing comment.
    fn close(&self, id: &IssueId, reason: &str) -> Result<()>;

    /// Name of the external binary this implementation shells out to, for
    /// prerequisite checking at startup. `None` for in-memory test doubles
    /// that have nothing to resolve on `PATH`.
    fn binary_name(&self) -> Option<&str> {
        None
    }
}

/// In-memory [`Tracker`] for tests.
#[derive(Debug, Default)]
pub struct FakeTracker {
    inner: std::sync::Mutex<FakeTrackerInner>,
}

#[derive(Debug, Default)]
struct FakeTrackerInner {
    ready: Vec<IssueId>,
    blocked: Vec<IssueId>,
    comments: std::collections::BTreeMap<IssueId, Vec<String>>,
    statuses: std::collections::BTreeMap<IssueId, String>,
    closed: std::collections::BTreeMap<IssueId, String>,
}

impl FakeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_ready(&self, ids: impl IntoIterator<Item = IssueId>) {
        let mut inner = self.lock();
        inner.ready.extend(ids);
    }

    pub fn seed_blocked(&self, ids: impl IntoIterator<Item = IssueId>) {
        let mut inner = self.lock();
        inner.blocked.extend(ids);
    }

    pub fn seed_comment(&self, id: IssueId, comment: impl Into<String>) {
        let mut inner = self.lock();
        inner.comments.entry(id).or_default().push(comment.into());
    }

    #[must_use]
    pub fn status_of(&self, id: &IssueId) -> Option<String> {
        self.lock().statuses.get(id).cloned()
    }

    #[must_use]
    pub fn close_reason(&self, id: &IssueId) -> Option<String> {
        self.lock().closed.get(id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeTrackerInner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Tracker for FakeTracker {
    fn ready_issues(&self) -> Result<Vec<IssueId>> {
        Ok(self.lock().ready.clone())
    }

    fn blocked_issues(&self) -> Result<Vec<IssueId>> {
        Ok(self.lock().blocked.clone())
    }

    fn comments(&self, id: &IssueId) -> Result<Vec<String>> {
        Ok(self.lock().comments.get(id).cloned().unwrap_or_default())
    }

    fn update_status(&self, id: &IssueId, status: &str) -> Result<()> {
        self.lock().statuses.insert(id.clone(), status.to_owned());
        Ok(())
    }

    fn close(&self, id: &IssueId, reason: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.closed.insert(id.clone(), reason.to_owned());
        inner.ready.retain(|r| r != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_ready_issues_round_trip() {
        let tracker = FakeTracker::new();
        tracker.seed_ready([IssueId::new("T-1"), IssueId::new("T-2")]);
        assert_eq!(tracker.ready_issues().unwrap().len(), 2);
    }

    #[test]
    fn close_removes_from_ready_and_records_reason() {
        let tracker = FakeTracker::new();
        let id = IssueId::new("T-1");
        tracker.seed_ready([id.clone()]);
        tracker.close(&id, "superseded by T-2").unwrap();
        assert!(tracker.ready_issues().unwrap().is_empty());
        assert_eq!(tracker.close_reason(&id).as_deref(), Some("superseded by T-2"));
    }

    #[test]
    fn update_status_is_observable() {
        let tracker = FakeTracker::new();
        let id = IssueId::new("T-1");
        tracker.update_status(&id, "in_review").unwrap();
        assert_eq!(tracker.status_of(&id).as_deref(), Some("in_review"));
    }

    #[test]
    fn comments_preserve_insertion_order() {
        let tracker = FakeTracker::new();
        let id = IssueId::new("T-1");
        tracker.seed_comment(id.clone(), "first");
        tracker.seed_comment(id.clone(), "second");
        assert_eq!(tracker.comments(&id).unwrap(), vec!["first", "second"]);
    }
}
