//! File-lock table owned by the [`crate::state::StateStore`].
//!
//! The lock table is keyed by base path; a path appears at most once. Locks
//! are acquired two-phase (check-all, then acquire-all) so a manifest that
//! conflicts with an existing lock leaves no partial locks behind.

use std::collections::BTreeMap;

use crate::ids::{IssueId, WorkerId};
use crate::manifest::Manifest;

/// A single held lock on a base path.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LockEntry {
    pub file: String,
    pub issue_id: IssueId,
    pub worker_id: WorkerId,
    pub acquired_at: chrono::DateTime<chrono::Utc>,
}

/// The lock table: at most one [`LockEntry`] per base path.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LockTable {
    entries: BTreeMap<String, LockEntry>,
}

impl LockTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&LockEntry> {
        self.entries.get(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LockEntry> {
        self.entries.values()
    }

    /// Two-phase acquire: check every primary-file base path in `manifest`
    /// for a conflicting lock (held by a different issue) before acquiring
    /// any of them. Re-acquiring a path already locked by the *same* issue
    /// is allowed (idempotent).
    ///
    /// Returns `true` and commits all locks on success; returns `false` and
    /// leaves the table untouched on the first conflict found.
    pub fn try_acquire(
        &mut self,
        issue_id: &IssueId,
        worker_id: WorkerId,
        manifest: &Manifest,
        now: chrono::DateTime<chrono::Utc>,
    ) -> bool {
        let base_paths: Vec<&str> = manifest.primary_base_paths().into_iter().collect();

        // Phase 1: check.
        for path in &base_paths {
            if let Some(existing) = self.entries.get(*path) {
                if &existing.issue_id != issue_id {
                    return false;
                }
            }
        }

        // Phase 2: acquire (overwrite is fine — same issue re-acquiring,
        // or a fresh acquire onto an empty slot).
        for path in base_paths {
            self.entries.insert(
                path.to_owned(),
                LockEntry {
                    file: path.to_owned(),
                    issue_id: issue_id.clone(),
                    worker_id,
                    acquired_at: now,
                },
            );
        }
        true
    }

    /// Release every lock held by `issue_id`.
    pub fn release(&mut self, issue_id: &IssueId) {
        self.entries.retain(|_, lock| &lock.issue_id != issue_id);
    }

    /// Drop every lock older than `max_age`, relative to `now`. Returns the
    /// number of locks removed.
    pub fn cleanup_stale(
        &mut self,
        max_age: chrono::Duration,
        now: chrono::DateTime<chrono::Utc>,
    ) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, lock| now.signed_duration_since(lock.acquired_at) < max_age);
        before - self.entries.len()
    }

    /// `true` iff `a`'s and `b`'s primary-file base-path sets intersect.
    /// Manifests with no primary files never conflict.
    #[must_use]
    pub fn manifests_conflict(a: &Manifest, b: &Manifest) -> bool {
        let a_paths = a.primary_base_paths();
        let b_paths = b.primary_base_paths();
        a_paths.intersection(&b_paths).next().is_some()
    }
}
