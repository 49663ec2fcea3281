//! Greedy, deterministic packing of ready issues into conflict-free
//! batches, and the manifest-comment loading step that feeds it.

use crate::error::Result;
use crate::ids::IssueId;
use crate::manifest::parse_manifest_comment;
use crate::state::store::StateStore;
use crate::tracker::Tracker;

/// Scan every currently-ready issue's comments for a `MANIFEST:` marker and
/// persist the first one found via `set_manifest`. An issue with no marker,
/// or whose marker parses to an empty `primary_files`, is left without a
/// manifest (and therefore excluded from batching).
///
/// Returns the ids that now have a manifest set.
pub fn load_manifests_from_comments(
    store: &mut StateStore,
    tracker: &impl Tracker,
) -> Result<Vec<IssueId>> {
    let ready = tracker.ready_issues()?;
    let mut loaded = Vec::new();

    for id in ready {
        store.ensure_issue(&id);
        let comments = tracker.comments(&id)?;
        let manifest = comments
            .iter()
            .find_map(|comment| parse_manifest_comment(comment).ok().flatten())
            .filter(crate::manifest::Manifest::has_primary_files);

        if let Some(manifest) = manifest {
            store.set_manifest(&id, manifest)?;
            loaded.push(id);
        }
    }

    Ok(loaded)
}

/// Greedily pack `ready` (already ordered by tracker priority, already
/// filtered to issues with a manifest) into conflict-free batches, clear
/// the store's pending-batch queue, and append the new batches. Returns
/// the number of batches created.
///
/// Deterministic: identical `ready` order and identical manifests always
/// produce byte-identical batches.
pub fn plan_batches(store: &mut StateStore, ready: &[IssueId]) -> usize {
    store.clear_pending_batches();

    let mut unassigned: Vec<&IssueId> = ready.iter().collect();
    let mut batch_count = 0;

    while !unassigned.is_empty() {
        let mut batch: Vec<IssueId> = Vec::new();
        let mut remaining = Vec::new();

        for id in unassigned {
            let conflicts = batch.iter().any(|member| store.issues_conflict(member, id));
            if conflicts {
                remaining.push(id);
            } else {
                batch.push(id.clone());
            }
        }

        if batch.is_empty() {
            break;
        }
        store.add_batch(batch);
        batch_count += 1;
        unassigned = remaining;
    }

    batch_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use crate::tracker::FakeTracker;

    fn manifest_comment(primary: &str) -> String {
        format!("MANIFEST: primary=[{primary}]")
    }

    fn fresh_store() -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::load(dir.path(), "demo", 2).unwrap();
        (dir, store)
    }

    #[test]
    fn loads_first_manifest_marker_and_skips_issues_without_one() {
        let (_dir, mut store) = fresh_store();
        let tracker = FakeTracker::new();
        let a = IssueId::new("A");
        let b = IssueId::new("B");
        tracker.seed_ready([a.clone(), b.clone()]);
        tracker.seed_comment(a.clone(), manifest_comment("src/a.rs"));
        tracker.seed_comment(b.clone(), "just chatting, no manifest here");

        let loaded = load_manifests_from_comments(&mut store, &tracker).unwrap();
        assert_eq!(loaded, vec![a.clone()]);
        assert_eq!(
            store.get_manifest(&a),
            Some(&Manifest {
                primary_files: vec!["src/a.rs".to_owned()],
                read_files: vec![],
                forbidden_files: vec![],
            })
        );
        assert!(store.get_manifest(&b).is_none());
    }

    #[test]
    fn disjoint_issues_pack_into_one_batch() {
        let (_dir, mut store) = fresh_store();
        let a = IssueId::new("A");
        let b = IssueId::new("B");
        store.ensure_issue(&a);
        store.ensure_issue(&b);
        store
            .set_manifest(
                &a,
                Manifest {
                    primary_files: vec!["src/a.rs".to_owned()],
                    ..Manifest::default()
                },
            )
            .unwrap();
        store
            .set_manifest(
                &b,
                Manifest {
                    primary_files: vec!["src/b.rs".to_owned()],
                    ..Manifest::default()
                },
            )
            .unwrap();

        let count = plan_batches(&mut store, &[a, b]);
        assert_eq!(count, 1);
        assert_eq!(store.state().pending_batches[0].issue_ids.len(), 2);
    }

    #[test]
    fn conflicting_issues_split_across_batches() {
        let (_dir, mut store) = fresh_store();
        let a = IssueId::new("A");
        let b = IssueId::new("B");
        store.ensure_issue(&a);
        store.ensure_issue(&b);
        let shared = Manifest {
            primary_files: vec!["src/shared.rs".to_owned()],
            ..Manifest::default()
        };
        store.set_manifest(&a, shared.clone()).unwrap();
        store.set_manifest(&b, shared).unwrap();

        let count = plan_batches(&mut store, &[a, b]);
        assert_eq!(count, 2);
        assert_eq!(store.state().pending_batches[0].issue_ids.len(), 1);
        assert_eq!(store.state().pending_batches[1].issue_ids.len(), 1);
    }

    #[test]
    fn planning_clears_previous_pending_batches() {
        let (_dir, mut store) = fresh_store();
        let stale = IssueId::new("STALE");
        store.add_batch(vec![stale]);
        assert_eq!(store.state().pending_batches.len(), 1);

        let count = plan_batches(&mut store, &[]);
        assert_eq!(count, 0);
        assert!(store.state().pending_batches.is_empty());
    }

    #[test]
    fn empty_ready_list_produces_no_batches() {
        let (_dir, mut store) = fresh_store();
        assert_eq!(plan_batches(&mut store, &[]), 0);
    }
}
