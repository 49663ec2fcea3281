//! Exercises a batch with more than one issue dispatched to more than one
//! worker slot at once — every `WorkerPool` unit test in `src/worker_pool.rs`
//! only ever runs a single-issue batch, so this is the one scenario that
//! actually proves two slots run concurrently rather than merely sequentially
//! sharing slot 0.

mod common;

use std::time::Duration;

use noface::agent::process::{FakeAgentProcess, FakeResponse};
use noface::ids::{BatchId, IssueId};
use noface::manifest::Manifest;
use noface::state::batch::Batch;
use noface::state::IssueStatus;
use noface::vcs::FakeVcs;
use noface::worker_pool::{AgentPrograms, WorkerPool};

#[test]
fn two_disjoint_issues_complete_concurrently_in_one_batch() {
    let vcs = FakeVcs::new();
    let agents = FakeAgentProcess::new();
    // Each issue needs its own implement -> review -> merge trio.
    for _ in 0..2 {
        agents.push_response(FakeResponse {
            lines: vec!["READY_FOR_REVIEW".to_owned()],
            exit_code: 0,
        });
        agents.push_response(FakeResponse {
            lines: vec!["APPROVED".to_owned()],
            exit_code: 0,
        });
        agents.push_response(FakeResponse {
            lines: vec!["MERGE_COMPLETE".to_owned()],
            exit_code: 0,
        });
    }

    let (_dir, mut store) = common::fresh_store("demo", 2);
    let issue_a = IssueId::new("T-1");
    let issue_b = IssueId::new("T-2");
    store.ensure_issue(&issue_a);
    store.ensure_issue(&issue_b);
    store
        .set_manifest(
            &issue_a,
            Manifest {
                primary_files: vec!["a.rs".to_owned()],
                ..Manifest::default()
            },
        )
        .unwrap();
    store
        .set_manifest(
            &issue_b,
            Manifest {
                primary_files: vec!["b.rs".to_owned()],
                ..Manifest::default()
            },
        )
        .unwrap();
    assert!(!store.issues_conflict(&issue_a, &issue_b));

    let batch = Batch::new(BatchId::first(), vec![issue_a.clone(), issue_b.clone()]);

    let mut pool = WorkerPool::new(
        &vcs,
        &agents,
        AgentPrograms {
            implementer: "claude".to_owned(),
            reviewer: "claude".to_owned(),
        },
        2,
        Duration::from_secs(900),
    );

    let successes = pool.execute_batch(&batch, &mut store).unwrap();
    assert_eq!(successes, 2);
    assert_eq!(store.get_issue(&issue_a).unwrap().status, IssueStatus::Completed);
    assert_eq!(store.get_issue(&issue_b).unwrap().status, IssueStatus::Completed);
}
