//! Shared test helpers for integration tests: a fresh temp-dir-backed
//! [`StateStore`] and the fake collaborators every scenario wires together.

use noface::ids::BatchId;
use noface::state::store::StateStore;

/// Create a fresh `StateStore` in its own temp directory. The `TempDir`
/// must be kept alive for the duration of the test (it deletes on drop).
pub fn fresh_store(project: &str, workers: usize) -> (tempfile::TempDir, StateStore) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let store = StateStore::load(dir.path(), project, workers).expect("failed to load fresh state");
    (dir, store)
}

#[allow(dead_code)]
pub fn first_batch_id() -> BatchId {
    BatchId::first()
}
