//! Process-wide signal state: the one piece of global mutable state the
//! orchestrator carries. SIGINT/SIGTERM set a single interrupt flag;
//! everything else (StateStore, WorkerPool, OrchestratorLoop) is threaded
//! through explicitly by reference.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

use crate::ids::IssueId;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static CURRENT_ISSUE: OnceLock<Mutex<Option<IssueId>>> = OnceLock::new();
static HANDLER_INSTALLED: AtomicBool = AtomicBool::new(false);

fn current_issue_slot() -> &'static Mutex<Option<IssueId>> {
    CURRENT_ISSUE.get_or_init(|| Mutex::new(None))
}

/// Install the SIGINT/SIGTERM handler. Idempotent: calling this more than
/// once (e.g. across tests in the same process) is a no-op after the
/// first call.
pub fn install() -> crate::error::Result<()> {
    if HANDLER_INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }
    ctrlc::set_handler(|| {
        INTERRUPTED.store(true, Ordering::SeqCst);
    })
    .map_err(|err| crate::error::OrchestratorError::Io(std::io::Error::other(err.to_string())))
}

/// `true` once a SIGINT/SIGTERM has been observed.
#[must_use]
pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Test-only escape hatch: reset the flag between test cases.
#[cfg(test)]
pub fn reset_for_test() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

/// Record which issue the control thread is currently driving, so a
/// diagnostic dump (or a future crash) can report progress.
pub fn set_current_issue(id: Option<IssueId>) {
    let mut slot = current_issue_slot()
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    *slot = id;
}

#[must_use]
pub fn current_issue() -> Option<IssueId> {
    current_issue_slot()
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone()
}
