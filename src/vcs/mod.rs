//! The version-control boundary: [`VcsBackend`] is the narrow contract the
//! rest of the orchestrator depends on, so workspace creation and diffing
//! can be faked in tests without a real `jj` binary.

pub mod jj;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::ids::WorkerId;

pub use jj::JjBackend;

/// Everything the orchestrator needs from the underlying VCS: capturing a
/// baseline file set, diffing against it, restoring a single file, and
/// managing one working copy per worker.
pub trait VcsBackend {
    /// The full set of tracked paths at the current checkout, used by
    /// [`crate::verifier`] as a pre-attempt baseline.
    fn baseline(&self, cwd: &Path) -> Result<BTreeSet<PathBuf>>;

    /// Paths that differ from the repository's last committed state.
    fn changed_paths(&self, cwd: &Path) -> Result<BTreeSet<PathBuf>>;

    /// Discard local changes to a single file, restoring it to its
    /// checked-in content.
    fn restore_file(&self, cwd: &Path, path: &Path) -> Result<()>;

    /// Create (or reuse) an isolated working copy for `worker_id`, returning
    /// its filesystem root.
    fn create_workspace(&self, worker_id: WorkerId) -> Result<PathBuf>;

    /// Tear down the working copy belonging to `worker_id`.
    fn remove_workspace(&self, worker_id: WorkerId) -> Result<()>;

    /// List every workspace root currently known to the backend.
    fn list_workspaces(&self) -> Result<Vec<PathBuf>>;

    /// Name of the external binary this implementation shells out to, for
    /// prerequisite checking at startup. `None` for in-memory test doubles
    /// that have nothing to resolve on `PATH`.
    fn binary_name(&self) -> Option<&str> {
        None
    }
}

/// In-memory [`VcsBackend`] for tests: workspaces are just directories
/// under a temp root, and "changes" are tracked as an explicit path set
/// rather than shelling out to a real VCS.
#[derive(Debug, Default)]
pub struct FakeVcs {
    inner: std::sync::Mutex<FakeVcsInner>,
}

#[derive(Debug, Default)]
struct FakeVcsInner {
    baseline: BTreeSet<PathBuf>,
    changed: BTreeSet<PathBuf>,
    workspaces: std::collections::BTreeMap<u8, PathBuf>,
}

impl FakeVcs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the baseline path set, as if these files were already tracked.
    pub fn seed_baseline(&self, paths: impl IntoIterator<Item = PathBuf>) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.baseline.extend(paths);
    }

    /// Mark a path as changed, as if a worker had written to it.
    pub fn mark_changed(&self, path: PathBuf) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.changed.insert(path);
    }
}

impl VcsBackend for FakeVcs {
    fn baseline(&self, _cwd: &Path) -> Result<BTreeSet<PathBuf>> {
        Ok(self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .baseline
            .clone())
    }

    fn changed_paths(&self, _cwd: &Path) -> Result<BTreeSet<PathBuf>> {
        Ok(self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .changed
            .clone())
    }

    fn restore_file(&self, _cwd: &Path, path: &Path) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.changed.remove(path);
        Ok(())
    }

    fn create_workspace(&self, worker_id: WorkerId) -> Result<PathBuf> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let path = PathBuf::from(format!("/fake/workspaces/{worker_id}"));
        inner.workspaces.insert(worker_id.index() as u8, path.clone());
        Ok(path)
    }

    fn remove_workspace(&self, worker_id: WorkerId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.workspaces.remove(&(worker_id.index() as u8));
        Ok(())
    }

    fn list_workspaces(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .workspaces
            .values()
            .cloned()
            .collect())
    }
}
