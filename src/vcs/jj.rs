//! Shell-backed [`super::VcsBackend`] implementation over the `jj`
//! (Jujutsu) CLI.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{OrchestratorError, Result};
use crate::ids::WorkerId;

use super::VcsBackend;

/// Drives `jj` as a subprocess. `workspaces_root` is where per-worker
/// workspaces are created, named `worker-<n>`.
#[derive(Clone, Debug)]
pub struct JjBackend {
    repo_root: PathBuf,
    workspaces_root: PathBuf,
}

impl JjBackend {
    #[must_use]
    pub fn new(repo_root: PathBuf, workspaces_root: PathBuf) -> Self {
        Self {
            repo_root,
            workspaces_root,
        }
    }

    fn workspace_path(&self, worker_id: WorkerId) -> PathBuf {
        self.workspaces_root.join(format!("worker-{}", worker_id.index()))
    }

    fn run(&self, cwd: &Path, args: &[&str]) -> Result<std::process::Output> {
        Command::new("jj")
            .args(args)
            .current_dir(cwd)
            .output()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    OrchestratorError::MissingPrerequisite {
                        program: "jj".to_owned(),
                    }
                } else {
                    OrchestratorError::Io(err)
                }
            })
    }

    fn run_ok(&self, cwd: &Path, args: &[&str]) -> Result<String> {
        let output = self.run(cwd, args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OrchestratorError::Io(std::io::Error::other(format!(
                "jj {} failed: {}",
                args.join(" "),
                stderr.trim()
            ))));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl VcsBackend for JjBackend {
    fn baseline(&self, cwd: &Path) -> Result<BTreeSet<PathBuf>> {
        let stdout = self.run_ok(cwd, &["file", "list", "--no-pager"])?;
        Ok(stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(PathBuf::from)
            .collect())
    }

    fn changed_paths(&self, cwd: &Path) -> Result<BTreeSet<PathBuf>> {
        let stdout = self.run_ok(
            cwd,
            &["diff", "--summary", "--no-pager", "--color=never"],
        )?;
        Ok(stdout
            .lines()
            .filter_map(|l| l.split_whitespace().nth(1))
            .map(PathBuf::from)
            .collect())
    }

    fn restore_file(&self, cwd: &Path, path: &Path) -> Result<()> {
        let path_str = path.to_string_lossy();
        self.run_ok(cwd, &["restore", "--", path_str.as_ref()])?;
        Ok(())
    }

    fn create_workspace(&self, worker_id: WorkerId) -> Result<PathBuf> {
        let path = self.workspace_path(worker_id);
        std::fs::create_dir_all(&self.workspaces_root)?;
        if path.exists() {
            return Ok(path);
        }
        let path_str = path.to_string_lossy();
        self.run_ok(
            &self.repo_root,
            &["workspace", "add", path_str.as_ref()],
        )?;
        Ok(path)
    }

    fn remove_workspace(&self, worker_id: WorkerId) -> Result<()> {
        let path = self.workspace_path(worker_id);
        if !path.exists() {
            return Ok(());
        }
        let name = format!("worker-{}", worker_id.index());
        self.run_ok(&self.repo_root, &["workspace", "forget", &name])?;
        let _ = std::fs::remove_dir_all(&path);
        Ok(())
    }

    fn list_workspaces(&self) -> Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.workspaces_root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn binary_name(&self) -> Option<&str> {
        Some("jj")
    }
}

/// Count commits matching a revset expression.
pub fn count_revset(backend: &JjBackend, cwd: &Path, revset: &str) -> Result<usize> {
    let stdout = backend.run_ok(
        cwd,
        &[
            "log",
            "-r",
            revset,
            "--no-graph",
            "--color=never",
            "--no-pager",
            "-T",
            "commit_id.short()",
        ],
    )?;
    Ok(stdout.lines().filter(|l| !l.trim().is_empty()).count())
}

/// Check whether a revset resolves to at least one commit. Returns `false`
/// (not an error) when `jj` reports the revset doesn't exist, which happens
/// for missing bookmarks/refs.
pub fn revset_exists(backend: &JjBackend, cwd: &Path, revset: &str) -> Result<bool> {
    let output = backend.run(
        cwd,
        &[
            "log",
            "-r",
            revset,
            "--no-graph",
            "--color=never",
            "--no-pager",
            "-T",
            "change_id.short()",
        ],
    )?;
    if output.status.success() {
        return Ok(true);
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("doesn't exist") || stderr.contains("not found") {
        return Ok(false);
    }
    Err(OrchestratorError::Io(std::io::Error::other(format!(
        "jj log failed: {}",
        stderr.trim()
    ))))
}
