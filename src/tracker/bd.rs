//! Shell-backed [`super::Tracker`] implementation over the `bd` (beads)
//! issue-tracker CLI.

use std::path::PathBuf;
use std::process::Command;

use crate::error::{OrchestratorError, Result};
use crate::ids::IssueId;

use super::Tracker;

/// Drives `bd` as a subprocess against a single project directory.
#[derive(Clone, Debug)]
pub struct BdTracker {
    project_root: PathBuf,
}

impl BdTracker {
    #[must_use]
    pub fn new(project_root: PathBuf) -> Self {
        Self { project_root }
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("bd")
            .args(args)
            .current_dir(&self.project_root)
            .output()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    OrchestratorError::MissingPrerequisite {
                        program: "bd".to_owned(),
                    }
                } else {
                    OrchestratorError::Io(err)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OrchestratorError::Io(std::io::Error::other(format!(
                "bd {} failed: {}",
                args.join(" "),
                stderr.trim()
            ))));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Tracker for BdTracker {
    fn ready_issues(&self) -> Result<Vec<IssueId>> {
        let stdout = self.run(&["list", "--status", "ready", "--format", "ids"])?;
        Ok(stdout.lines().filter(|l| !l.trim().is_empty()).map(IssueId::new).collect())
    }

    fn blocked_issues(&self) -> Result<Vec<IssueId>> {
        let stdout = self.run(&["list", "--status", "blocked", "--format", "ids"])?;
        Ok(stdout.lines().filter(|l| !l.trim().is_empty()).map(IssueId::new).collect())
    }

    fn comments(&self, id: &IssueId) -> Result<Vec<String>> {
        let id_str = id.as_str();
        let stdout = self.run(&["comments", id_str, "--format", "raw"])?;
        Ok(stdout.split("\n---\n").map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect())
    }

    fn update_status(&self, id: &IssueId, status: &str) -> Result<()> {
        let id_str = id.as_str();
        self.run(&["update", id_str, "--status", status])?;
        Ok(())
    }

    fn close(&self, id: &IssueId, reason: &str) -> Result<()> {
        let id_str = id.as_str();
        self.run(&["close", id_str, "--reason", reason])?;
        Ok(())
    }

    fn binary_name(&self) -> Option<&str> {
        Some("bd")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_with_project_root() {
        let tracker = BdTracker::new(PathBuf::from("/tmp/project"));
        assert_eq!(tracker.project_root, PathBuf::from("/tmp/project"));
    }
}
