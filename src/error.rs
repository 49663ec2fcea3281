//! Unified error type for the orchestrator core.
//!
//! Follows the same shape as a hand-rolled domain error type: each variant
//! carries enough detail for a caller (often an agent reading the failure
//! from a log line) to understand what happened and what to do next, rather
//! than leaking raw subprocess or I/O errors verbatim.

use std::fmt;
use std::path::PathBuf;

use crate::ids::IssueId;

/// Unified error type for orchestrator state, manifest, and config
/// operations.
#[derive(Debug)]
pub enum OrchestratorError {
    /// A lock on this path is already held by a different issue.
    LockConflict {
        path: PathBuf,
        holder: IssueId,
        requester: IssueId,
    },

    /// An operation referenced an issue id the store doesn't know about.
    UnknownIssue { id: IssueId },

    /// An operation referenced a worker slot outside the configured range.
    InvalidWorker { index: usize, num_workers: usize },

    /// The persisted state file exists but could not be parsed.
    StateCorrupted { path: PathBuf, detail: String },

    /// A manifest comment did not match the `MANIFEST:` marker grammar.
    ManifestParse { detail: String },

    /// The configuration file could not be parsed.
    ConfigError { path: PathBuf, detail: String },

    /// A required external CLI was not found on PATH.
    MissingPrerequisite { program: String },

    /// The project's configured build command exited non-zero during
    /// prerequisite checking.
    BuildFailed { command: String },

    /// An I/O error occurred during a state or workspace operation.
    Io(std::io::Error),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LockConflict {
                path,
                holder,
                requester,
            } => write!(
                f,
                "cannot acquire lock on '{}' for issue {requester}: already held by issue {holder}.\n  To fix: wait for {holder} to release the lock, or regenerate batches once it completes.",
                path.display()
            ),
            Self::UnknownIssue { id } => write!(
                f,
                "issue '{id}' is not present in orchestrator state.\n  To fix: confirm the tracker still reports this issue, or reload state."
            ),
            Self::InvalidWorker { index, num_workers } => write!(
                f,
                "worker index {index} is out of range for {num_workers} configured worker(s)."
            ),
            Self::StateCorrupted { path, detail } => write!(
                f,
                "state file '{}' is corrupted: {detail}\n  To fix: restore from the '.bak' sibling file, or delete the state directory to start fresh.",
                path.display()
            ),
            Self::ManifestParse { detail } => write!(
                f,
                "could not parse MANIFEST comment: {detail}\n  Expected a line of the form 'primary=[a,b] read=[c] forbidden=[d]'."
            ),
            Self::ConfigError { path, detail } => write!(
                f,
                "configuration error in '{}': {detail}\n  To fix: edit the config file and correct the issue.",
                path.display()
            ),
            Self::MissingPrerequisite { program } => write!(
                f,
                "required program '{program}' was not found on PATH.\n  To fix: install it, or adjust the configured command name."
            ),
            Self::BuildFailed { command } => write!(
                f,
                "project build command '{command}' failed.\n  To fix: run it directly to see the full error, then fix the build before retrying."
            ),
            Self::Io(err) => write!(
                f,
                "I/O error: {err}\n  To fix: check file permissions and disk space."
            ),
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OrchestratorError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

/// Convenience alias used throughout the core modules.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lock_conflict_names_both_issues() {
        let err = OrchestratorError::LockConflict {
            path: PathBuf::from("src/a.rs"),
            holder: IssueId::new("T-1"),
            requester: IssueId::new("T-2"),
        };
        let msg = format!("{err}");
        assert!(msg.contains("src/a.rs"));
        assert!(msg.contains("T-1"));
        assert!(msg.contains("T-2"));
    }

    #[test]
    fn display_state_corrupted_mentions_backup() {
        let err = OrchestratorError::StateCorrupted {
            path: PathBuf::from(".noface/state.json"),
            detail: "unexpected EOF".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains(".noface/state.json"));
        assert!(msg.contains(".bak"));
    }

    #[test]
    fn display_missing_prerequisite() {
        let err = OrchestratorError::MissingPrerequisite {
            program: "jj".to_owned(),
        };
        assert!(format!("{err}").contains("jj"));
    }

    #[test]
    fn source_is_some_only_for_io() {
        let io_err = OrchestratorError::Io(std::io::Error::other("disk full"));
        assert!(std::error::Error::source(&io_err).is_some());

        let other_err = OrchestratorError::UnknownIssue {
            id: IssueId::new("T-9"),
        };
        assert!(std::error::Error::source(&other_err).is_none());
    }

    #[test]
    fn display_build_failed_names_the_command() {
        let err = OrchestratorError::BuildFailed {
            command: "cargo build".to_owned(),
        };
        assert!(format!("{err}").contains("cargo build"));
    }

    #[test]
    fn from_io_error() {
        let err: OrchestratorError = std::io::Error::other("oops").into();
        assert!(matches!(err, OrchestratorError::Io(_)));
    }
}
