//! Manifest type and the `MANIFEST:` comment-marker parser.
//!
//! A manifest is a planner-authored declaration of which files an
//! implementation attempt may write (`primary_files`), should read
//! (`read_files`, advisory only), and must never touch
//! (`forbidden_files`, which always wins over `primary_files`).

use std::collections::BTreeSet;

use crate::error::{OrchestratorError, Result};

/// Three disjoint-in-intent sets of path patterns declared by the planner
/// for a single issue.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Manifest {
    pub primary_files: Vec<String>,
    pub read_files: Vec<String>,
    pub forbidden_files: Vec<String>,
}

impl Manifest {
    /// Base path for a manifest entry: the prefix before an optional
    /// `:line-start-line-end` suffix. Locking and verification operate on
    /// base paths only.
    #[must_use]
    pub fn base_path(entry: &str) -> &str {
        entry.split(':').next().unwrap_or(entry)
    }

    /// Base paths of every `primary_files` entry, deduplicated.
    #[must_use]
    pub fn primary_base_paths(&self) -> BTreeSet<&str> {
        self.primary_files.iter().map(|s| Self::base_path(s)).collect()
    }

    /// `true` if `path` is forbidden. `isForbidden` overrides `allowsWrite`.
    #[must_use]
    pub fn is_forbidden(&self, path: &str) -> bool {
        self.forbidden_files
            .iter()
            .any(|f| Self::base_path(f) == path)
    }

    /// `true` if the manifest authorizes writing `path`. Forbidden always
    /// wins, even if `path` also appears in `primary_files`.
    #[must_use]
    pub fn allows_write(&self, path: &str) -> bool {
        if self.is_forbidden(path) {
            return false;
        }
        self.primary_files
            .iter()
            .any(|f| Self::base_path(f) == path)
    }

    /// A manifest is only meaningful to the batch planner once it names at
    /// least one primary file.
    #[must_use]
    pub fn has_primary_files(&self) -> bool {
        !self.primary_files.is_empty()
    }
}

/// Parse the first `MANIFEST:` marker found in `comment` text.
///
/// Expected grammar, on the line following the `MANIFEST:` marker (or on
/// the same line):
/// `primary=[p1,p2,...] read=[...] forbidden=[...]`
///
/// Returns `None` if no marker is present. Returns an error if the marker
/// is present but the bracketed-list grammar doesn't parse.
pub fn parse_manifest_comment(comment: &str) -> Result<Option<Manifest>> {
    let Some(marker_pos) = comment.find("MANIFEST:") else {
        return Ok(None);
    };
    let rest = &comment[marker_pos + "MANIFEST:".len()..];
    // The declaration may continue on the same line or wrap to the next;
    // either way, only the first logical line containing `primary=` is used.
    let line = rest
        .lines()
        .find(|l| l.contains("primary="))
        .unwrap_or_else(|| rest.lines().next().unwrap_or(""));

    let primary = extract_bracket_list(line, "primary=")?;
    let read = extract_bracket_list(line, "read=")?.unwrap_or_default();
    let forbidden = extract_bracket_list(line, "forbidden=")?.unwrap_or_default();

    let Some(primary) = primary else {
        return Err(OrchestratorError::ManifestParse {
            detail: "missing required 'primary=[...]' field".to_owned(),
        });
    };

    Ok(Some(Manifest {
        primary_files: primary,
        read_files: read,
        forbidden_files: forbidden,
    }))
}

/// Extract and split a `key=[a, b, c]` bracketed, comma-separated list.
/// Returns `Ok(None)` if `key` isn't present in `line` at all.
fn extract_bracket_list(line: &str, key: &str) -> Result<Option<Vec<String>>> {
    let Some(start) = line.find(key) else {
        return Ok(None);
    };
    let after_key = &line[start + key.len()..];
    let Some(open) = after_key.find('[') else {
        return Err(OrchestratorError::ManifestParse {
            detail: format!("'{key}' is missing its opening '['"),
        });
    };
    let Some(close) = after_key[open..].find(']') else {
        return Err(OrchestratorError::ManifestParse {
            detail: format!("'{key}' is missing its closing ']'"),
        });
    };
    let inner = &after_key[open + 1..open + close];
    let items = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();
    Ok(Some(items))
}
