//! Manifest compliance checking: did an agent only touch the files its
//! manifest authorized it to?

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::manifest::Manifest;
use crate::vcs::VcsBackend;

/// Outcome of comparing an agent's actual file touches against its
/// manifest, plus instrumentation for tuning manifest prediction quality.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComplianceResult {
    pub compliant: bool,
    pub files_actually_touched: BTreeSet<PathBuf>,
    pub forbidden_files_touched: BTreeSet<PathBuf>,
    pub unauthorized_files: BTreeSet<PathBuf>,
    pub manifest_files_predicted: BTreeSet<PathBuf>,
}

impl ComplianceResult {
    /// Every path that must be restored to its parent-revision state:
    /// forbidden touches and unauthorized touches, unioned.
    #[must_use]
    pub fn files_to_roll_back(&self) -> BTreeSet<PathBuf> {
        self.unauthorized_files
            .union(&self.forbidden_files_touched)
            .cloned()
            .collect()
    }

    /// `predicted ∩ touched / predicted ∪ touched`. `None` when both sets
    /// are empty (undefined, not zero).
    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        let union_len = self
            .manifest_files_predicted
            .union(&self.files_actually_touched)
            .count();
        if union_len == 0 {
            return None;
        }
        let intersection_len = self
            .manifest_files_predicted
            .intersection(&self.files_actually_touched)
            .count();
        Some(intersection_len as f64 / union_len as f64)
    }

    /// Files the manifest predicted but the agent never touched.
    #[must_use]
    pub fn false_positives(&self) -> BTreeSet<PathBuf> {
        self.manifest_files_predicted
            .difference(&self.files_actually_touched)
            .cloned()
            .collect()
    }

    /// Files the agent touched that the manifest never predicted.
    #[must_use]
    pub fn false_negatives(&self) -> BTreeSet<PathBuf> {
        self.files_actually_touched
            .difference(&self.manifest_files_predicted)
            .cloned()
            .collect()
    }
}

/// Checks an implementation attempt's file touches against its manifest,
/// using a [`VcsBackend`] to enumerate what actually changed.
pub struct ManifestVerifier<'a, V: VcsBackend> {
    vcs: &'a V,
}

impl<'a, V: VcsBackend> ManifestVerifier<'a, V> {
    #[must_use]
    pub fn new(vcs: &'a V) -> Self {
        Self { vcs }
    }

    /// The union of modified/added/deleted paths already dirty before the
    /// agent ran.
    pub fn capture_baseline(&self, cwd: &Path) -> Result<BTreeSet<PathBuf>> {
        self.vcs.changed_paths(cwd)
    }

    /// Diff the post-attempt changed-path set against `baseline` and
    /// classify every newly-touched path. An issue with no manifest is
    /// unconditionally compliant (legacy behavior: old issues predate
    /// manifest enforcement).
    pub fn verify(
        &self,
        cwd: &Path,
        manifest: Option<&Manifest>,
        baseline: &BTreeSet<PathBuf>,
    ) -> Result<ComplianceResult> {
        let after = self.vcs.changed_paths(cwd)?;
        let newly_touched: BTreeSet<PathBuf> = after.difference(baseline).cloned().collect();

        let Some(manifest) = manifest else {
            return Ok(ComplianceResult {
                compliant: true,
                files_actually_touched: newly_touched,
                forbidden_files_touched: BTreeSet::new(),
                unauthorized_files: BTreeSet::new(),
                manifest_files_predicted: BTreeSet::new(),
            });
        };

        let mut forbidden_files_touched = BTreeSet::new();
        let mut unauthorized_files = BTreeSet::new();

        for path in &newly_touched {
            let path_str = path.to_string_lossy();
            if manifest.is_forbidden(&path_str) {
                forbidden_files_touched.insert(path.clone());
            } else if !manifest.allows_write(&path_str) {
                unauthorized_files.insert(path.clone());
            }
        }

        let manifest_files_predicted = manifest.primary_files.iter().map(PathBuf::from).collect();

        Ok(ComplianceResult {
            compliant: forbidden_files_touched.is_empty() && unauthorized_files.is_empty(),
            files_actually_touched: newly_touched,
            forbidden_files_touched,
            unauthorized_files,
            manifest_files_predicted,
        })
    }

    /// Restore every path in [`ComplianceResult::files_to_roll_back`] to its
    /// parent-revision state. Pre-existing baseline changes are untouched.
    pub fn rollback_files(&self, cwd: &Path, result: &ComplianceResult) -> Result<()> {
        for path in result.files_to_roll_back() {
            self.vcs.restore_file(cwd, &path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::FakeVcs;

    fn manifest(primary: &[&str], forbidden: &[&str]) -> Manifest {
        Manifest {
            primary_files: primary.iter().map(|s| (*s).to_owned()).collect(),
            read_files: vec![],
            forbidden_files: forbidden.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    #[test]
    fn no_manifest_is_always_compliant() {
        let vcs = FakeVcs::new();
        vcs.mark_changed(PathBuf::from("src/anything.rs"));
        let verifier = ManifestVerifier::new(&vcs);
        let baseline = BTreeSet::new();
        let result = verifier.verify(Path::new("."), None, &baseline).unwrap();
        assert!(result.compliant);
    }

    #[test]
    fn touching_only_primary_files_is_compliant() {
        let vcs = FakeVcs::new();
        vcs.mark_changed(PathBuf::from("src/a.rs"));
        let verifier = ManifestVerifier::new(&vcs);
        let manifest = manifest(&["src/a.rs"], &[]);
        let baseline = BTreeSet::new();
        let result = verifier.verify(Path::new("."), Some(&manifest), &baseline).unwrap();
        assert!(result.compliant);
        assert!(result.unauthorized_files.is_empty());
    }

    #[test]
    fn touching_unlisted_file_is_unauthorized_not_forbidden() {
        let vcs = FakeVcs::new();
        vcs.mark_changed(PathBuf::from("src/sneaky.rs"));
        let verifier = ManifestVerifier::new(&vcs);
        let manifest = manifest(&["src/a.rs"], &[]);
        let baseline = BTreeSet::new();
        let result = verifier.verify(Path::new("."), Some(&manifest), &baseline).unwrap();
        assert!(!result.compliant);
        assert!(result.unauthorized_files.contains(&PathBuf::from("src/sneaky.rs")));
        assert!(result.forbidden_files_touched.is_empty());
    }

    #[test]
    fn touching_forbidden_file_is_classified_separately() {
        let vcs = FakeVcs::new();
        vcs.mark_changed(PathBuf::from("src/secrets.rs"));
        let verifier = ManifestVerifier::new(&vcs);
        let manifest = manifest(&["src/a.rs"], &["src/secrets.rs"]);
        let baseline = BTreeSet::new();
        let result = verifier.verify(Path::new("."), Some(&manifest), &baseline).unwrap();
        assert!(!result.compliant);
        assert!(result.forbidden_files_touched.contains(&PathBuf::from("src/secrets.rs")));
    }

    #[test]
    fn baseline_paths_are_excluded_from_touched() {
        let vcs = FakeVcs::new();
        vcs.mark_changed(PathBuf::from("src/pre_existing.rs"));
        let verifier = ManifestVerifier::new(&vcs);
        let mut baseline = BTreeSet::new();
        baseline.insert(PathBuf::from("src/pre_existing.rs"));
        let manifest = manifest(&["src/a.rs"], &[]);
        let result = verifier.verify(Path::new("."), Some(&manifest), &baseline).unwrap();
        assert!(result.files_actually_touched.is_empty());
        assert!(result.compliant);
    }

    #[test]
    fn accuracy_is_none_when_nothing_predicted_or_touched() {
        let result = ComplianceResult {
            compliant: true,
            files_actually_touched: BTreeSet::new(),
            forbidden_files_touched: BTreeSet::new(),
            unauthorized_files: BTreeSet::new(),
            manifest_files_predicted: BTreeSet::new(),
        };
        assert!(result.accuracy().is_none());
    }

    #[test]
    fn accuracy_is_jaccard_of_predicted_and_touched() {
        let result = ComplianceResult {
            compliant: true,
            files_actually_touched: BTreeSet::from([PathBuf::from("a.rs"), PathBuf::from("b.rs")]),
            forbidden_files_touched: BTreeSet::new(),
            unauthorized_files: BTreeSet::new(),
            manifest_files_predicted: BTreeSet::from([PathBuf::from("a.rs"), PathBuf::from("c.rs")]),
        };
        assert!((result.accuracy().unwrap() - (1.0 / 3.0)).abs() < 1e-9);
        assert_eq!(result.false_positives(), BTreeSet::from([PathBuf::from("c.rs")]));
        assert_eq!(result.false_negatives(), BTreeSet::from([PathBuf::from("b.rs")]));
    }

    #[test]
    fn rollback_restores_only_violating_files() {
        let vcs = FakeVcs::new();
        vcs.mark_changed(PathBuf::from("src/a.rs"));
        vcs.mark_changed(PathBuf::from("src/sneaky.rs"));
        let verifier = ManifestVerifier::new(&vcs);
        let manifest = manifest(&["src/a.rs"], &[]);
        let baseline = BTreeSet::new();
        let result = verifier.verify(Path::new("."), Some(&manifest), &baseline).unwrap();

        verifier.rollback_files(Path::new("."), &result).unwrap();
        let changed = vcs.changed_paths(Path::new(".")).unwrap();
        assert!(!changed.contains(&PathBuf::from("src/sneaky.rs")));
        assert!(changed.contains(&PathBuf::from("src/a.rs")));
    }
}
