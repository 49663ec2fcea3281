//! Prompt templates, kept as data (not code) with a small closed set of
//! substitution slots. No control flow, loops, or conditionals are exposed
//! to the template text itself.

use crate::ids::IssueId;

const IMPLEMENT_TEMPLATE: &str = "\
Implement issue {issue_id}: {issue_summary}

Primary files you may write: {primary_files}
Files you may read for context: {read_files}
Files you must never touch: {forbidden_files}

When your change is ready for review, emit the line:
READY_FOR_REVIEW
If you cannot proceed, emit:
BLOCKED: <reason>
";

const IMPLEMENT_RETRY_TEMPLATE: &str = "\
{base_prompt}

The reviewer requested changes:
{feedback}
";

const STRICTER_RETRY_TEMPLATE: &str = "\
{base_prompt}

Your previous attempt violated the manifest. You touched these forbidden
files: {forbidden_touched}
And these unauthorized files: {unauthorized_touched}
Do not touch any file outside the primary list above.
";

const REVIEW_TEMPLATE: &str = "\
Review the pending change for issue {issue_id}.
If it is correct, emit APPROVED.
Otherwise emit CHANGES_REQUESTED: <specific feedback>.
";

const MERGE_TEMPLATE: &str = "\
Finalize the approved change for issue {issue_id}: commit it with a
descriptive message and squash it into the main working copy.
Emit MERGE_COMPLETE when done.
";

const BREAKDOWN_TEMPLATE: &str = "\
Issue {issue_id} failed after all implementation attempts.
Split it into smaller sub-issues the tracker can track independently.
Emit BREAKDOWN_COMPLETE when done.
";

const PLANNER_TEMPLATE: &str = "\
Review the ready backlog. For every ready issue that is missing one, add a
comment of the form:
MANIFEST: primary=[...] read=[...] forbidden=[...]
Emit PLANNING_COMPLETE when every ready issue has a manifest.
";

const QUALITY_TEMPLATE: &str = "\
Review recently merged changes for quality regressions: dead code, missing
tests, and manifest drift. File follow-up issues for anything you find.
Emit QUALITY_REVIEW_COMPLETE when done.
";

/// Builds agent prompts from the fixed templates above, substituting a
/// closed set of named slots.
#[derive(Debug, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// The initial implementation prompt for a fresh attempt.
    #[must_use]
    pub fn implement(
        &self,
        issue_id: &IssueId,
        issue_summary: &str,
        primary_files: &[String],
        read_files: &[String],
        forbidden_files: &[String],
    ) -> String {
        substitute(
            IMPLEMENT_TEMPLATE,
            &[
                ("issue_id", issue_id.as_str()),
                ("issue_summary", issue_summary),
                ("primary_files", &join_or_none(primary_files)),
                ("read_files", &join_or_none(read_files)),
                ("forbidden_files", &join_or_none(forbidden_files)),
            ],
        )
    }

    /// Wrap a base prompt with reviewer feedback for a respawned
    /// implementation attempt.
    #[must_use]
    pub fn implement_with_feedback(&self, base_prompt: &str, feedback: &str) -> String {
        substitute(
            IMPLEMENT_RETRY_TEMPLATE,
            &[("base_prompt", base_prompt), ("feedback", feedback)],
        )
    }

    /// Wrap a base prompt with a manifest-violation warning, naming exactly
    /// which forbidden/unauthorized files were touched.
    #[must_use]
    pub fn stricter_retry(
        &self,
        base_prompt: &str,
        forbidden_touched: &[String],
        unauthorized_touched: &[String],
    ) -> String {
        substitute(
            STRICTER_RETRY_TEMPLATE,
            &[
                ("base_prompt", base_prompt),
                ("forbidden_touched", &join_or_none(forbidden_touched)),
                ("unauthorized_touched", &join_or_none(unauthorized_touched)),
            ],
        )
    }

    #[must_use]
    pub fn review(&self, issue_id: &IssueId) -> String {
        substitute(REVIEW_TEMPLATE, &[("issue_id", issue_id.as_str())])
    }

    #[must_use]
    pub fn breakdown(&self, issue_id: &IssueId) -> String {
        substitute(BREAKDOWN_TEMPLATE, &[("issue_id", issue_id.as_str())])
    }

    #[must_use]
    pub fn merge(&self, issue_id: &IssueId) -> String {
        substitute(MERGE_TEMPLATE, &[("issue_id", issue_id.as_str())])
    }

    /// The planner pass prompt: no substitution slots, just the fixed
    /// instruction text.
    #[must_use]
    pub fn plan(&self) -> String {
        PLANNER_TEMPLATE.to_owned()
    }

    /// The quality-review pass prompt: no substitution slots.
    #[must_use]
    pub fn quality_review(&self) -> String {
        QUALITY_TEMPLATE.to_owned()
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_owned()
    } else {
        items.join(", ")
    }
}

fn substitute(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = template.to_owned();
    for (key, value) in slots {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}
