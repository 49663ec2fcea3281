//! The top-level control loop: decides each iteration whether to run a
//! planner/quality pass, hand a batch to the [`WorkerPool`], or drive a
//! single issue through the sequential implement-and-verify path, until a
//! stop condition is reached.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::agent::{exit_code, implementer_output_text, AgentCommand, AgentProcess, AgentRole, Marker};
use crate::batch_planner::{load_manifests_from_comments, plan_batches};
use crate::config::{Config, PlannerMode};
use crate::error::{OrchestratorError, Result};
use crate::ids::{IssueId, WorkerId};
use crate::prompt::PromptBuilder;
use crate::state::store::StateStore;
use crate::state::{AttemptResult, IssueStatus};
use crate::tracker::Tracker;
use crate::vcs::VcsBackend;
use crate::verifier::ManifestVerifier;
use crate::worker_pool::{AgentPrograms, WorkerPool};

/// How many times the sequential path retries a failing or
/// manifest-violating implementation attempt before giving up and invoking
/// the breakdown agent.
const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY_MS: u64 = 1000;
const MAX_DELAY_MS: u64 = 4000;

/// How long the sequential path sleeps when every ready issue is blocked,
/// before re-asking the tracker.
const ALL_BLOCKED_PAUSE: Duration = Duration::from_secs(30);

/// Pause between loop iterations once a pass has produced some result.
const INTER_ITERATION_PAUSE: Duration = Duration::from_secs(5);

/// How often [`OrchestratorLoop::drive_agent`] polls a child's output.
const DISPATCH_TICK: Duration = Duration::from_millis(100);

/// Why [`OrchestratorLoop::run`] returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    MaxIterations,
    SingleIssueCompleted,
    EmptyBacklog,
    Interrupted,
}

/// Caller-supplied stop conditions for [`OrchestratorLoop::run`]. A fresh
/// `OrchestratorLoop` run with `RunOptions::default()` runs until the
/// backlog is empty or it's interrupted.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    pub max_iterations: Option<u64>,
    pub single_issue: Option<IssueId>,
}

enum NextIssue {
    InProgress(IssueId),
    Ready(IssueId),
    AllBlocked,
    EmptyBacklog,
}

enum SequentialOutcome {
    Completed,
    Continue,
    BacklogEmpty,
    Interrupted,
}

enum AgentOutcome {
    Exited(i32, String),
    Interrupted,
}

/// Owns the collaborators (VCS, agent process, tracker) and the
/// configuration that together decide what each iteration does. Does not
/// own [`StateStore`]: `run` loads it itself from `state_dir` so that
/// crash recovery is always exercised on the same path a fresh start takes.
pub struct OrchestratorLoop<'a, V: VcsBackend, A: AgentProcess, T: Tracker> {
    vcs: &'a V,
    agent_process: &'a A,
    tracker: &'a T,
    config: Config,
    prompts: PromptBuilder,
    planner_last_run_iteration: Option<u64>,
    quality_last_run_iteration: Option<u64>,
}

impl<'a, V: VcsBackend, A: AgentProcess, T: Tracker> OrchestratorLoop<'a, V, A, T> {
    #[must_use]
    pub fn new(vcs: &'a V, agent_process: &'a A, tracker: &'a T, config: Config) -> Self {
        Self {
            vcs,
            agent_process,
            tracker,
            config,
            prompts: PromptBuilder::new(),
            planner_last_run_iteration: None,
            quality_last_run_iteration: None,
        }
    }

    /// Confirm every external binary this run will need is resolvable on
    /// `PATH`, and that the project's build command (if configured)
    /// succeeds once before any agent is spawned.
    pub fn check_prerequisites(&self) -> Result<()> {
        binary_resolves(&self.config.agents.implementer)?;
        binary_resolves(&self.config.agents.reviewer)?;
        if let Some(name) = self.tracker.binary_name() {
            binary_resolves(name)?;
        }
        if let Some(name) = self.vcs.binary_name() {
            binary_resolves(name)?;
        }
        if let Some(build) = &self.config.project.build {
            let status = std::process::Command::new("sh").args(["-c", build]).status()?;
            if !status.success() {
                return Err(OrchestratorError::BuildFailed {
                    command: build.clone(),
                });
            }
        }
        Ok(())
    }

    /// Run until a stop condition is reached: `options.max_iterations`,
    /// `options.single_issue` completing, the backlog going empty, or an
    /// interrupt. State is persisted after every productive iteration and
    /// once more on the way out.
    pub fn run(&mut self, state_dir: &Path, options: RunOptions) -> Result<StopReason> {
        crate::signal::install()?;
        self.check_prerequisites()?;

        let mut store = StateStore::load(
            state_dir,
            &self.config.project.name,
            self.config.agents.num_workers as usize,
        )?;
        let recovered = store.recover_from_crash();
        if recovered > 0 {
            tracing::info!(recovered, "recovered orchestrator state from a previous crash");
        }

        let mut pool = WorkerPool::new(
            self.vcs,
            self.agent_process,
            AgentPrograms {
                implementer: self.config.agents.implementer.clone(),
                reviewer: self.config.agents.reviewer.clone(),
            },
            self.config.agents.num_workers as usize,
            Duration::from_secs(u64::from(self.config.agents.timeout_seconds)),
        );
        let reaped = pool.reap_orphaned_workspaces(&store)?;
        if reaped > 0 {
            tracing::info!(reaped, "reaped orphaned workspace directories");
        }

        let mut iteration = store.state().total_iterations;

        let stop_reason = loop {
            if crate::signal::is_interrupted() {
                break StopReason::Interrupted;
            }
            iteration += 1;
            store.record_iteration();

            let planner_due = self.planner_due(iteration);
            if planner_due {
                self.run_planner_pass(&mut store, iteration)?;
            }

            let quality_due = self.quality_due(iteration);
            if quality_due {
                self.run_quality_pass(iteration)?;
            }

            let mut productive = planner_due || quality_due;
            let mut ran_batch = false;

            if let Some(batch) = store.get_next_pending_batch() {
                let successes = pool.execute_batch(&batch, &mut store)?;
                tracing::info!(successes, issues = batch.issue_ids.len(), "executed a batch");
                productive = true;
                ran_batch = true;
            } else if matches!(self.config.passes.planner_mode, PlannerMode::EventDriven) && !planner_due {
                // Event-driven mode only plans on demand: an empty queue is
                // the demand signal. Try once more before falling back to
                // the sequential path this iteration.
                self.run_planner_pass(&mut store, iteration)?;
                productive = true;
                if let Some(batch) = store.get_next_pending_batch() {
                    pool.execute_batch(&batch, &mut store)?;
                    ran_batch = true;
                }
            }

            if !ran_batch {
                match self.run_sequential_iteration(&mut store)? {
                    SequentialOutcome::Completed | SequentialOutcome::Continue => productive = true,
                    SequentialOutcome::BacklogEmpty => {
                        store.save()?;
                        break StopReason::EmptyBacklog;
                    }
                    SequentialOutcome::Interrupted => {
                        store.save()?;
                        break StopReason::Interrupted;
                    }
                }
            }

            if productive {
                store.save()?;
            }

            if let Some(max) = options.max_iterations {
                if iteration >= max {
                    break StopReason::MaxIterations;
                }
            }
            if let Some(single) = &options.single_issue {
                let completed = store
                    .get_issue(single)
                    .map(|s| s.status)
                    .map_or(false, |status| status == IssueStatus::Completed);
                if completed {
                    break StopReason::SingleIssueCompleted;
                }
            }
            if crate::signal::is_interrupted() {
                break StopReason::Interrupted;
            }

            std::thread::sleep(INTER_ITERATION_PAUSE);
        };

        store.save()?;
        crate::signal::set_current_issue(None);
        Ok(stop_reason)
    }

    fn planner_due(&self, iteration: u64) -> bool {
        if !self.config.passes.planner_enabled {
            return false;
        }
        match self.config.passes.planner_mode {
            PlannerMode::Interval => {
                iteration == 1
                    || self.planner_last_run_iteration.map_or(true, |last| {
                        iteration - last >= u64::from(self.config.passes.planner_interval)
                    })
            }
            PlannerMode::EventDriven => iteration == 1,
        }
    }

    fn quality_due(&self, iteration: u64) -> bool {
        if !self.config.passes.quality_enabled {
            return false;
        }
        iteration == 1
            || self.quality_last_run_iteration.map_or(true, |last| {
                iteration - last >= u64::from(self.config.passes.quality_interval)
            })
    }

    fn run_planner_pass(&mut self, store: &mut StateStore, iteration: u64) -> Result<()> {
        tracing::info!(iteration, "starting planner pass");
        let workspace = self.vcs.create_workspace(WorkerId::reserved())?;
        let prompt = self.prompts.plan();
        let outcome = self.drive_agent(AgentRole::Planner, &self.config.agents.reviewer, &prompt, &workspace)?;
        self.vcs.remove_workspace(WorkerId::reserved())?;
        self.planner_last_run_iteration = Some(iteration);

        let AgentOutcome::Exited(code, output) = outcome else {
            tracing::info!("planner pass interrupted");
            return Ok(());
        };
        if code != 0 || Marker::find_in(&output) != Some(Marker::PlanningComplete) {
            tracing::warn!(code, "planner pass did not report completion cleanly");
            return Ok(());
        }

        let manifested = load_manifests_from_comments(store, self.tracker)?;
        let batches = plan_batches(store, &manifested);
        tracing::info!(batches, "planner pass repacked the ready backlog");
        Ok(())
    }

    fn run_quality_pass(&mut self, iteration: u64) -> Result<()> {
        tracing::info!(iteration, "starting quality-review pass");
        let workspace = self.vcs.create_workspace(WorkerId::reserved())?;
        let prompt = self.prompts.quality_review();
        let outcome = self.drive_agent(
            AgentRole::QualityReviewer,
            &self.config.agents.reviewer,
            &prompt,
            &workspace,
        )?;
        self.vcs.remove_workspace(WorkerId::reserved())?;
        self.quality_last_run_iteration = Some(iteration);

        if let AgentOutcome::Exited(code, output) = outcome {
            if code != 0 || Marker::find_in(&output) != Some(Marker::QualityReviewComplete) {
                tracing::warn!(code, "quality-review pass did not report completion cleanly");
            }
        }
        Ok(())
    }

    fn run_breakdown_pass(&self, issue_id: &IssueId) -> Result<()> {
        tracing::info!(issue = issue_id.as_str(), "issue exhausted its attempts; invoking breakdown");
        let workspace = self.vcs.create_workspace(WorkerId::reserved())?;
        let prompt = self.prompts.breakdown(issue_id);
        let outcome = self.drive_agent(AgentRole::Breakdown, &self.config.agents.reviewer, &prompt, &workspace)?;
        self.vcs.remove_workspace(WorkerId::reserved())?;

        if let AgentOutcome::Exited(code, output) = outcome {
            if code != 0 || Marker::find_in(&output) != Some(Marker::BreakdownComplete) {
                tracing::warn!(issue = issue_id.as_str(), code, "breakdown pass did not report completion cleanly");
            }
        }
        Ok(())
    }

    /// In-progress issues (resumed from a previous run) take priority over
    /// the highest-priority ready issue; an all-blocked backlog is reported
    /// distinctly from a genuinely empty one so the caller can wait instead
    /// of stopping.
    fn next_issue(&self, store: &StateStore) -> Result<NextIssue> {
        if let Some((id, _)) = store
            .state()
            .issues
            .iter()
            .find(|(_, issue)| issue.status == IssueStatus::Running)
        {
            return Ok(NextIssue::InProgress(id.clone()));
        }

        let ready = self.tracker.ready_issues()?;
        if let Some(id) = ready.into_iter().next() {
            return Ok(NextIssue::Ready(id));
        }

        let blocked = self.tracker.blocked_issues()?;
        if blocked.is_empty() {
            Ok(NextIssue::EmptyBacklog)
        } else {
            Ok(NextIssue::AllBlocked)
        }
    }

    fn run_sequential_iteration(&mut self, store: &mut StateStore) -> Result<SequentialOutcome> {
        let issue_id = match self.next_issue(store)? {
            NextIssue::InProgress(id) | NextIssue::Ready(id) => id,
            NextIssue::AllBlocked => {
                tracing::info!("every ready issue is blocked; waiting before asking again");
                std::thread::sleep(ALL_BLOCKED_PAUSE);
                return Ok(SequentialOutcome::Continue);
            }
            NextIssue::EmptyBacklog => {
                tracing::info!("backlog is empty");
                return Ok(SequentialOutcome::BacklogEmpty);
            }
        };

        store.ensure_issue(&issue_id);
        store.update_issue(&issue_id, IssueStatus::Running)?;
        crate::signal::set_current_issue(Some(issue_id.clone()));

        let worker = WorkerId::reserved();
        let workspace = self.vcs.create_workspace(worker)?;
        let manifest = store.get_manifest(&issue_id).cloned();
        let verifier = ManifestVerifier::new(self.vcs);
        let baseline = verifier.capture_baseline(&workspace)?;

        let primary = manifest.as_ref().map(|m| m.primary_files.clone()).unwrap_or_default();
        let read = manifest.as_ref().map(|m| m.read_files.clone()).unwrap_or_default();
        let forbidden = manifest.as_ref().map(|m| m.forbidden_files.clone()).unwrap_or_default();
        let mut prompt = self.prompts.implement(&issue_id, issue_id.as_str(), &primary, &read, &forbidden);

        let mut interrupted = false;
        let mut succeeded = false;

        for attempt in 1..=MAX_ATTEMPTS {
            if crate::signal::is_interrupted() {
                interrupted = true;
                break;
            }

            let outcome = self.drive_agent(AgentRole::Implementer, &self.config.agents.implementer, &prompt, &workspace)?;
            let AgentOutcome::Exited(code, _output) = outcome else {
                interrupted = true;
                break;
            };

            let compliance = verifier.verify(&workspace, manifest.as_ref(), &baseline)?;
            if !compliance.compliant {
                tracing::warn!(issue = issue_id.as_str(), attempt, "manifest violation on this attempt");
                verifier.rollback_files(&workspace, &compliance)?;
                store.record_attempt(
                    &issue_id,
                    AttemptResult::Violation,
                    path_strings(&compliance.files_actually_touched),
                    "manifest violation; rolled back and retried with a stricter prompt",
                )?;
                prompt = self.prompts.stricter_retry(
                    &prompt,
                    &path_strings(&compliance.forbidden_files_touched),
                    &path_strings(&compliance.unauthorized_files),
                );
                if attempt < MAX_ATTEMPTS {
                    std::thread::sleep(backoff_delay(attempt));
                }
                continue;
            }

            if code == exit_code::SUCCESS {
                store.record_attempt(
                    &issue_id,
                    AttemptResult::Success,
                    path_strings(&compliance.files_actually_touched),
                    "completed",
                )?;
                succeeded = true;
                break;
            }

            let result = if code == exit_code::IDLE_TIMEOUT {
                AttemptResult::Timeout
            } else {
                AttemptResult::Failed
            };
            store.record_attempt(
                &issue_id,
                result,
                path_strings(&compliance.files_actually_touched),
                format!("exit code {code}"),
            )?;

            if !exit_code::should_retry(code) {
                break;
            }
            if attempt < MAX_ATTEMPTS {
                std::thread::sleep(backoff_delay(attempt));
            }
        }

        self.vcs.remove_workspace(worker)?;
        crate::signal::set_current_issue(None);

        if interrupted {
            store.update_issue(&issue_id, IssueStatus::Pending)?;
            return Ok(SequentialOutcome::Interrupted);
        }

        if succeeded {
            store.update_issue(&issue_id, IssueStatus::Completed)?;
            self.tracker.update_status(&issue_id, "done")?;
            self.tracker.close(&issue_id, "implemented and verified by the orchestrator")?;
            self.maybe_sync_downstream(&issue_id);
            return Ok(SequentialOutcome::Completed);
        }

        store.update_issue(&issue_id, IssueStatus::Failed)?;
        self.run_breakdown_pass(&issue_id)?;
        Ok(SequentialOutcome::Continue)
    }

    fn maybe_sync_downstream(&self, issue_id: &IssueId) {
        if let Some(provider) = &self.config.sync.provider {
            tracing::debug!(
                issue = issue_id.as_str(),
                provider,
                "downstream sync provider is configured but not wired into this core"
            );
        }
    }

    /// Spawn `role` via `program` with `prompt`, and poll it to completion:
    /// either a clean exit, an idle-timeout kill, or an interrupt.
    fn drive_agent(&self, role: AgentRole, program: &str, prompt: &str, cwd: &Path) -> Result<AgentOutcome> {
        let mut child = self.agent_process.spawn(&AgentCommand {
            role,
            program: program.to_owned(),
            prompt: prompt.to_owned(),
            cwd: cwd.to_path_buf(),
        })?;

        let timeout = Duration::from_secs(u64::from(self.config.agents.timeout_seconds));
        let mut buffer = String::new();
        let mut last_output = Instant::now();

        loop {
            if crate::signal::is_interrupted() {
                child.kill()?;
                return Ok(AgentOutcome::Interrupted);
            }

            let new_lines = child.poll_output();
            if !new_lines.is_empty() {
                last_output = Instant::now();
                for line in &new_lines {
                    let decoded = if role == AgentRole::Implementer {
                        implementer_output_text(line)
                    } else {
                        line.clone()
                    };
                    buffer.push_str(&decoded);
                    buffer.push('\n');
                }
            }

            if let Some(code) = child.try_wait()? {
                return Ok(AgentOutcome::Exited(code, buffer));
            }

            if last_output.elapsed() > timeout {
                child.kill()?;
                return Ok(AgentOutcome::Exited(exit_code::IDLE_TIMEOUT, buffer));
            }

            std::thread::sleep(DISPATCH_TICK);
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let shift = (attempt - 1).min(31);
    let millis = BASE_DELAY_MS.saturating_mul(1u64 << shift);
    Duration::from_millis(millis.min(MAX_DELAY_MS))
}

fn path_strings<'p>(paths: impl IntoIterator<Item = &'p PathBuf>) -> Vec<String> {
    paths.into_iter().map(|p| p.to_string_lossy().into_owned()).collect()
}

fn binary_resolves(program: &str) -> Result<()> {
    match std::process::Command::new(program).arg("--version").output() {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(OrchestratorError::MissingPrerequisite {
            program: program.to_owned(),
        }),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::process::{FakeAgentProcess, FakeResponse};
    use crate::tracker::FakeTracker;
    use crate::vcs::FakeVcs;

    /// Agent binaries need to resolve on `PATH` for `check_prerequisites`
    /// even though the scripted `FakeAgentProcess` never actually execs
    /// them; `true` is universally present and side-effect free.
    fn test_config() -> Config {
        let mut config = Config::default();
        config.agents.implementer = "true".to_owned();
        config.agents.reviewer = "true".to_owned();
        config.passes.planner_enabled = false;
        config
    }

    fn fresh_loop<'a>(
        vcs: &'a FakeVcs,
        agents: &'a FakeAgentProcess,
        tracker: &'a FakeTracker,
        config: Config,
    ) -> OrchestratorLoop<'a, FakeVcs, FakeAgentProcess, FakeTracker> {
        OrchestratorLoop::new(vcs, agents, tracker, config)
    }

    #[test]
    fn backoff_delay_doubles_and_caps_at_max() {
        assert_eq!(backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(10), Duration::from_millis(4000));
    }

    #[test]
    fn planner_due_on_first_iteration_then_respects_interval() {
        let vcs = FakeVcs::new();
        let agents = FakeAgentProcess::new();
        let tracker = FakeTracker::new();
        let mut config = test_config();
        config.passes.planner_enabled = true;
        config.passes.planner_interval = 3;
        let mut orchestrator = fresh_loop(&vcs, &agents, &tracker, config);

        assert!(orchestrator.planner_due(1));
        orchestrator.planner_last_run_iteration = Some(1);
        assert!(!orchestrator.planner_due(2));
        assert!(orchestrator.planner_due(4));
    }

    #[test]
    fn sequential_mode_completes_a_single_issue() {
        crate::signal::reset_for_test();
        let vcs = FakeVcs::new();
        let agents = FakeAgentProcess::new();
        let tracker = FakeTracker::new();
        let issue = IssueId::new("T-1");
        tracker.seed_ready([issue.clone()]);
        agents.push_response(FakeResponse {
            lines: vec![],
            exit_code: 0,
        });

        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator = fresh_loop(&vcs, &agents, &tracker, test_config());
        let options = RunOptions {
            max_iterations: Some(5),
            single_issue: Some(issue.clone()),
        };
        let stop_reason = orchestrator.run(dir.path(), options).unwrap();

        assert_eq!(stop_reason, StopReason::SingleIssueCompleted);
        assert_eq!(tracker.close_reason(&issue).as_deref(), Some("implemented and verified by the orchestrator"));
    }

    #[test]
    fn exhausting_retries_triggers_breakdown_and_stops_at_max_iterations() {
        crate::signal::reset_for_test();
        let vcs = FakeVcs::new();
        let agents = FakeAgentProcess::new();
        let tracker = FakeTracker::new();
        let issue = IssueId::new("T-1");
        tracker.seed_ready([issue.clone()]);
        for _ in 0..MAX_ATTEMPTS {
            agents.push_response(FakeResponse {
                lines: vec![],
                exit_code: exit_code::GENERIC_FAILURE,
            });
        }
        agents.push_response(FakeResponse {
            lines: vec!["BREAKDOWN_COMPLETE".to_owned()],
            exit_code: 0,
        });

        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator = fresh_loop(&vcs, &agents, &tracker, test_config());
        let options = RunOptions {
            max_iterations: Some(1),
            single_issue: None,
        };
        let stop_reason = orchestrator.run(dir.path(), options).unwrap();

        assert_eq!(stop_reason, StopReason::MaxIterations);
    }

    #[test]
    fn run_recovers_state_left_by_a_previous_crash() {
        crate::signal::reset_for_test();
        let vcs = FakeVcs::new();
        let agents = FakeAgentProcess::new();
        let tracker = FakeTracker::new();
        let dir = tempfile::tempdir().unwrap();

        {
            let mut store = StateStore::load(dir.path(), "demo", 1).unwrap();
            let issue = IssueId::new("T-7");
            store.ensure_issue(&issue);
            store.set_manifest(&issue, crate::manifest::Manifest {
                primary_files: vec!["src/k.rs".to_owned()],
                ..Default::default()
            }).unwrap();
            let worker = store.find_idle_worker().unwrap();
            store.assign_worker(worker, &issue).unwrap();
            store.try_acquire_locks(&issue, worker).unwrap();
            store.update_issue(&issue, IssueStatus::Running).unwrap();
            store.save().unwrap();
        }

        // No ready issues are seeded, so the resumed run immediately finds
        // an empty backlog; this test only cares that the stuck worker's
        // lock was released before that point.
        let mut orchestrator = fresh_loop(&vcs, &agents, &tracker, test_config());
        let options = RunOptions {
            max_iterations: Some(1),
            single_issue: None,
        };
        let stop_reason = orchestrator.run(dir.path(), options).unwrap();

        assert_eq!(stop_reason, StopReason::EmptyBacklog);
        let store = StateStore::load(dir.path(), "demo", 1).unwrap();
        assert!(store.state().locks.is_empty());
        assert_eq!(store.get_issue(&IssueId::new("T-7")).unwrap().status, IssueStatus::Pending);
    }

    #[test]
    fn batch_mode_executes_via_planner_generated_manifest() {
        crate::signal::reset_for_test();
        let vcs = FakeVcs::new();
        let agents = FakeAgentProcess::new();
        let tracker = FakeTracker::new();
        let issue = IssueId::new("T-1");
        tracker.seed_ready([issue.clone()]);
        tracker.seed_comment(issue.clone(), "MANIFEST: primary=[src/a.rs]");

        // Planner pass, then implement/review/merge for the one-issue batch.
        agents.push_response(FakeResponse {
            lines: vec!["PLANNING_COMPLETE".to_owned()],
            exit_code: 0,
        });
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

        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.passes.planner_enabled = true;
        let mut orchestrator = fresh_loop(&vcs, &agents, &tracker, config);
        let options = RunOptions {
            max_iterations: Some(1),
            single_issue: None,
        };
        orchestrator.run(dir.path(), options).unwrap();

        let store = StateStore::load(dir.path(), "demo", 1).unwrap();
        assert_eq!(store.get_issue(&issue).unwrap().status, IssueStatus::Completed);
    }
}
