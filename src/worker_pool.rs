//! Spawns and supervises up to `num_workers` child agent processes, each
//! driven through the implement → review → merge phase machine inside its
//! own VCS workspace.
//!
//! The pool is single-threaded: concurrency comes from multiplexed
//! non-blocking process supervision (poll output, non-blocking wait), not
//! from in-process threads. See [`crate::signal`] for the one piece of
//! process-wide state it consults.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::agent::{exit_code, implementer_output_text, AgentCommand, AgentProcess, AgentRole, Marker, SupervisedChild};
use crate::error::Result;
use crate::ids::{IssueId, WorkerId};
use crate::prompt::PromptBuilder;
use crate::state::{Batch, store::StateStore};
use crate::vcs::VcsBackend;

/// Upper bound on reviewer round-trips before an issue is given up on.
pub const MAX_REVIEW_ITERATIONS: u32 = 5;

/// How long the dispatch loop sleeps between polling passes.
const DISPATCH_TICK: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Implementing,
    Reviewing,
    Merging,
}

struct RunningSlot {
    issue_id: IssueId,
    worker_id: WorkerId,
    workspace: PathBuf,
    phase: Phase,
    child: Box<dyn SupervisedChild>,
    last_output_time: Instant,
    review_iterations: u32,
    base_prompt: String,
    output_buffer: String,
}

/// Final outcome of one worker's run on one issue, as surfaced by
/// [`WorkerPool::execute_batch`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerResult {
    pub issue_id: IssueId,
    pub success: bool,
    pub exit_code: i32,
    pub detail: String,
}

/// Names of the external agent binaries the pool spawns.
#[derive(Clone, Debug)]
pub struct AgentPrograms {
    pub implementer: String,
    pub reviewer: String,
}

/// Drives a fixed-size pool of worker slots through the phase machine,
/// generic over the VCS and agent-process collaborators so tests can
/// supply fakes.
pub struct WorkerPool<'a, V: VcsBackend, A: AgentProcess> {
    vcs: &'a V,
    agent_process: &'a A,
    prompts: PromptBuilder,
    programs: AgentPrograms,
    num_workers: usize,
    agent_timeout: Duration,
    slots: BTreeMap<WorkerId, RunningSlot>,
}

impl<'a, V: VcsBackend, A: AgentProcess> WorkerPool<'a, V, A> {
    #[must_use]
    pub fn new(
        vcs: &'a V,
        agent_process: &'a A,
        programs: AgentPrograms,
        num_workers: usize,
        agent_timeout: Duration,
    ) -> Self {
        Self {
            vcs,
            agent_process,
            prompts: PromptBuilder::new(),
            programs,
            num_workers,
            agent_timeout,
            slots: BTreeMap::new(),
        }
    }

    /// Reap any workspace directories left behind by a previous crashed
    /// run that no in-flight worker currently claims. Workspace directories
    /// are named `worker-<n>` by [`crate::vcs::jj::JjBackend`]; a workspace
    /// whose index isn't presently in-flight in `store` is orphaned.
    pub fn reap_orphaned_workspaces(&self, store: &StateStore) -> Result<usize> {
        let in_flight: std::collections::BTreeSet<usize> = store
            .state()
            .workers
            .iter()
            .enumerate()
            .filter(|(_, w)| w.status.is_in_flight())
            .map(|(idx, _)| idx)
            .collect();

        let mut reaped = 0;
        for path in self.vcs.list_workspaces()? {
            let owner_index = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix("worker-"))
                .and_then(|idx| idx.parse::<usize>().ok());

            let is_claimed = owner_index.is_some_and(|idx| in_flight.contains(&idx));
            if !is_claimed {
                let _ = std::fs::remove_dir_all(&path);
                reaped += 1;
            }
        }
        Ok(reaped)
    }

    /// Drive `batch` to completion: dispatch every member issue to an idle
    /// slot, poll until every issue has a terminal result, and return the
    /// count of successful results.
    ///
    /// Honors [`crate::signal::is_interrupted`]: on interrupt, kills every
    /// running child, re-queues the batch as pending, and returns early
    /// with whatever results had already landed.
    pub fn execute_batch(&mut self, batch: &Batch, store: &mut StateStore) -> Result<usize> {
        let mut unassigned: Vec<IssueId> = batch.issue_ids.clone();
        let mut results: Vec<WorkerResult> = Vec::new();

        loop {
            if crate::signal::is_interrupted() {
                self.kill_all(store)?;
                store.requeue_current_batch();
                return Ok(results.iter().filter(|r| r.success).count());
            }

            self.poll_running(store, &mut results)?;
            self.check_timeouts(store, &mut results)?;
            self.dispatch_idle(&mut unassigned, store)?;

            if unassigned.is_empty() && self.slots.is_empty() {
                break;
            }
            std::thread::sleep(DISPATCH_TICK);
        }

        store.complete_current_batch();
        Ok(results.iter().filter(|r| r.success).count())
    }

    fn dispatch_idle(&mut self, unassigned: &mut Vec<IssueId>, store: &mut StateStore) -> Result<()> {
        while !unassigned.is_empty() {
            let Some(worker) = store.find_idle_worker() else {
                break;
            };
            let issue_id = unassigned.remove(0);
            self.start_implementing(worker, issue_id, store)?;
        }
        Ok(())
    }

    fn start_implementing(&mut self, worker: WorkerId, issue_id: IssueId, store: &mut StateStore) -> Result<()> {
        let workspace = self.vcs.create_workspace(worker)?;
        store.assign_worker(worker, &issue_id)?;
        // The batch planner only ever hands us issues whose manifests are
        // pairwise disjoint (see plan_batches), so this should never
        // conflict in practice; it still asks the lock table rather than
        // assuming that invariant holds.
        store.try_acquire_locks(&issue_id, worker)?;

        let manifest = store.get_manifest(&issue_id).cloned().unwrap_or_default();
        let prompt = self.prompts.implement(
            &issue_id,
            issue_id.as_str(),
            &manifest.primary_files,
            &manifest.read_files,
            &manifest.forbidden_files,
        );

        let child = self.agent_process.spawn(&AgentCommand {
            role: AgentRole::Implementer,
            program: self.programs.implementer.clone(),
            prompt: prompt.clone(),
            cwd: workspace.clone(),
        })?;

        self.slots.insert(
            worker,
            RunningSlot {
                issue_id,
                worker_id: worker,
                workspace,
                phase: Phase::Implementing,
                child,
                last_output_time: Instant::now(),
                review_iterations: 0,
                base_prompt: prompt,
                output_buffer: String::new(),
            },
        );
        Ok(())
    }

    fn poll_running(&mut self, store: &mut StateStore, results: &mut Vec<WorkerResult>) -> Result<()> {
        let worker_ids: Vec<WorkerId> = self.slots.keys().copied().collect();
        for worker in worker_ids {
            let Some(slot) = self.slots.get_mut(&worker) else {
                continue;
            };
            let new_lines = slot.child.poll_output();
            if !new_lines.is_empty() {
                slot.last_output_time = Instant::now();
                store.mark_worker_running(worker)?;
                for line in &new_lines {
                    let decoded = if slot.phase == Phase::Implementing {
                        implementer_output_text(line)
                    } else {
                        line.clone()
                    };
                    slot.output_buffer.push_str(&decoded);
                    slot.output_buffer.push('\n');
                }
            }
            let Some(code) = slot.child.try_wait()? else {
                continue;
            };
            self.handle_exit(worker, code, store, results)?;
        }
        Ok(())
    }

    fn check_timeouts(&mut self, store: &mut StateStore, results: &mut Vec<WorkerResult>) -> Result<()> {
        let timed_out: Vec<WorkerId> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.last_output_time.elapsed() > self.agent_timeout)
            .map(|(worker, _)| *worker)
            .collect();

        for worker in timed_out {
            if let Some(mut slot) = self.slots.remove(&worker) {
                slot.child.kill()?;
                self.vcs.remove_workspace(worker)?;
                store.timeout_worker(worker)?;
                results.push(WorkerResult {
                    issue_id: slot.issue_id,
                    success: false,
                    exit_code: exit_code::IDLE_TIMEOUT,
                    detail: "agent produced no output before the idle timeout".to_owned(),
                });
            }
        }
        Ok(())
    }

    fn handle_exit(
        &mut self,
        worker: WorkerId,
        code: i32,
        store: &mut StateStore,
        results: &mut Vec<WorkerResult>,
    ) -> Result<()> {
        let Some(slot) = self.slots.remove(&worker) else {
            return Ok(());
        };

        if code != 0 {
            self.finish(worker, slot, store, results, false, code, "agent process exited non-zero")?;
            return Ok(());
        }

        let marker = Marker::find_in(&slot.output_buffer);
        match (slot.phase, marker) {
            (Phase::Implementing, Some(Marker::Blocked(reason))) => {
                self.finish(worker, slot, store, results, false, exit_code::GENERIC_FAILURE, &reason)?;
            }
            (Phase::Implementing, Some(Marker::ReadyForReview)) => {
                self.advance_to_review(worker, slot)?;
            }
            (Phase::Reviewing, Some(Marker::Approved)) => {
                self.advance_to_merge(worker, slot)?;
            }
            (Phase::Reviewing, Some(Marker::ChangesRequested(feedback))) => {
                self.handle_changes_requested(worker, slot, store, results, feedback)?;
            }
            (Phase::Merging, Some(Marker::MergeComplete)) => {
                self.finish(worker, slot, store, results, true, exit_code::SUCCESS, "merged")?;
            }
            _ => {
                self.finish(
                    worker,
                    slot,
                    store,
                    results,
                    false,
                    exit_code::GENERIC_FAILURE,
                    "phase exited without its expected marker",
                )?;
            }
        }
        Ok(())
    }

    fn advance_to_review(&mut self, worker: WorkerId, mut slot: RunningSlot) -> Result<()> {
        let prompt = self.prompts.review(&slot.issue_id);
        let child = self.agent_process.spawn(&AgentCommand {
            role: AgentRole::Reviewer,
            program: self.programs.reviewer.clone(),
            prompt,
            cwd: slot.workspace.clone(),
        })?;
        slot.phase = Phase::Reviewing;
        slot.child = child;
        slot.last_output_time = Instant::now();
        slot.output_buffer.clear();
        self.slots.insert(worker, slot);
        Ok(())
    }

    fn advance_to_merge(&mut self, worker: WorkerId, mut slot: RunningSlot) -> Result<()> {
        let prompt = self.prompts.merge(&slot.issue_id);
        let child = self.agent_process.spawn(&AgentCommand {
            role: AgentRole::Reviewer,
            program: self.programs.reviewer.clone(),
            prompt,
            cwd: slot.workspace.clone(),
        })?;
        slot.phase = Phase::Merging;
        slot.child = child;
        slot.last_output_time = Instant::now();
        slot.output_buffer.clear();
        self.slots.insert(worker, slot);
        Ok(())
    }

    fn handle_changes_requested(
        &mut self,
        worker: WorkerId,
        mut slot: RunningSlot,
        store: &mut StateStore,
        results: &mut Vec<WorkerResult>,
        feedback: String,
    ) -> Result<()> {
        slot.review_iterations += 1;
        if slot.review_iterations >= MAX_REVIEW_ITERATIONS {
            self.finish(
                worker,
                slot,
                store,
                results,
                false,
                exit_code::GENERIC_FAILURE,
                "exceeded the maximum number of review iterations",
            )?;
            return Ok(());
        }

        let prompt = self.prompts.implement_with_feedback(&slot.base_prompt, &feedback);
        let child = self.agent_process.spawn(&AgentCommand {
            role: AgentRole::Implementer,
            program: self.programs.implementer.clone(),
            prompt: prompt.clone(),
            cwd: slot.workspace.clone(),
        })?;
        slot.phase = Phase::Implementing;
        slot.child = child;
        slot.base_prompt = prompt;
        slot.last_output_time = Instant::now();
        slot.output_buffer.clear();
        self.slots.insert(worker, slot);
        Ok(())
    }

    fn finish(
        &mut self,
        worker: WorkerId,
        slot: RunningSlot,
        store: &mut StateStore,
        results: &mut Vec<WorkerResult>,
        success: bool,
        code: i32,
        detail: &str,
    ) -> Result<()> {
        self.vcs.remove_workspace(worker)?;
        store.complete_worker(worker, success)?;
        results.push(WorkerResult {
            issue_id: slot.issue_id,
            success,
            exit_code: code,
            detail: detail.to_owned(),
        });
        Ok(())
    }

    fn kill_all(&mut self, store: &mut StateStore) -> Result<()> {
        let worker_ids: Vec<WorkerId> = self.slots.keys().copied().collect();
        for worker in worker_ids {
            if let Some(mut slot) = self.slots.remove(&worker) {
                slot.child.kill()?;
                self.vcs.remove_workspace(worker)?;
                store.complete_worker(worker, false)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::process::{FakeAgentProcess, FakeResponse};
    use crate::manifest::Manifest;
    use crate::vcs::FakeVcs;

    fn fresh_store(workers: usize) -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::load(dir.path(), "demo", workers).unwrap();
        (dir, store)
    }

    fn pool<'a>(vcs: &'a FakeVcs, agents: &'a FakeAgentProcess) -> WorkerPool<'a, FakeVcs, FakeAgentProcess> {
        WorkerPool::new(
            vcs,
            agents,
            AgentPrograms {
                implementer: "claude".to_owned(),
                reviewer: "claude".to_owned(),
            },
            1,
            Duration::from_secs(900),
        )
    }

    #[test]
    fn happy_path_runs_implement_review_merge_to_success() {
        let vcs = FakeVcs::new();
        let agents = FakeAgentProcess::new();
        agents.push_response(FakeResponse { lines: vec!["READY_FOR_REVIEW".to_owned()], exit_code: 0 });
        agents.push_response(FakeResponse { lines: vec!["APPROVED".to_owned()], exit_code: 0 });
        agents.push_response(FakeResponse { lines: vec!["MERGE_COMPLETE".to_owned()], exit_code: 0 });

        let (_dir, mut store) = fresh_store(1);
        let issue = IssueId::new("T-1");
        store.ensure_issue(&issue);
        store.set_manifest(&issue, Manifest { primary_files: vec!["a.rs".to_owned()], ..Manifest::default() }).unwrap();
        let batch = Batch::new(crate::ids::BatchId::first(), vec![issue.clone()]);

        let mut pool = pool(&vcs, &agents);
        let successes = pool.execute_batch(&batch, &mut store).unwrap();
        assert_eq!(successes, 1);
        assert_eq!(store.get_issue(&issue).unwrap().status, crate::state::IssueStatus::Completed);
    }

    #[test]
    fn blocked_marker_fails_the_issue() {
        let vcs = FakeVcs::new();
        let agents = FakeAgentProcess::new();
        agents.push_response(FakeResponse { lines: vec!["BLOCKED: missing credentials".to_owned()], exit_code: 0 });

        let (_dir, mut store) = fresh_store(1);
        let issue = IssueId::new("T-1");
        store.ensure_issue(&issue);
        let batch = Batch::new(crate::ids::BatchId::first(), vec![issue.clone()]);

        let mut pool = pool(&vcs, &agents);
        let successes = pool.execute_batch(&batch, &mut store).unwrap();
        assert_eq!(successes, 0);
        assert_eq!(store.get_issue(&issue).unwrap().status, crate::state::IssueStatus::Failed);
    }

    #[test]
    fn nonzero_exit_fails_regardless_of_phase() {
        let vcs = FakeVcs::new();
        let agents = FakeAgentProcess::new();
        agents.push_response(FakeResponse { lines: vec![], exit_code: 1 });

        let (_dir, mut store) = fresh_store(1);
        let issue = IssueId::new("T-1");
        store.ensure_issue(&issue);
        let batch = Batch::new(crate::ids::BatchId::first(), vec![issue.clone()]);

        let mut pool = pool(&vcs, &agents);
        pool.execute_batch(&batch, &mut store).unwrap();
        assert_eq!(store.get_issue(&issue).unwrap().status, crate::state::IssueStatus::Failed);
    }

    #[test]
    fn changes_requested_respawns_implementer_and_tracks_iteration() {
        let vcs = FakeVcs::new();
        let agents = FakeAgentProcess::new();
        agents.push_response(FakeResponse { lines: vec!["READY_FOR_REVIEW".to_owned()], exit_code: 0 });
        agents.push_response(FakeResponse { lines: vec!["CHANGES_REQUESTED: add null check".to_owned()], exit_code: 0 });
        agents.push_response(FakeResponse { lines: vec!["READY_FOR_REVIEW".to_owned()], exit_code: 0 });
        agents.push_response(FakeResponse { lines: vec!["APPROVED".to_owned()], exit_code: 0 });
        agents.push_response(FakeResponse { lines: vec!["MERGE_COMPLETE".to_owned()], exit_code: 0 });

        let (_dir, mut store) = fresh_store(1);
        let issue = IssueId::new("T-1");
        store.ensure_issue(&issue);
        let batch = Batch::new(crate::ids::BatchId::first(), vec![issue.clone()]);

        let mut pool = pool(&vcs, &agents);
        let successes = pool.execute_batch(&batch, &mut store).unwrap();
        assert_eq!(successes, 1);
    }

    #[test]
    fn exhausting_review_iterations_fails_the_issue() {
        let vcs = FakeVcs::new();
        let agents = FakeAgentProcess::new();
        agents.push_response(FakeResponse { lines: vec!["READY_FOR_REVIEW".to_owned()], exit_code: 0 });
        for _ in 0..MAX_REVIEW_ITERATIONS {
            agents.push_response(FakeResponse { lines: vec!["CHANGES_REQUESTED: again".to_owned()], exit_code: 0 });
            agents.push_response(FakeResponse { lines: vec!["READY_FOR_REVIEW".to_owned()], exit_code: 0 });
        }

        let (_dir, mut store) = fresh_store(1);
        let issue = IssueId::new("T-1");
        store.ensure_issue(&issue);
        let batch = Batch::new(crate::ids::BatchId::first(), vec![issue.clone()]);

        let mut pool = pool(&vcs, &agents);
        let successes = pool.execute_batch(&batch, &mut store).unwrap();
        assert_eq!(successes, 0);
        assert_eq!(store.get_issue(&issue).unwrap().status, crate::state::IssueStatus::Failed);
    }
}
