use std::path::Path;

use anyhow::Result;

use noface::config::Config;
use noface::state::store::StateStore;
use noface::state::IssueStatus;

/// Brief state summary: issue counts by status, worker slots, pending
/// batches. Doesn't touch the tracker or any agent — reads only the local
/// state snapshot, so it's safe to run while the orchestrator is active.
pub fn run(state_dir: &Path, config: &Config) -> Result<()> {
    let store = StateStore::load(state_dir, &config.project.name, config.agents.num_workers as usize)?;
    let state = store.state();

    println!("project: {}", state.project_name);
    println!("iterations: {}", state.total_iterations);
    println!(
        "completed: {}  failed: {}",
        state.successful_completions, state.failed_attempts
    );
    println!();

    let mut pending = 0;
    let mut assigned = 0;
    let mut running = 0;
    let mut completed = 0;
    let mut failed = 0;
    for issue in state.issues.values() {
        match issue.status {
            IssueStatus::Pending => pending += 1,
            IssueStatus::Assigned => assigned += 1,
            IssueStatus::Running => running += 1,
            IssueStatus::Completed => completed += 1,
            IssueStatus::Failed => failed += 1,
        }
    }
    println!("issues: {pending} pending, {assigned} assigned, {running} running, {completed} completed, {failed} failed");

    println!("workers:");
    for (idx, worker) in state.workers.iter().enumerate() {
        match &worker.current_issue {
            Some(issue) => println!("  [{idx}] {:?} — {issue}", worker.status),
            None => println!("  [{idx}] {:?}", worker.status),
        }
    }

    println!(
        "pending batches: {}{}",
        state.pending_batches.len(),
        if state.current_batch.is_some() { " (+1 in flight)" } else { "" }
    );
    println!("locks held: {}", if state.locks.is_empty() { "none" } else { "some" });

    Ok(())
}
