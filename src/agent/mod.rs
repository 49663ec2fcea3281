//! The agent-process boundary: spawning implementation/review/planner
//! agents and supervising their output without the rest of the
//! orchestrator caring whether it's a real subprocess or a scripted fake.

pub mod exit_code;
pub mod marker;
pub mod process;

use std::path::PathBuf;

use crate::error::Result;

pub use marker::{implementer_output_text, Marker};
pub use process::{ClaudeAgent, FakeAgentProcess, SupervisedChild};

/// Which role an agent process is fulfilling. Determines the CLI
/// invocation shape (`-p <prompt>` vs. `exec --dangerously-bypass-approvals-and-sandbox`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentRole {
    Implementer,
    Reviewer,
    Planner,
    QualityReviewer,
    Breakdown,
}

/// Everything needed to spawn one agent invocation.
#[derive(Clone, Debug)]
pub struct AgentCommand {
    pub role: AgentRole,
    pub program: String,
    pub prompt: String,
    pub cwd: PathBuf,
}

/// Spawns an [`AgentCommand`] and returns a handle to the running child.
pub trait AgentProcess {
    fn spawn(&self, cmd: &AgentCommand) -> Result<Box<dyn SupervisedChild>>;
}
