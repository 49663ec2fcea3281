use std::path::PathBuf;
use std::process::Command;

use anyhow::Result;
use clap::{Parser, Subcommand};

use noface::config::Config;
use noface::ids::IssueId;
use noface::orchestrator::{OrchestratorLoop, RunOptions};
use noface::state::store::StateStore;
use noface::tracker::bd::BdTracker;
use noface::vcs::jj::JjBackend;
use noface::agent::ClaudeAgent;

mod doctor;
mod status;

/// Autonomous code-change orchestrator
///
/// noface drives one or more coding agents against a project's issue
/// backlog: it picks the next ready issue, hands it to an implementer
/// agent inside an isolated `jj` workspace, verifies the change against
/// a planner-authored manifest, and retries or escalates to a breakdown
/// pass on failure.
///
/// QUICK START:
///
///   noface doctor
///   noface run
///
/// Configure the project in `noface.conf` at the repository root:
///
///   [project]
///   name = "my-project"
///   build = "cargo build"
///
///   [agents]
///   implementer = "claude"
///   reviewer = "claude"
#[derive(Parser)]
#[command(name = "noface")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the config file (default: noface.conf in the current directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding orchestrator state (default: .noface in the current directory)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check system requirements and configuration
    Doctor,

    /// Run the orchestrator loop
    Run {
        /// Stop after this many iterations
        #[arg(long)]
        max_iterations: Option<u64>,

        /// Work a single issue, then stop
        #[arg(long)]
        issue: Option<String>,
    },

    /// Brief state summary: issue counts, worker slots, pending batches
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(|| PathBuf::from("noface.conf"));
    let config = Config::load(&config_path).map_err(|err| {
        anyhow::anyhow!(
            "failed to load config from {}: {}",
            config_path.display(),
            err.message
        )
    })?;
    noface::telemetry::init(config.agents.verbose);

    let state_dir = cli.state_dir.unwrap_or_else(|| PathBuf::from(".noface"));

    match cli.command {
        Commands::Doctor => doctor::run(&config),
        Commands::Status => status::run(&state_dir, &config),
        Commands::Run {
            max_iterations,
            issue,
        } => run(&state_dir, config, max_iterations, issue),
    }
}

fn run(
    state_dir: &std::path::Path,
    config: Config,
    max_iterations: Option<u64>,
    issue: Option<String>,
) -> Result<()> {
    let repo_root = std::env::current_dir()?;
    let vcs = JjBackend::new(repo_root.clone(), state_dir.join("workspaces"));
    let tracker = BdTracker::new(repo_root);
    let agent_process = ClaudeAgent;

    let mut orchestrator = OrchestratorLoop::new(&vcs, &agent_process, &tracker, config);
    let options = RunOptions {
        max_iterations,
        single_issue: issue.map(IssueId::new),
    };
    let reason = orchestrator.run(state_dir, options)?;
    println!("stopped: {reason:?}");
    Ok(())
}

/// Probe whether `program --version` resolves, used by `doctor`.
fn probe(program: &str) -> Option<String> {
    let output = Command::new(program).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let version = String::from_utf8_lossy(&output.stdout);
    Some(version.lines().next().unwrap_or("unknown").trim().to_owned())
}

pub(crate) fn check_tool(name: &str, required: bool) -> bool {
    match probe(name) {
        Some(version) => {
            println!("[OK] {name} ({}): {version}", label(required));
            true
        }
        None => {
            let label = label(required);
            println!("[{}] {name} ({label}): not found", if required { "FAIL" } else { "SKIP" });
            !required
        }
    }
}

fn label(required: bool) -> &'static str {
    if required {
        "required"
    } else {
        "optional"
    }
}
