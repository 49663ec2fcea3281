//! Telemetry initialization and the colorized line logger described for the
//! CLI's user-visible output.
//!
//! Structured logging goes through `tracing`; initialization is controlled
//! by `NOFACE_LOG` (falling back to `RUST_LOG`) so the orchestrator can run
//! quietly by default and verbosely under `agents.verbose` or an explicit
//! env override.

use tracing_subscriber::EnvFilter;

/// Initialize the global `tracing` subscriber.
///
/// Safe to call once per process; a second call is a no-op (the underlying
/// `tracing_subscriber::fmt().try_init()` simply returns an error that we
/// discard).
pub fn init(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("NOFACE_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Severity tag used for the human-facing line renderer (spec.md §7:
/// `[INFO]`/`[SUCCESS]`/`[WARN]`/`[ERROR]`/`[VERBOSE]`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warn,
    Error,
    Verbose,
}

impl Severity {
    #[must_use]
    pub fn tag(self) -> colored::ColoredString {
        use colored::Colorize;
        match self {
            Self::Info => "[INFO]".blue(),
            Self::Success => "[SUCCESS]".green(),
            Self::Warn => "[WARN]".yellow(),
            Self::Error => "[ERROR]".red(),
            Self::Verbose => "[VERBOSE]".dimmed(),
        }
    }
}

/// Render a line-oriented, colored log message the way the CLI prints
/// progress to the terminal (distinct from the structured `tracing` log).
#[must_use]
pub fn line(severity: Severity, message: &str) -> String {
    format!("{} {message}", severity.tag())
}

/// A small fixed palette used to colorize per-worker output so interleaved
/// streams from several concurrent child processes stay distinguishable.
const WORKER_PALETTE_LEN: usize = 6;

/// Colorize a line of worker output by worker index, cycling through a
/// fixed palette of six colors.
#[must_use]
pub fn colorize_worker_line(worker_index: usize, line: &str) -> String {
    use colored::Colorize;
    let prefix = format!("[w{worker_index}]");
    let colored_prefix = match worker_index % WORKER_PALETTE_LEN {
        0 => prefix.cyan(),
        1 => prefix.magenta(),
        2 => prefix.yellow(),
        3 => prefix.green(),
        4 => prefix.blue(),
        _ => prefix.red(),
    };
    format!("{colored_prefix} {line}")
}
