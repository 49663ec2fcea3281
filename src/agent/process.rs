//! Real and fake [`SupervisedChild`]/[`super::AgentProcess`] implementations.
//!
//! Output is read on a dedicated thread per child and funneled through an
//! mpsc channel, so the dispatch loop's `poll_output`/`try_wait` pair never
//! blocks on a single child's pipe — the actual non-blocking primitive is
//! the channel, not the OS file descriptor.

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;

use crate::error::{OrchestratorError, Result};

use super::{AgentCommand, AgentProcess, AgentRole};

/// A running (or just-exited) agent child process, as seen by the worker
/// pool's dispatch loop.
pub trait SupervisedChild: Send {
    /// Drain any output lines produced since the last poll, without
    /// blocking. An empty vec means "nothing new", not "process is dead".
    fn poll_output(&mut self) -> Vec<String>;

    /// Non-blocking check for exit. `Some(code)` once the child has exited.
    fn try_wait(&mut self) -> Result<Option<i32>>;

    /// Forcibly terminate the child.
    fn kill(&mut self) -> Result<()>;
}

/// Spawns the real agent CLI named in [`AgentCommand::program`].
#[derive(Clone, Debug, Default)]
pub struct ClaudeAgent;

impl AgentProcess for ClaudeAgent {
    fn spawn(&self, cmd: &AgentCommand) -> Result<Box<dyn SupervisedChild>> {
        let mut command = Command::new(&cmd.program);
        match cmd.role {
            AgentRole::Reviewer => {
                command
                    .arg("exec")
                    .arg("--dangerously-bypass-approvals-and-sandbox")
                    .arg(&cmd.prompt);
            }
            AgentRole::Implementer
            | AgentRole::Planner
            | AgentRole::QualityReviewer
            | AgentRole::Breakdown => {
                command.arg("-p").arg(&cmd.prompt);
            }
        }
        // Every role is piped, including the reviewer. Genuine stdio
        // inheritance would leave the dispatch loop with no pipe to scan
        // for APPROVED/CHANGES_REQUESTED/MERGE_COMPLETE, which the phase
        // machine needs from every reviewer invocation. Capturing instead
        // of inheriting is the deliberate choice; see DESIGN.md.
        command
            .current_dir(&cmd.cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                OrchestratorError::MissingPrerequisite {
                    program: cmd.program.clone(),
                }
            } else {
                OrchestratorError::Io(err)
            }
        })?;

        let Some(stdout) = child.stdout.take() else {
            return Err(OrchestratorError::Io(std::io::Error::other(
                "spawned child has no stdout pipe",
            )));
        };
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Box::new(RealChild { child, rx }))
    }
}

struct RealChild {
    child: Child,
    rx: mpsc::Receiver<String>,
}

impl SupervisedChild for RealChild {
    fn poll_output(&mut self) -> Vec<String> {
        self.rx.try_iter().collect()
    }

    fn try_wait(&mut self) -> Result<Option<i32>> {
        match self.child.try_wait()? {
            Some(status) => Ok(Some(status.code().unwrap_or(super::exit_code::GENERIC_FAILURE))),
            None => Ok(None),
        }
    }

    fn kill(&mut self) -> Result<()> {
        match self.child.kill() {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Scripted [`AgentProcess`] for tests: each call to `spawn` pops the next
/// queued response.
#[derive(Debug, Default)]
pub struct FakeAgentProcess {
    responses: std::sync::Mutex<std::collections::VecDeque<FakeResponse>>,
}

/// One scripted response: the output lines to surface and the exit code to
/// report on the first `try_wait`.
#[derive(Clone, Debug)]
pub struct FakeResponse {
    pub lines: Vec<String>,
    pub exit_code: i32,
}

impl FakeAgentProcess {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: FakeResponse) {
        self.responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(response);
    }
}

impl AgentProcess for FakeAgentProcess {
    fn spawn(&self, _cmd: &AgentCommand) -> Result<Box<dyn SupervisedChild>> {
        let response = self
            .responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front()
            .unwrap_or(FakeResponse {
                lines: vec![],
                exit_code: super::exit_code::GENERIC_FAILURE,
            });
        Ok(Box::new(FakeChild {
            pending_lines: response.lines.into(),
            exit_code: response.exit_code,
            exited: false,
        }))
    }
}

struct FakeChild {
    pending_lines: std::collections::VecDeque<String>,
    exit_code: i32,
    exited: bool,
}

impl SupervisedChild for FakeChild {
    fn poll_output(&mut self) -> Vec<String> {
        self.pending_lines.drain(..).collect()
    }

    fn try_wait(&mut self) -> Result<Option<i32>> {
        if self.pending_lines.is_empty() {
            self.exited = true;
            return Ok(Some(self.exit_code));
        }
        Ok(None)
    }

    fn kill(&mut self) -> Result<()> {
        self.exited = true;
        self.pending_lines.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn cmd(role: AgentRole) -> AgentCommand {
        AgentCommand {
            role,
            program: "claude".to_owned(),
            prompt: "do the thing".to_owned(),
            cwd: PathBuf::from("."),
        }
    }

    #[test]
    fn fake_child_surfaces_lines_then_exit_code() {
        let process = FakeAgentProcess::new();
        process.push_response(FakeResponse {
            lines: vec!["working".to_owned(), "READY_FOR_REVIEW".to_owned()],
            exit_code: 0,
        });
        let mut child = process.spawn(&cmd(AgentRole::Implementer)).unwrap();

        assert!(child.try_wait().unwrap().is_none());
        let lines = child.poll_output();
        assert_eq!(lines, vec!["working", "READY_FOR_REVIEW"]);
        assert_eq!(child.try_wait().unwrap(), Some(0));
    }

    #[test]
    fn fake_process_defaults_to_generic_failure_when_unscripted() {
        let process = FakeAgentProcess::new();
        let mut child = process.spawn(&cmd(AgentRole::Reviewer)).unwrap();
        assert_eq!(child.try_wait().unwrap(), Some(super::super::exit_code::GENERIC_FAILURE));
    }

    #[test]
    fn kill_clears_pending_output() {
        let process = FakeAgentProcess::new();
        process.push_response(FakeResponse {
            lines: vec!["stuck".to_owned()],
            exit_code: 0,
        });
        let mut child = process.spawn(&cmd(AgentRole::Implementer)).unwrap();
        child.kill().unwrap();
        assert!(child.poll_output().is_empty());
    }
}
