//! Child processes bound to a termination scope
//!
//! A cancelled scope stops its child with SIGTERM rather than SIGKILL, and a
//! failing child is reported back to the scope as a termination request.

use std::ffi::OsStr;
use std::future::Future;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{ExitStatus, Output, Stdio};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::lifecycle::{is_termination_scope, Scope};
use crate::termination::{Cause, EXIT_FAILURE};

/// Errors that can occur while running a child process
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to spawn {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("failed to wait for {program}: {source}")]
    Wait { program: String, source: io::Error },

    #[error("{program} exited unsuccessfully ({status})")]
    Exited { program: String, status: ExitStatus },

    #[error("{program} not started: scope cancelled")]
    Cancelled { program: String },
}

/// A `tokio::process::Command` wired into a termination scope
///
/// By default a failed child only terminates the scope when the scope was
/// already cancelled, i.e. when the failure is a consequence of shutdown.
/// [`Command::graceful_any_context`] reports failures unconditionally.
/// A child is never started on a scope that is already cancelled.
pub struct Command {
    inner: tokio::process::Command,
    program: String,
    scope: Scope,
    any_context: bool,
}

impl Command {
    pub fn new(scope: &Scope, program: impl AsRef<OsStr>) -> Self {
        let program = program.as_ref();
        Self {
            inner: tokio::process::Command::new(program),
            program: program.to_string_lossy().into_owned(),
            scope: scope.clone(),
            any_context: false,
        }
    }

    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.inner.arg(arg);
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.inner.args(args);
        self
    }

    pub fn env(&mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> &mut Self {
        self.inner.env(key, value);
        self
    }

    pub fn current_dir(&mut self, dir: impl AsRef<Path>) -> &mut Self {
        self.inner.current_dir(dir);
        self
    }

    /// Report child failures to the scope even when it was not cancelled
    pub fn graceful_any_context(&mut self, flag: bool) -> &mut Self {
        self.any_context = flag;
        self
    }

    /// Run the child to completion, inheriting stdio
    pub async fn status(&mut self) -> Result<ExitStatus, ExecError> {
        let result = match self.spawn() {
            Ok(mut child) => {
                let pid = child.id();
                self.wait_gracefully(pid, child.wait()).await
            }
            Err(e) => Err(e),
        };
        self.settle(result.as_ref().map(|status| *status));
        result
    }

    /// Run the child to completion, capturing stdout and stderr
    pub async fn output(&mut self) -> Result<Output, ExecError> {
        self.inner.stdout(Stdio::piped()).stderr(Stdio::piped());
        let result = match self.spawn() {
            Ok(child) => {
                let pid = child.id();
                self.wait_gracefully(pid, child.wait_with_output()).await
            }
            Err(e) => Err(e),
        };
        self.settle(result.as_ref().map(|output| output.status));
        result
    }

    fn spawn(&mut self) -> Result<tokio::process::Child, ExecError> {
        if self.scope.is_cancelled() {
            debug!(program = %self.program, "scope cancelled, not starting child");
            return Err(ExecError::Cancelled {
                program: self.program.clone(),
            });
        }
        let child = self.inner.spawn().map_err(|source| ExecError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        info!(program = %self.program, pid = ?child.id(), "child process started");
        Ok(child)
    }

    /// Await `wait`, sending SIGTERM to the child if the scope is cancelled first
    async fn wait_gracefully<T, F>(&self, pid: Option<u32>, wait: F) -> Result<T, ExecError>
    where
        F: Future<Output = io::Result<T>>,
    {
        tokio::pin!(wait);

        let result = tokio::select! {
            biased;
            result = &mut wait => result,
            _ = self.scope.cancelled() => {
                if let Some(pid) = pid {
                    send_sigterm(&self.program, pid);
                }
                wait.await
            }
        };

        result.map_err(|source| ExecError::Wait {
            program: self.program.clone(),
            source,
        })
    }

    /// Feed the child's outcome into the scope
    fn settle(&self, outcome: Result<ExitStatus, &ExecError>) {
        if !self.any_context && !self.scope.is_cancelled() {
            return;
        }
        if !is_termination_scope(&self.scope) {
            debug!(program = %self.program, "scope has no termination state, not reporting");
            return;
        }

        match outcome {
            Ok(status) if status.success() => {}
            // Never ran; the scope's outcome is already decided
            Err(ExecError::Cancelled { .. }) => {}
            Ok(status) => {
                let exit_code = exit_code(status);
                info!(program = %self.program, exit_code, "child process failed");
                let cause = anyhow::Error::new(ExecError::Exited {
                    program: self.program.clone(),
                    status,
                });
                self.scope.terminate(cause, exit_code);
            }
            Err(e) => {
                warn!(program = %self.program, error = %e, "child process error");
                self.scope.terminate(Cause::msg(e.to_string()), EXIT_FAILURE);
            }
        }
    }
}

/// Exit code of a finished child; signal deaths map to `128 + signo`
pub fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signo)) => 128 + signo,
        (None, None) => EXIT_FAILURE,
    }
}

fn send_sigterm(program: &str, pid: u32) {
    debug!(program, pid, "scope cancelled, sending SIGTERM to child");
    let Ok(raw) = i32::try_from(pid) else {
        warn!(program, pid, "child pid out of range");
        return;
    };
    if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        // ESRCH: the child already exited
        debug!(program, pid, ?e, "failed to signal child");
    }
}
