// src/exec/session.rs

//! Wrapper around one spawned external process.

use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::debug;

use crate::errors::{AgentError, Result};
use crate::exec::engine::ExecRequest;

/// One spawned process: its three standard stream handles, and its exit
/// status once termination has been observed.
///
/// Each stream handle can be taken at most once; the relay that takes it
/// owns it exclusively. The exit code is only meaningful after [`wait`]
/// has returned.
///
/// [`wait`]: ProcessSession::wait
#[derive(Debug)]
pub struct ProcessSession {
    child: Child,
    program: String,
    exit: Option<ExitStatus>,
}

impl ProcessSession {
    /// Launch the requested program with all three standard streams piped.
    ///
    /// Launch failures (executable not found, permission denied) surface
    /// immediately as [`AgentError::Launch`] carrying the program name.
    pub fn spawn(req: &ExecRequest) -> Result<Self> {
        let mut cmd = Command::new(&req.program);
        cmd.args(&req.args);
        if let Some(ref cwd) = req.cwd {
            cmd.current_dir(cwd);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| AgentError::Launch {
            program: req.program.clone(),
            source,
        })?;

        debug!(program = %req.program, pid = child.id(), "process spawned");

        Ok(Self {
            child,
            program: req.program.clone(),
            exit: None,
        })
    }

    /// OS process id, if the process has not been reaped yet.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Take the write side of the child's stdin. Returns `None` on the
    /// second call.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    /// Take the read side of the child's stdout. Returns `None` on the
    /// second call.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take the read side of the child's stderr. Returns `None` on the
    /// second call.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Wait for the process to terminate, recording its exit status.
    ///
    /// Cancel-safe: dropping the returned future does not lose the child.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        self.exit = Some(status);
        Ok(status)
    }

    /// Exit code, only available after termination has been observed.
    /// Signal deaths map to -1.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit.map(|status| status.code().unwrap_or(-1))
    }

    /// Forcibly terminate the process. Used by the engine on timeout abort.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        debug!(program = %self.program, "killing process");
        self.child.kill().await
    }
}
