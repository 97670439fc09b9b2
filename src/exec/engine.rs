// src/exec/engine.rs

//! Orchestrates session + relays + clock into a single bounded operation.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};

use crate::errors::{AgentError, Result};
use crate::exec::clock::ActivityClock;
use crate::exec::relay;
use crate::exec::session::ProcessSession;
use crate::lock::LockFile;

/// How often the watchdog samples the activity clock and the overall
/// deadline. Coarse relative to realistic idle thresholds (tens of seconds)
/// so the wait never busy-spins.
pub const WATCHDOG_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default overall wait for process termination.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Default post-exit grace for the output/error relays to reach
/// end-of-stream. Process exit does not guarantee the OS pipe buffers are
/// empty.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// One command to run: program, arguments, working directory, and the two
/// operation-level timeouts.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub wait_timeout: Duration,
    pub drain_timeout: Duration,
}

impl ExecRequest {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// A `sh -c <script>` request, the common case for hook and deploy
    /// scripts.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }
}

/// Result of a completed operation: the exit code, and the caller's sinks
/// handed back with all relayed bytes written.
#[derive(Debug)]
pub struct ExecOutcome<W, E> {
    pub exit_code: i32,
    pub stdout: W,
    pub stderr: E,
}

/// Why the termination wait ended.
enum WaitEnd {
    Exited(std::io::Result<ExitStatus>),
    IdleExpired,
    WaitExpired,
}

/// Run one external process to completion, relaying all three standard
/// streams concurrently.
///
/// - `input` of `None` closes the child's stdin immediately; input closing
///   and output draining are independent concurrent activities.
/// - Every successful transfer on any relay touches `clock`; a watchdog
///   polls it and aborts the operation on first observed expiry.
/// - Termination is awaited under `req.wait_timeout`; after exit the
///   output relays get `req.drain_timeout` to flush.
///
/// On any timeout the process is killed and the relay tasks are aborted,
/// which drops their OS-level stream handles. The sinks are consumed in
/// that case; on success they come back in the [`ExecOutcome`].
pub async fn execute<R, W, E>(
    req: &ExecRequest,
    input: Option<R>,
    stdout_sink: W,
    stderr_sink: E,
    clock: Arc<ActivityClock>,
) -> Result<ExecOutcome<W, E>>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
    E: AsyncWrite + Send + Unpin + 'static,
{
    let start = Instant::now();
    let mut session = ProcessSession::spawn(req)?;
    info!(program = %req.program, pid = session.id(), "process started");

    let stdin = session.take_stdin();
    let stdout = session.take_stdout();
    let stderr = session.take_stderr();

    let in_pump = tokio::spawn(relay::pump_input(input, stdin, clock.clone()));
    let mut out_pump = tokio::spawn(relay::pump_output(
        stdout,
        stdout_sink,
        clock.clone(),
        "stdout",
    ));
    let mut err_pump = tokio::spawn(relay::pump_output(
        stderr,
        stderr_sink,
        clock.clone(),
        "stderr",
    ));

    // Wait for termination while the watchdog samples the idle clock and
    // the overall deadline. `Child::wait` is cancel-safe, so the select
    // loop can recreate it each iteration.
    let mut watchdog = interval(WATCHDOG_POLL_INTERVAL);
    let wait_end = loop {
        tokio::select! {
            res = session.wait() => break WaitEnd::Exited(res),
            _ = watchdog.tick() => {
                if clock.is_expired() {
                    break WaitEnd::IdleExpired;
                }
                if start.elapsed() >= req.wait_timeout {
                    break WaitEnd::WaitExpired;
                }
            }
        }
    };

    match wait_end {
        WaitEnd::Exited(Ok(_)) => {}
        WaitEnd::Exited(Err(e)) => {
            abort_relays(&in_pump, &out_pump, &err_pump);
            return Err(e.into());
        }
        WaitEnd::IdleExpired => {
            let idle = clock.idle_for();
            warn!(
                program = %req.program,
                idle_ms = idle.as_millis() as u64,
                "no stream activity within idle threshold; aborting"
            );
            kill_and_abort(&mut session, &in_pump, &out_pump, &err_pump).await;
            return Err(AgentError::IdleTimeout {
                threshold: clock.threshold().unwrap_or_default(),
                idle,
            });
        }
        WaitEnd::WaitExpired => {
            warn!(
                program = %req.program,
                waited_ms = start.elapsed().as_millis() as u64,
                "process did not exit within overall wait timeout; aborting"
            );
            kill_and_abort(&mut session, &in_pump, &out_pump, &err_pump).await;
            return Err(AgentError::WaitTimeout {
                waited: start.elapsed(),
            });
        }
    };

    // `wait()` has recorded the status by this point.
    let exit_code = session.exit_code().unwrap_or(-1);
    debug!(exit_code, "process exited; draining relays");

    // The child is gone, so nothing can consume further input; stop the
    // stdin relay rather than waiting behind a quiet source.
    in_pump.abort();

    // Exit observed, but output bytes may still sit in the pipe buffers
    // (or a grandchild may hold the write end open). The drain deadline
    // covers only the output relays; polling through `&mut` keeps the
    // handles alive so a timed-out relay can still be aborted.
    let drained = timeout(req.drain_timeout, async {
        let out = (&mut out_pump).await;
        let err = (&mut err_pump).await;
        (out, err)
    })
    .await;

    let (out_res, err_res) = match drained {
        Ok(results) => results,
        Err(_) => {
            warn!(
                program = %req.program,
                limit_ms = req.drain_timeout.as_millis() as u64,
                "relays did not reach end-of-stream within drain timeout; aborting"
            );
            abort_relays(&in_pump, &out_pump, &err_pump);
            return Err(AgentError::DrainTimeout {
                limit: req.drain_timeout,
            });
        }
    };

    let stdout = relay_result(out_res, "stdout")?;
    let stderr = relay_result(err_res, "stderr")?;

    info!(program = %req.program, exit_code, "operation complete");

    Ok(ExecOutcome {
        exit_code,
        stdout,
        stderr,
    })
}

/// Run a command while holding the given lock; the lock is released on
/// every exit path, success or failure.
pub async fn execute_under_lock<R, W, E>(
    lock: &LockFile,
    lock_timeout: Duration,
    req: &ExecRequest,
    input: Option<R>,
    stdout_sink: W,
    stderr_sink: E,
    clock: Arc<ActivityClock>,
) -> Result<ExecOutcome<W, E>>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
    E: AsyncWrite + Send + Unpin + 'static,
{
    let _guard = lock.acquire(lock_timeout).await?;
    execute(req, input, stdout_sink, stderr_sink, clock).await
}

async fn kill_and_abort<A, B, C>(
    session: &mut ProcessSession,
    in_pump: &JoinHandle<A>,
    out_pump: &JoinHandle<B>,
    err_pump: &JoinHandle<C>,
) {
    if let Err(e) = session.kill().await {
        warn!(error = %e, "failed to kill timed-out process");
    }
    abort_relays(in_pump, out_pump, err_pump);
}

/// Abort the relay tasks, dropping their stream handles.
fn abort_relays<A, B, C>(
    in_pump: &JoinHandle<A>,
    out_pump: &JoinHandle<B>,
    err_pump: &JoinHandle<C>,
) {
    in_pump.abort();
    out_pump.abort();
    err_pump.abort();
}

fn relay_result<T>(
    res: std::result::Result<std::io::Result<T>, JoinError>,
    stream: &'static str,
) -> Result<T> {
    match res {
        Ok(Ok(sink)) => Ok(sink),
        Ok(Err(source)) => Err(AgentError::Relay { stream, source }),
        Err(e) => Err(AgentError::Other(anyhow::anyhow!(
            "{stream} relay task failed: {e}"
        ))),
    }
}
