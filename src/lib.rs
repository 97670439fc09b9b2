// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod lock;
pub mod logging;
pub mod status;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::cli::{AgentCommand, CliArgs};
use crate::config::model::Settings;
use crate::config::{load_or_default, parse_duration};
use crate::errors::{AgentError, Result};
use crate::exec::{execute, execute_under_lock, ActivityClock, ExecRequest};
use crate::lock::LockFile;
use crate::status::StatusStore;

/// Name of the lock guarding the deployment status record. Shared across
/// the cooperating processes, so it must not change between releases.
pub const STATUS_LOCK_NAME: &str = "status";

/// High-level entry point used by `main.rs`.
///
/// Returns the process exit code: for `run`, the relayed command's own
/// exit code; `0` for the informational subcommands.
pub async fn run(args: CliArgs) -> Result<i32> {
    let settings = load_or_default(&args.config)?;
    debug!(?settings, "settings resolved");

    match args.command {
        AgentCommand::Run {
            lock,
            idle_timeout,
            wait_timeout,
            drain_timeout,
            cwd,
            forward_stdin,
            command,
        } => {
            run_command(
                &settings,
                lock,
                idle_timeout,
                wait_timeout,
                drain_timeout,
                cwd,
                forward_stdin,
                command,
            )
            .await
        }
        AgentCommand::Status => show_status(&settings).await,
        AgentCommand::Locks => list_locks(&settings),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_command(
    settings: &Settings,
    lock: Option<String>,
    idle_timeout: Option<String>,
    wait_timeout: Option<String>,
    drain_timeout: Option<String>,
    cwd: Option<std::path::PathBuf>,
    forward_stdin: bool,
    command: Vec<String>,
) -> Result<i32> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| AgentError::ConfigError("no command given".to_string()))?;

    let req = ExecRequest {
        program: program.clone(),
        args: args.to_vec(),
        cwd,
        wait_timeout: resolve_duration(wait_timeout, settings.exec.wait_timeout)?,
        drain_timeout: resolve_duration(drain_timeout, settings.exec.drain_timeout)?,
    };

    let idle = match idle_timeout {
        Some(s) => Some(parse_duration(&s).map_err(AgentError::ConfigError)?),
        None => settings.exec.idle_timeout,
    };
    let clock = Arc::new(ActivityClock::new(idle));

    let input = if forward_stdin {
        Some(tokio::io::stdin())
    } else {
        None
    };
    let stdout_sink = tokio::io::stdout();
    let stderr_sink = tokio::io::stderr();

    let outcome = match lock {
        Some(ref name) => {
            let lock = LockFile::with_poll_interval(
                &settings.lock.dir,
                name,
                settings.lock.poll_interval,
            )?;
            info!(lock = %name, program = %req.program, "running under lock");
            execute_under_lock(
                &lock,
                settings.lock.acquire_timeout,
                &req,
                input,
                stdout_sink,
                stderr_sink,
                clock,
            )
            .await?
        }
        None => execute(&req, input, stdout_sink, stderr_sink, clock).await?,
    };

    Ok(outcome.exit_code)
}

async fn show_status(settings: &Settings) -> Result<i32> {
    let lock = LockFile::with_poll_interval(
        &settings.lock.dir,
        STATUS_LOCK_NAME,
        settings.lock.poll_interval,
    )?;
    let store = StatusStore::new(
        settings.status.path.clone(),
        lock,
        settings.lock.acquire_timeout,
    );

    match store.read().await? {
        Some(status) => {
            println!("deployment: {}", status.id);
            println!("  state:      {:?}", status.state);
            if !status.message.is_empty() {
                println!("  message:    {}", status.message);
            }
            println!("  received:   {} (unix)", status.received_at_unix);
            println!("  updated:    {} (unix)", status.updated_at_unix);
        }
        None => println!("no deployment status recorded"),
    }
    Ok(0)
}

fn list_locks(settings: &Settings) -> Result<i32> {
    let dir = &settings.lock.dir;
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("no locks held (no lock directory at {})", dir.display());
            return Ok(0);
        }
        Err(e) => return Err(e.into()),
    };

    let mut found = false;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("lock") {
            continue;
        }
        found = true;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("<invalid>");
        println!("{name}:");
        match fs::read_to_string(&path) {
            Ok(content) => {
                for line in content.lines() {
                    println!("  {line}");
                }
            }
            // Raced with a release; the marker is simply gone.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                println!("  (released while listing)");
            }
            Err(e) => return Err(e.into()),
        }
    }
    if !found {
        println!("no locks held");
    }
    Ok(0)
}

fn resolve_duration(override_str: Option<String>, fallback: Duration) -> Result<Duration> {
    match override_str {
        Some(s) => parse_duration(&s).map_err(AgentError::ConfigError),
        None => Ok(fallback),
    }
}
