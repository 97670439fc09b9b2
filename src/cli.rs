// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! NOTE: this expects `clap` to be built with the `derive` feature, e.g.:
//! `clap = { version = "4.5.53", features = ["derive"] }` in `Cargo.toml`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `siteagent`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "siteagent",
    version,
    about = "Run site operations under cross-process locks with bounded timeouts.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Siteagent.toml` in the current working directory. A missing
    /// file is not an error; built-in defaults apply.
    #[arg(long, value_name = "PATH", default_value_t = default_config_string())]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SITEAGENT_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: AgentCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum AgentCommand {
    /// Run a command under the execution engine, optionally under a named
    /// lock. Exits with the command's own exit code.
    Run {
        /// Name of the lock to hold for the duration of the run.
        #[arg(long, value_name = "NAME")]
        lock: Option<String>,

        /// Abort the run if no stream activity is seen for this long
        /// (e.g. "30s", "5m"). Unbounded when omitted and not configured.
        #[arg(long, value_name = "DURATION")]
        idle_timeout: Option<String>,

        /// Overall limit on how long the process may run (e.g. "1h").
        #[arg(long, value_name = "DURATION")]
        wait_timeout: Option<String>,

        /// Grace period for stdout/stderr to drain after process exit.
        #[arg(long, value_name = "DURATION")]
        drain_timeout: Option<String>,

        /// Working directory for the command.
        #[arg(long, value_name = "DIR")]
        cwd: Option<PathBuf>,

        /// Relay this process's stdin into the command. When omitted the
        /// command's stdin is closed immediately.
        #[arg(long)]
        forward_stdin: bool,

        /// The command and its arguments.
        #[arg(trailing_var_arg = true, required = true, value_name = "CMD")]
        command: Vec<String>,
    },

    /// Print the current deployment status record.
    Status,

    /// List lock markers and their diagnostic content.
    Locks,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

fn default_config_string() -> String {
    default_config_path().display().to_string()
}
