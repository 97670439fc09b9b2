// src/errors.rs

//! Crate-wide error type and `Result` alias.
//!
//! The taxonomy keeps the three timeout conditions (overall wait, post-exit
//! drain, idle) and lock contention distinguishable, so callers can decide
//! whether to retry, report a conflict, or give up.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },

    #[error("process did not exit within {waited:?}")]
    WaitTimeout { waited: Duration },

    #[error("streams did not drain within {limit:?} after process exit")]
    DrainTimeout { limit: Duration },

    #[error("no stream activity for {idle:?} (idle threshold {threshold:?})")]
    IdleTimeout { threshold: Duration, idle: Duration },

    #[error("relay failure on {stream}: {source}")]
    Relay {
        stream: &'static str,
        source: std::io::Error,
    },

    #[error("lock '{name}' not acquired within {waited:?}")]
    LockNotAcquired { name: String, waited: Duration },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AgentError>;
