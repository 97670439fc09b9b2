// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::AgentError;

/// Top-level settings as read from a TOML file.
///
/// ```toml
/// [exec]
/// wait_timeout = "1h"
/// drain_timeout = "10s"
/// idle_timeout = "60s"
///
/// [lock]
/// dir = ".siteagent/locks"
/// acquire_timeout = "30s"
/// poll_interval = "250ms"
///
/// [status]
/// path = ".siteagent/status.toml"
/// ```
///
/// All sections are optional and have reasonable defaults. Durations are
/// strings in the `"250ms"` / `"30s"` / `"5m"` / `"1h"` form; they are
/// parsed when converting into [`Settings`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSettings {
    /// `[exec]` section: engine timeouts.
    #[serde(default)]
    pub exec: RawExecSection,

    /// `[lock]` section: lock directory and wait behaviour.
    #[serde(default)]
    pub lock: RawLockSection,

    /// `[status]` section: where the deployment status record lives.
    #[serde(default)]
    pub status: RawStatusSection,
}

/// `[exec]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawExecSection {
    /// Overall limit on how long a process may run.
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout: String,

    /// Grace period for stdout/stderr to reach end-of-stream after exit.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout: String,

    /// Maximum gap between successive stream activities; absent = unbounded.
    #[serde(default)]
    pub idle_timeout: Option<String>,
}

fn default_wait_timeout() -> String {
    "1h".to_string()
}

fn default_drain_timeout() -> String {
    "10s".to_string()
}

impl Default for RawExecSection {
    fn default() -> Self {
        Self {
            wait_timeout: default_wait_timeout(),
            drain_timeout: default_drain_timeout(),
            idle_timeout: None,
        }
    }
}

/// `[lock]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLockSection {
    /// Directory holding the lock marker files.
    #[serde(default = "default_lock_dir")]
    pub dir: PathBuf,

    /// Default bounded wait for lock acquisition.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout: String,

    /// How often a blocked acquirer re-attempts the exclusive create.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

fn default_lock_dir() -> PathBuf {
    PathBuf::from(".siteagent/locks")
}

fn default_acquire_timeout() -> String {
    "30s".to_string()
}

fn default_poll_interval() -> String {
    "250ms".to_string()
}

impl Default for RawLockSection {
    fn default() -> Self {
        Self {
            dir: default_lock_dir(),
            acquire_timeout: default_acquire_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

/// `[status]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStatusSection {
    /// Path of the persisted deployment status record.
    #[serde(default = "default_status_path")]
    pub path: PathBuf,
}

fn default_status_path() -> PathBuf {
    PathBuf::from(".siteagent/status.toml")
}

impl Default for RawStatusSection {
    fn default() -> Self {
        Self {
            path: default_status_path(),
        }
    }
}

/// Validated settings with all durations parsed.
#[derive(Debug, Clone)]
pub struct Settings {
    pub exec: ExecSettings,
    pub lock: LockSettings,
    pub status: StatusSettings,
}

#[derive(Debug, Clone)]
pub struct ExecSettings {
    pub wait_timeout: Duration,
    pub drain_timeout: Duration,
    /// `None` disables idle enforcement.
    pub idle_timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct LockSettings {
    pub dir: PathBuf,
    pub acquire_timeout: Duration,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct StatusSettings {
    pub path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            exec: ExecSettings {
                wait_timeout: Duration::from_secs(60 * 60),
                drain_timeout: Duration::from_secs(10),
                idle_timeout: None,
            },
            lock: LockSettings {
                dir: default_lock_dir(),
                acquire_timeout: Duration::from_secs(30),
                poll_interval: Duration::from_millis(250),
            },
            status: StatusSettings {
                path: default_status_path(),
            },
        }
    }
}

impl TryFrom<RawSettings> for Settings {
    type Error = AgentError;

    fn try_from(raw: RawSettings) -> Result<Self, Self::Error> {
        let wait_timeout = parse_field("exec.wait_timeout", &raw.exec.wait_timeout)?;
        let drain_timeout = parse_field("exec.drain_timeout", &raw.exec.drain_timeout)?;
        let idle_timeout = raw
            .exec
            .idle_timeout
            .as_deref()
            .map(|s| parse_field("exec.idle_timeout", s))
            .transpose()?;
        let acquire_timeout = parse_field("lock.acquire_timeout", &raw.lock.acquire_timeout)?;
        let poll_interval = parse_field("lock.poll_interval", &raw.lock.poll_interval)?;

        if poll_interval.is_zero() {
            return Err(AgentError::ConfigError(
                "lock.poll_interval must be greater than zero".to_string(),
            ));
        }

        Ok(Settings {
            exec: ExecSettings {
                wait_timeout,
                drain_timeout,
                idle_timeout,
            },
            lock: LockSettings {
                dir: raw.lock.dir,
                acquire_timeout,
                poll_interval,
            },
            status: StatusSettings {
                path: raw.status.path,
            },
        })
    }
}

fn parse_field(field: &str, value: &str) -> Result<Duration, AgentError> {
    parse_duration(value)
        .map_err(|e| AgentError::ConfigError(format!("{field}: {e}")))
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => checked_secs(value, 60, s),
        "h" => checked_secs(value, 60 * 60, s),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}

fn checked_secs(value: u64, factor: u64, original: &str) -> Result<Duration, String> {
    value
        .checked_mul(factor)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{original}' is too large"))
}
