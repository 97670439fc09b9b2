// src/status.rs

//! Lock-guarded deployment status record.
//!
//! A representative lock consumer: the web front end reports status, the
//! git hook and the console deployer update it, so every read and write
//! goes through [`LockFile::lock_operation`] on a dedicated status lock.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::Result;
use crate::lock::LockFile;

/// Lifecycle state of the current deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentState {
    Pending,
    Building,
    Deploying,
    Success,
    Failed,
}

/// The persisted status record for one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStatus {
    /// Deployment identity (commit id or generated id).
    pub id: String,
    pub state: DeploymentState,
    /// Human-readable progress or failure detail.
    #[serde(default)]
    pub message: String,
    pub received_at_unix: u64,
    pub updated_at_unix: u64,
}

impl DeploymentStatus {
    pub fn new(id: impl Into<String>) -> Self {
        let now = unix_now();
        Self {
            id: id.into(),
            state: DeploymentState::Pending,
            message: String::new(),
            received_at_unix: now,
            updated_at_unix: now,
        }
    }
}

/// Reads and writes the status record under a lock.
#[derive(Debug, Clone)]
pub struct StatusStore {
    path: PathBuf,
    lock: LockFile,
    lock_timeout: Duration,
}

impl StatusStore {
    pub fn new(path: impl Into<PathBuf>, lock: LockFile, lock_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            lock,
            lock_timeout,
        }
    }

    /// Current record, or `None` if no deployment has been recorded yet.
    pub async fn read(&self) -> Result<Option<DeploymentStatus>> {
        let path = self.path.clone();
        self.lock
            .lock_operation(self.lock_timeout, async move {
                match fs::read_to_string(&path) {
                    Ok(contents) => Ok(Some(toml::from_str(&contents)?)),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
    }

    /// Replace the record.
    pub async fn write(&self, status: &DeploymentStatus) -> Result<()> {
        let path = self.path.clone();
        let status = status.clone();
        self.lock
            .lock_operation(self.lock_timeout, async move {
                write_record(&path, &status)
            })
            .await
    }

    /// Read-modify-write under a single acquisition. Returns the updated
    /// record, or `None` if there was nothing to update.
    pub async fn update<F>(&self, mutate: F) -> Result<Option<DeploymentStatus>>
    where
        F: FnOnce(&mut DeploymentStatus),
    {
        let path = self.path.clone();
        self.lock
            .lock_operation(self.lock_timeout, async move {
                let mut status: DeploymentStatus = match fs::read_to_string(&path) {
                    Ok(contents) => toml::from_str(&contents)?,
                    Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                    Err(e) => return Err(e.into()),
                };
                mutate(&mut status);
                status.updated_at_unix = unix_now();
                write_record(&path, &status)?;
                Ok(Some(status))
            })
            .await
    }
}

/// Persist via temp-file + rename so concurrent readers never observe a
/// partial record.
fn write_record(path: &PathBuf, status: &DeploymentStatus) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let serialized = toml::to_string_pretty(status)?;
    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, serialized)?;
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), id = %status.id, state = ?status.state, "status record written");
    Ok(())
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
