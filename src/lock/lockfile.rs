// src/lock/lockfile.rs

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::errors::{AgentError, Result};

/// How often a blocked acquirer re-attempts the exclusive create.
pub const DEFAULT_LOCK_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A named, file-backed, advisory mutual-exclusion handle.
///
/// The marker file under the lock directory is the shared state: its atomic
/// exclusive creation (`O_CREAT|O_EXCL`) is the ownership event, and its
/// deletion is the release. Cooperating code must always go through
/// `acquire`/`LockGuard`, never touch the guarded resource directly.
///
/// The handle itself is the logical owner for reentrancy purposes: clones
/// share a depth counter, so a caller that already holds the lock can
/// acquire it again without deadlocking, and the marker is only removed
/// when the depth returns to zero. Two *separate* handles for the same
/// path contend like two processes would.
#[derive(Debug, Clone)]
pub struct LockFile {
    inner: Arc<LockInner>,
}

#[derive(Debug)]
struct LockInner {
    name: String,
    path: PathBuf,
    poll_interval: Duration,
    /// Nested-acquisition depth for this logical owner. Guarded by a mutex
    /// so the check-then-create step is atomic within the process.
    depth: Mutex<u32>,
}

impl LockFile {
    /// A handle for lock `name` under `dir`. Creates the lock directory if
    /// needed; does not acquire anything.
    pub fn new(dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        Self::with_poll_interval(dir, name, DEFAULT_LOCK_POLL_INTERVAL)
    }

    /// Like [`LockFile::new`] with an explicit poll interval for blocked
    /// acquirers.
    pub fn with_poll_interval(
        dir: impl AsRef<Path>,
        name: &str,
        poll_interval: Duration,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self {
            inner: Arc::new(LockInner {
                name: name.to_string(),
                path: dir.join(format!("{name}.lock")),
                poll_interval,
                depth: Mutex::new(0),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// One acquisition attempt, without waiting.
    ///
    /// Returns `true` if the lock is now held by this handle (either the
    /// marker was created, or this handle already held it and the depth was
    /// bumped); `false` if another owner holds the marker.
    pub fn try_acquire(&self) -> Result<bool> {
        let mut depth = self.lock_depth();
        if *depth > 0 {
            *depth += 1;
            debug!(lock = %self.inner.name, depth = *depth, "reentrant acquisition");
            return Ok(true);
        }

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.inner.path)
        {
            Ok(mut marker) => {
                // Diagnostic content only; never interpreted for takeover.
                if let Err(e) = write_marker(&mut marker, &self.inner.name) {
                    warn!(lock = %self.inner.name, error = %e, "failed to write lock marker content");
                }
                *depth = 1;
                debug!(lock = %self.inner.name, "lock acquired");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Acquire the lock, polling until success or `timeout`. Never blocks
    /// forever: once the timeout elapses this fails with
    /// [`AgentError::LockNotAcquired`], distinguishable from any failure of
    /// guarded work.
    pub async fn acquire(&self, timeout: Duration) -> Result<LockGuard> {
        let start = Instant::now();
        loop {
            if self.try_acquire()? {
                return Ok(LockGuard {
                    inner: self.inner.clone(),
                });
            }
            let waited = start.elapsed();
            if waited >= timeout {
                return Err(AgentError::LockNotAcquired {
                    name: self.inner.name.clone(),
                    waited,
                });
            }
            sleep(self.inner.poll_interval).await;
        }
    }

    /// Acquire, run `action`, release — on every exit path. The future runs
    /// with the lock held; the guard drops (and releases) whether the
    /// action returns, errors, or unwinds.
    pub async fn lock_operation<T, F>(&self, timeout: Duration, action: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let _guard = self.acquire(timeout).await?;
        action.await
    }

    /// Whether the marker exists on disk, regardless of owner.
    pub fn is_held(&self) -> bool {
        self.inner.path.exists()
    }

    /// Whether this handle currently owns the lock.
    pub fn held_by_this_handle(&self) -> bool {
        *self.lock_depth() > 0
    }

    /// The marker's diagnostic content, or `None` if the lock is free.
    pub fn read_marker(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.inner.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn lock_depth(&self) -> std::sync::MutexGuard<'_, u32> {
        self.inner
            .depth
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// RAII ownership of an acquired lock.
///
/// Dropping the guard decrements the owner's depth and deletes the marker
/// when the depth reaches zero. Because release rides on `Drop`, it happens
/// on success, error and panic paths alike; long-lived holders (a whole
/// deploy) simply keep the guard until shutdown.
#[derive(Debug)]
pub struct LockGuard {
    inner: Arc<LockInner>,
}

impl LockGuard {
    /// Explicit release; equivalent to dropping the guard.
    pub fn release(self) {}
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let mut depth = self
            .inner
            .depth
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *depth = depth.saturating_sub(1);
        if *depth == 0 {
            match fs::remove_file(&self.inner.path) {
                Ok(()) => debug!(lock = %self.inner.name, "lock released"),
                Err(e) => warn!(
                    lock = %self.inner.name,
                    path = %self.inner.path.display(),
                    error = %e,
                    "failed to remove lock marker on release"
                ),
            }
        }
    }
}

/// Marker content: free-form diagnostic text recording owner identity. The
/// acquisition counter disambiguates rapid re-acquisitions by one process.
fn write_marker(marker: &mut fs::File, name: &str) -> std::io::Result<()> {
    static ACQUISITIONS: AtomicU32 = AtomicU32::new(0);
    let seq = ACQUISITIONS.fetch_add(1, Ordering::Relaxed);
    let acquired_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    writeln!(marker, "lock: {name}")?;
    writeln!(marker, "pid: {}", std::process::id())?;
    writeln!(marker, "acquired_at_unix: {acquired_at}")?;
    writeln!(marker, "acquisition_seq: {seq}")?;
    marker.sync_all()
}
