use std::path::PathBuf;
use std::sync::Once;

use tempfile::TempDir;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// A throwaway site layout: a temp directory with a `locks/` subdirectory
/// and a status file path inside it.
pub struct TempSite {
    pub dir: TempDir,
}

impl TempSite {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp site dir"),
        }
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.dir.path().join("locks")
    }

    pub fn status_path(&self) -> PathBuf {
        self.dir.path().join("status.toml")
    }
}

impl Default for TempSite {
    fn default() -> Self {
        Self::new()
    }
}
