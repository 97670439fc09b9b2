// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{RawSettings, Settings};
use crate::errors::Result;

/// Load a settings file from a given path and return the raw `RawSettings`.
///
/// This only performs TOML deserialization; it does **not** parse duration
/// strings or check bounds. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSettings> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let raw: RawSettings = toml::from_str(&contents)?;

    Ok(raw)
}

/// Load a settings file from path and run validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Parses duration strings and checks basic sanity.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Settings> {
    let raw = load_from_path(&path)?;
    let settings = Settings::try_from(raw)?;
    Ok(settings)
}

/// Like [`load_and_validate`], but a missing file yields built-in defaults.
///
/// The cooperating processes (web front end, git hook, console deployer)
/// must all see the same defaults when no file is present, so defaults live
/// in one place (`Settings::default`).
pub fn load_or_default(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();
    if path.exists() {
        load_and_validate(path)
    } else {
        debug!(path = %path.display(), "no settings file; using defaults");
        Ok(Settings::default())
    }
}

/// Helper to resolve a default config path.
///
/// Currently this just returns `Siteagent.toml` in the current working
/// directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Siteagent.toml")
}
