// src/config/mod.rs

//! Configuration layer: TOML model + loader.
//!
//! - [`model`] holds the serde structs (`RawSettings`) and the validated
//!   [`model::Settings`] with parsed durations.
//! - [`loader`] reads and validates a settings file from disk.

pub mod loader;
pub mod model;

pub use loader::{default_config_path, load_and_validate, load_or_default};
pub use model::{parse_duration, ExecSettings, LockSettings, RawSettings, Settings, StatusSettings};
