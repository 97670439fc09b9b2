// src/lock/mod.rs

//! File-backed advisory locking shared by independent OS processes.
//!
//! The cooperating processes (web front end, git post-receive hook, console
//! deployer) are not spawned by a common parent, so the only primitive they
//! can all observe is the filesystem: a marker file whose atomic exclusive
//! creation establishes ownership. Presence = held; deletion = released.
//!
//! A lock whose owning process died is *not* reclaimed here; the marker's
//! diagnostic content (pid, acquisition time) exists so an operator or a
//! higher-level janitor can decide.

pub mod lockfile;

pub use lockfile::{LockFile, LockGuard, DEFAULT_LOCK_POLL_INTERVAL};
