// src/exec/mod.rs

//! Process execution layer.
//!
//! This module runs one external process per [`engine::execute`] call and
//! relays its three standard streams concurrently while enforcing
//! activity-, wait- and drain-based timeouts.
//!
//! - [`clock`] is the resettable idle timer shared by the relays.
//! - [`session`] wraps the spawned `tokio::process::Child`.
//! - [`relay`] owns the per-stream pump loops.
//! - [`engine`] orchestrates session + relays + clock into one bounded
//!   operation, optionally under a lock.

pub mod clock;
pub mod engine;
pub mod relay;
pub mod session;

pub use clock::ActivityClock;
pub use engine::{
    execute, execute_under_lock, ExecOutcome, ExecRequest, DEFAULT_DRAIN_TIMEOUT,
    DEFAULT_WAIT_TIMEOUT,
};
pub use session::ProcessSession;
