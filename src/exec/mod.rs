// src/exec/mod.rs

//! Command execution layer.
//!
//! [`executor`] spawns one child per request with
//! `tokio::process::Command`, drains its stderr concurrently, and maps
//! the outcome to an `ExecuteResponse`.
//!
//! The wire schema has no error or timeout field, so server-side failures
//! are reported through sentinel exit codes plus an explanatory `stderr`
//! message. The values follow shell/coreutils conventions:
//!
//! | code    | meaning                                             |
//! |---------|-----------------------------------------------------|
//! | 124     | execution exceeded the configured limit; child killed |
//! | 125     | invalid command (empty argv); nothing was spawned   |
//! | 127     | spawn failed (not found, permissions, resources)    |
//! | 128 + N | child terminated by signal N                        |
//! | -1      | termination status unknowable                       |
//!
//! A child's own exit code is passed through untouched, including values
//! that collide with the sentinels; callers that need to distinguish can
//! inspect the `workhorse:`-prefixed stderr lines.

pub mod executor;

pub use executor::Executor;

/// Child ran past the configured execution limit and was killed.
pub const EXIT_TIMEOUT: i32 = 124;
/// Request was rejected before any process was spawned.
pub const EXIT_INVALID_COMMAND: i32 = 125;
/// The child process could not be spawned.
pub const EXIT_SPAWN_FAILURE: i32 = 127;
/// Termination status could not be determined.
pub const EXIT_UNKNOWN: i32 = -1;
/// A child killed by signal N reports `SIGNAL_EXIT_BASE + N`.
pub const SIGNAL_EXIT_BASE: i32 = 128;
