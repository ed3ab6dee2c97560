// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Two failure classes exist and never mix:
//!
//! - **Connection-level**: `TransportUnavailable`, `FramingError` and
//!   `WriteFailure` terminate the serve loop; the external supervisor
//!   decides whether to restart the worker. `ConnectionClosed` is the
//!   graceful variant and is not treated as a failure.
//! - **Per-request**: `InvalidCommand`, `SpawnFailure` and timeouts never
//!   reach the serve loop as errors; the executor folds them into an
//!   `ExecuteResponse` with a sentinel exit code (see [`crate::exec`]).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Peer closed the connection at a frame boundary. Graceful shutdown
    /// signal, not a failure.
    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("framing error: {0}")]
    FramingError(String),

    #[error("write failure: {0}")]
    WriteFailure(#[source] std::io::Error),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("spawn failure: {0}")]
    SpawnFailure(#[source] std::io::Error),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WorkerError {
    /// Whether this error ends the connection, as opposed to being folded
    /// into a per-request sentinel response.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            WorkerError::TransportUnavailable(_)
                | WorkerError::FramingError(_)
                | WorkerError::WriteFailure(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WorkerError>;
