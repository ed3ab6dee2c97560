// src/transport.rs

//! Transport listener: connection lifecycle and message framing.
//!
//! A [`Connection`] holds exclusive ownership of both ends of the single
//! duplex channel for its lifetime; no other component touches them. Two
//! endpoints are supported, selected by configuration:
//!
//! - `stdio`: the worker's own stdin/stdout pair. The supervisor that
//!   launched the worker owns the other end of the pipes.
//! - `unix`: a unix domain socket on which exactly one connection is
//!   accepted; the listener is dropped afterwards so no second client can
//!   queue behind it.
//!
//! Framing itself lives in [`crate::protocol::wire`].

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tracing::{debug, info};

use crate::config::{ServerConfig, TransportKind};
use crate::errors::{Result, WorkerError};
use crate::protocol::{ExecuteCommand, ExecuteResponse, read_frame, write_frame};

/// One established duplex connection, framed per the wire protocol.
pub struct Connection {
    reader: Box<dyn AsyncRead + Send + Unpin>,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

impl Connection {
    /// Acquire the configured endpoint and wait for the peer.
    ///
    /// Fails with `TransportUnavailable` if the endpoint cannot be
    /// acquired (e.g. the socket path is not bindable).
    pub async fn establish(cfg: &ServerConfig) -> Result<Self> {
        match cfg.transport {
            TransportKind::Stdio => {
                debug!("using stdio transport");
                Ok(Self::from_parts(tokio::io::stdin(), tokio::io::stdout()))
            }
            TransportKind::Unix => {
                // Validated during config loading.
                let path = cfg.socket_path.as_ref().ok_or_else(|| {
                    WorkerError::ConfigError("unix transport without socket path".to_string())
                })?;

                // A stale socket file from a previous run would make bind
                // fail with AddrInUse even though nobody is listening.
                if path.exists() {
                    std::fs::remove_file(path).map_err(|e| {
                        WorkerError::TransportUnavailable(format!(
                            "cannot remove stale socket {}: {e}",
                            path.display()
                        ))
                    })?;
                }

                let listener = UnixListener::bind(path).map_err(|e| {
                    WorkerError::TransportUnavailable(format!(
                        "cannot bind {}: {e}",
                        path.display()
                    ))
                })?;

                info!(socket = %path.display(), "waiting for connection");

                let (stream, _) = listener.accept().await.map_err(|e| {
                    WorkerError::TransportUnavailable(format!("accept failed: {e}"))
                })?;

                info!(socket = %path.display(), "connection accepted");

                let (read_half, write_half) = stream.into_split();
                Ok(Self::from_parts(read_half, write_half))
            }
        }
    }

    /// Build a connection from arbitrary read/write halves.
    ///
    /// Used by `establish` and by tests that serve over an in-memory
    /// duplex stream.
    pub fn from_parts<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// Block until one complete framed command is available.
    ///
    /// Returns `ConnectionClosed` on graceful end-of-stream and
    /// `FramingError` on a malformed prefix or truncated/corrupt payload;
    /// the latter is fatal for the connection and never retried.
    pub async fn receive_command(&mut self) -> Result<ExecuteCommand> {
        read_frame(&mut self.reader).await
    }

    /// Serialize and write one framed response.
    ///
    /// Fails with `WriteFailure` if the transport rejects the write
    /// (e.g. broken pipe); fatal for the connection.
    pub async fn send_response(&mut self, response: &ExecuteResponse) -> Result<()> {
        write_frame(&mut self.writer, response).await
    }
}
