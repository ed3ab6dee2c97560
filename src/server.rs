// src/server.rs

//! The serve loop: receive → execute → send, strictly sequential.
//!
//! One request is in flight at a time; the protocol has no request ids,
//! so pipelining is impossible by construction and responses can never be
//! attributed to the wrong request.
//!
//! Response-or-close policy: per-request failures are always answered
//! (the executor folds them into sentinel responses), so the only ways a
//! request goes unanswered are a connection-level failure or the peer
//! disappearing. In both cases the loop terminates and the external
//! supervisor decides whether to restart the worker. If the peer vanishes
//! mid-execution the child still runs to completion (or timeout) and is
//! reaped; only its response is discarded.

use tracing::{debug, error, info};

use crate::errors::{Result, WorkerError};
use crate::exec::Executor;
use crate::transport::Connection;

/// Serve one connection until it closes.
///
/// Returns `Ok(())` on graceful end-of-stream and the connection-level
/// error otherwise. Per-request failures never surface here.
pub async fn serve(mut conn: Connection, executor: Executor) -> Result<()> {
    info!("serving connection");
    let mut served: u64 = 0;

    loop {
        let command = match conn.receive_command().await {
            Ok(command) => command,
            Err(WorkerError::ConnectionClosed) => {
                info!(requests = served, "connection closed; shutting down");
                return Ok(());
            }
            Err(err) => {
                error!(error = %err, fatal = err.is_connection_fatal(), "receive failed");
                return Err(err);
            }
        };

        let response = executor.execute(&command).await;

        if let Err(err) = conn.send_response(&response).await {
            // The child (if any) has already terminated and been reaped by
            // the executor; the response is simply lost with the peer.
            error!(error = %err, exit_code = response.exit_code, "response write failed");
            return Err(err);
        }

        served += 1;
        debug!(requests = served, "response sent");
    }
}
