// src/exec/executor.rs

//! Child process runner for a single execute request.

use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{EnvMode, ServerConfig};
use crate::errors::{Result, WorkerError};
use crate::protocol::{ExecuteCommand, ExecuteResponse};

use super::{EXIT_INVALID_COMMAND, EXIT_SPAWN_FAILURE, EXIT_TIMEOUT, EXIT_UNKNOWN, SIGNAL_EXIT_BASE};

/// How long to keep draining stderr after a timeout kill.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Executes decoded commands as child processes.
///
/// Holds no per-request state; one instance serves the whole connection.
pub struct Executor {
    config: ServerConfig,
}

impl Executor {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Execute one command and report the outcome.
    ///
    /// This never fails the RPC: per-request errors (empty argv, spawn
    /// failure, timeout) are folded into a response with a sentinel exit
    /// code and a `workhorse:`-prefixed stderr message, so the serve loop
    /// always has something to send back.
    pub async fn execute(&self, cmd: &ExecuteCommand) -> ExecuteResponse {
        match self.try_execute(cmd).await {
            Ok(resp) => resp,
            Err(WorkerError::InvalidCommand(msg)) => {
                warn!(%msg, "rejecting command");
                sentinel_response(EXIT_INVALID_COMMAND, &format!("invalid command: {msg}"))
            }
            Err(WorkerError::SpawnFailure(err)) => {
                warn!(error = %err, "spawn failed");
                sentinel_response(EXIT_SPAWN_FAILURE, &format!("spawn failed: {err}"))
            }
            Err(err) => {
                warn!(error = %err, "execution failed");
                sentinel_response(EXIT_UNKNOWN, &format!("execution failed: {err}"))
            }
        }
    }

    /// Execute one command, surfacing per-request failures as errors.
    ///
    /// `InvalidCommand` is returned before any process is spawned;
    /// `SpawnFailure` does not produce a partial response.
    pub async fn try_execute(&self, cmd: &ExecuteCommand) -> Result<ExecuteResponse> {
        if cmd.argv.is_empty() {
            return Err(WorkerError::InvalidCommand("empty argv".to_string()));
        }

        let program = os_string(&cmd.argv[0]);
        info!(
            program = %program.to_string_lossy(),
            args = cmd.argv.len() - 1,
            env_entries = cmd.env.len(),
            "executing command"
        );

        let mut child = self
            .build_command(cmd, program)
            .spawn()
            .map_err(WorkerError::SpawnFailure)?;

        // Both pipes must drain concurrently with the wait below; a child
        // flooding either one would otherwise fill the pipe buffer and
        // deadlock against us.
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("child stderr pipe missing"))?;
        let stderr_task = spawn_stderr_drain(stderr, self.config.max_stderr_bytes);
        spawn_stdout_logger(&mut child);

        let (exit_code, timed_out) = self.wait_with_timeout(&mut child).await?;

        // A killed child's grandchildren may still hold the stderr pipe
        // open; bound the drain wait so the timeout response itself is not
        // delayed indefinitely.
        let (mut captured, truncated_at) = if timed_out {
            match tokio::time::timeout(DRAIN_GRACE, stderr_task).await {
                Ok(drained) => drained.map_err(drain_task_error)?,
                Err(_elapsed) => {
                    warn!("stderr pipe still open after kill; discarding capture");
                    (String::new(), None)
                }
            }
        } else {
            stderr_task.await.map_err(drain_task_error)?
        };

        if let Some(total) = truncated_at {
            captured.push_str(&format!(
                "\nworkhorse: stderr truncated ({total} bytes produced, {} kept)",
                self.config.max_stderr_bytes
            ));
        }

        if timed_out {
            let limit = self.config.exec_timeout.unwrap_or_default();
            if !captured.is_empty() && !captured.ends_with('\n') {
                captured.push('\n');
            }
            captured.push_str(&format!(
                "workhorse: command timed out after {}s and was killed",
                limit.as_secs()
            ));
        }

        debug!(exit_code, timed_out, stderr_bytes = captured.len(), "command finished");

        Ok(ExecuteResponse {
            exit_code,
            stderr: captured,
        })
    }

    fn build_command(&self, cmd: &ExecuteCommand, program: OsString) -> Command {
        let mut command = Command::new(program);

        for arg in &cmd.argv[1..] {
            command.arg(os_string(arg));
        }

        if self.config.env_mode == EnvMode::Clear {
            command.env_clear();
        }
        // Entries are applied in wire order, so a duplicated key naturally
        // resolves to its last occurrence.
        for entry in &cmd.env {
            command.env(os_string(&entry.key), os_string(&entry.value));
        }

        // No pseudo-terminal, no stdin. Stdout is piped into our own
        // logging only; the protocol surfaces nothing but stderr.
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        command
    }

    /// Wait for the child, enforcing the configured execution limit.
    ///
    /// On timeout the child is killed and always reaped before returning,
    /// and the timeout sentinel is reported instead of an exit status.
    async fn wait_with_timeout(&self, child: &mut Child) -> Result<(i32, bool)> {
        let status = match self.config.exec_timeout {
            None => child.wait().await?,
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_elapsed) => {
                    warn!(limit_secs = limit.as_secs(), "execution limit reached; killing child");
                    // start_kill may race a child that exited at the
                    // deadline; wait() below reaps it either way.
                    let _ = child.start_kill();
                    let _ = child.wait().await?;
                    return Ok((EXIT_TIMEOUT, true));
                }
            },
        };

        let code = match status.code() {
            Some(code) => code,
            None => match status.signal() {
                Some(sig) => SIGNAL_EXIT_BASE + sig,
                None => EXIT_UNKNOWN,
            },
        };

        Ok((code, false))
    }
}

fn drain_task_error(e: tokio::task::JoinError) -> WorkerError {
    WorkerError::Other(anyhow::anyhow!("stderr drain task failed: {e}"))
}

fn os_string(bytes: &[u8]) -> OsString {
    OsString::from_vec(bytes.to_vec())
}

fn sentinel_response(exit_code: i32, message: &str) -> ExecuteResponse {
    ExecuteResponse {
        exit_code,
        stderr: format!("workhorse: {message}"),
    }
}

/// Drain the child's stderr to completion on its own task.
///
/// Returns the lossily decoded capture plus, when the cap was hit, the
/// total number of bytes the child produced.
fn spawn_stderr_drain(
    mut stderr: ChildStderr,
    max_bytes: usize,
) -> JoinHandle<(String, Option<u64>)> {
    tokio::spawn(async move {
        let mut captured: Vec<u8> = Vec::new();
        let mut total: u64 = 0;
        let mut buf = [0u8; 8192];

        loop {
            match stderr.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    total += n as u64;
                    let room = max_bytes.saturating_sub(captured.len());
                    if room > 0 {
                        captured.extend_from_slice(&buf[..n.min(room)]);
                    }
                }
                Err(e) => {
                    debug!(error = %e, "stderr pipe read ended");
                    break;
                }
            }
        }

        let truncated_at = (total > max_bytes as u64).then_some(total);
        (String::from_utf8_lossy(&captured).into_owned(), truncated_at)
    })
}

/// Forward the child's stdout into our own debug logging.
///
/// Deliberate asymmetry with stderr: stdout never reaches the response,
/// but the pipe still has to be consumed so the child cannot block on it.
fn spawn_stdout_logger(child: &mut Child) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => debug!("stdout: {}", line),
                    Ok(None) => break,
                    Err(_) => {
                        // Non-UTF-8 output cannot be logged line-wise, but
                        // the pipe must still be consumed or the child
                        // blocks on a full buffer.
                        let mut rest = lines.into_inner();
                        let _ = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await;
                        break;
                    }
                }
            }
        });
    }
}
