// src/config.rs

//! Server configuration: optional TOML file merged with CLI overrides.
//!
//! Precedence, highest first:
//! 1. CLI flags
//! 2. values from the `--config` TOML file
//! 3. built-in defaults (stdio transport, no timeout, 64 MiB stderr cap,
//!    `inherit` env mode)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::Deserialize;

use crate::cli::CliArgs;
use crate::errors::{Result, WorkerError};
use crate::protocol::wire::{FRAME_HEADROOM, MAX_FRAME_LEN};

/// Which endpoint the listener binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// The worker's own stdin/stdout pair (the supervisor wires the pipes).
    Stdio,
    /// A unix domain socket; exactly one connection is accepted.
    Unix,
}

/// How request env entries combine with the server's own environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EnvMode {
    /// Overlay: the child inherits the server's environment, with request
    /// entries added on top (default).
    Inherit,
    /// Replacement: the child sees only the request's entries.
    Clear,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub transport: TransportKind,
    pub socket_path: Option<PathBuf>,
    /// Maximum wall-clock duration for one command; `None` disables the
    /// limit.
    pub exec_timeout: Option<Duration>,
    /// Cap on the in-memory stderr buffer per request; output beyond the
    /// cap is discarded and a truncation marker is appended.
    pub max_stderr_bytes: usize,
    pub env_mode: EnvMode,
}

pub const DEFAULT_MAX_STDERR_BYTES: usize = 64 * 1024 * 1024;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Stdio,
            socket_path: None,
            exec_timeout: None,
            max_stderr_bytes: DEFAULT_MAX_STDERR_BYTES,
            env_mode: EnvMode::Inherit,
        }
    }
}

/// Raw shape of the TOML config file. All fields optional; merging and
/// validation happen in [`ServerConfig::from_sources`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    pub transport: Option<TransportKind>,
    pub socket_path: Option<PathBuf>,
    /// 0 means "no timeout".
    pub timeout_secs: Option<u64>,
    pub max_stderr_bytes: Option<usize>,
    pub env_mode: Option<EnvMode>,
}

/// Read and deserialize a TOML config file. No semantic validation; use
/// [`ServerConfig::from_sources`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let raw: RawConfigFile = toml::from_str(&contents)?;
    Ok(raw)
}

impl ServerConfig {
    /// Merge defaults, file values, and CLI overrides, then validate.
    pub fn from_sources(file: Option<RawConfigFile>, args: &CliArgs) -> Result<Self> {
        let file = file.unwrap_or_default();
        let mut cfg = ServerConfig::default();

        if let Some(t) = file.transport {
            cfg.transport = t;
        }
        if let Some(p) = file.socket_path {
            cfg.socket_path = Some(p);
        }
        if let Some(secs) = file.timeout_secs {
            cfg.exec_timeout = timeout_from_secs(secs);
        }
        if let Some(n) = file.max_stderr_bytes {
            cfg.max_stderr_bytes = n;
        }
        if let Some(m) = file.env_mode {
            cfg.env_mode = m;
        }

        if let Some(t) = args.transport {
            cfg.transport = t;
        }
        if let Some(ref p) = args.socket {
            cfg.socket_path = Some(p.clone());
        }
        if let Some(secs) = args.timeout_secs {
            cfg.exec_timeout = timeout_from_secs(secs);
        }
        if let Some(m) = args.env_mode {
            cfg.env_mode = m;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.transport == TransportKind::Unix && self.socket_path.is_none() {
            return Err(WorkerError::ConfigError(
                "transport \"unix\" requires a socket path (--socket or socket_path)".to_string(),
            ));
        }
        if self.max_stderr_bytes == 0 {
            return Err(WorkerError::ConfigError(
                "max_stderr_bytes must be greater than zero".to_string(),
            ));
        }
        // A capture the wire layer cannot carry would make the server emit
        // responses its own decoder rejects.
        let frame_budget = MAX_FRAME_LEN as usize - FRAME_HEADROOM;
        if self.max_stderr_bytes > frame_budget {
            return Err(WorkerError::ConfigError(format!(
                "max_stderr_bytes {} exceeds the frame budget {frame_budget}",
                self.max_stderr_bytes
            )));
        }
        Ok(())
    }
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    if secs == 0 { None } else { Some(Duration::from_secs(secs)) }
}
