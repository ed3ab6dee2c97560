// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{EnvMode, TransportKind};

/// Command-line arguments for `workhorse`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "workhorse",
    version,
    about = "Persistent worker: executes framed commands over one long-lived connection.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to an optional config file (TOML). CLI flags override it.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Connection endpoint to serve on.
    #[arg(long, value_enum, value_name = "KIND")]
    pub transport: Option<TransportKind>,

    /// Unix socket path (required with --transport unix).
    #[arg(long, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    /// Per-command execution limit in seconds; 0 disables the limit.
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// How request env entries combine with the server environment.
    #[arg(long, value_enum, value_name = "MODE")]
    pub env_mode: Option<EnvMode>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WORKHORSE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
