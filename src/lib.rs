// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod transport;

use anyhow::Result;
use tracing::info;

use crate::cli::CliArgs;
use crate::config::ServerConfig;
use crate::exec::Executor;
use crate::transport::Connection;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (TOML file + CLI overrides)
/// - the transport listener
/// - the command executor
/// - the sequential serve loop
pub async fn run(args: CliArgs) -> Result<()> {
    let file = match args.config {
        Some(ref path) => Some(config::load_from_path(path)?),
        None => None,
    };
    let cfg = ServerConfig::from_sources(file, &args)?;

    info!(
        transport = ?cfg.transport,
        timeout = ?cfg.exec_timeout,
        env_mode = ?cfg.env_mode,
        "starting worker"
    );

    let conn = Connection::establish(&cfg).await?;
    let executor = Executor::new(cfg);

    server::serve(conn, executor).await?;
    Ok(())
}
