// src/protocol/message.rs

//! Protocol message types.

use serde::{Deserialize, Serialize};

/// One environment variable override carried on the wire.
///
/// Key and value are arbitrary byte strings; they are not required to be
/// valid UTF-8 and must round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// A single execute request: run this argument vector with these
/// environment overrides.
///
/// `argv[0]` is the program path or name (platform-dependent resolution).
/// `env` entries are applied in order; if a key repeats, the last entry
/// wins. Constructed per incoming request, dropped once the response is
/// written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteCommand {
    pub argv: Vec<Vec<u8>>,
    pub env: Vec<EnvEntry>,
}

impl ExecuteCommand {
    pub fn new(argv: Vec<Vec<u8>>, env: Vec<EnvEntry>) -> Self {
        Self { argv, env }
    }

    /// Convenience constructor for UTF-8 argv with no env overrides.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            argv: args
                .into_iter()
                .map(|s| s.as_ref().as_bytes().to_vec())
                .collect(),
            env: Vec::new(),
        }
    }
}

/// The outcome of one executed command.
///
/// `exit_code` follows the usual convention (0 success, nonzero failure);
/// signal-terminated children and server-side failures map to the sentinel
/// codes documented in [`crate::exec`]. `stderr` is the child's captured
/// standard-error stream, lossily decoded as UTF-8 — invalid sequences are
/// replaced, never a hard failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub exit_code: i32,
    pub stderr: String,
}
