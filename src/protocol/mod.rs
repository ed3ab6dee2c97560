// src/protocol/mod.rs

//! Wire protocol: message shapes and framing.
//!
//! - [`message`] defines the two message types, `ExecuteCommand` and
//!   `ExecuteResponse`. Argument and environment strings are opaque byte
//!   sequences end to end; only the response's `stderr` is text.
//! - [`wire`] handles framing: a 4-byte little-endian length prefix
//!   followed by a bincode-serialized payload.

pub mod message;
pub mod wire;

pub use message::{EnvEntry, ExecuteCommand, ExecuteResponse};
pub use wire::{FRAME_HEADROOM, MAX_FRAME_LEN, read_frame, write_frame};
