// src/protocol/wire.rs

//! Message framing.
//!
//! Each message is written as a 4-byte **little-endian** unsigned length
//! prefix followed by exactly that many bytes of bincode-serialized
//! payload. Frames larger than [`MAX_FRAME_LEN`] are rejected before any
//! allocation.
//!
//! Error mapping, from the reader's point of view:
//! - clean EOF before the first prefix byte → `ConnectionClosed`
//! - EOF or an IO error inside a prefix or payload → `FramingError`
//!   (truncated/corrupt frame)
//! - oversized length or undecodable payload → `FramingError`
//! - any write-side IO error → `WriteFailure`
//!
//! Both directions enforce [`MAX_FRAME_LEN`], so nothing this crate can
//! be configured to emit is ever rejected by its own decoder.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::{Result, WorkerError};

/// Maximum accepted payload length (68 MiB). A prefix above this is
/// treated as stream corruption, not as a request to allocate.
///
/// Sized so a response carrying a stderr capture at the largest accepted
/// `max_stderr_bytes` (see [`crate::config`]) still fits with
/// [`FRAME_HEADROOM`] to spare; config validation rejects stderr caps
/// that would not.
pub const MAX_FRAME_LEN: u32 = 68 * 1024 * 1024;

/// Headroom reserved within a frame for everything in a response besides
/// the stderr capture itself: the exit code, the encoded string length,
/// and the truncation/timeout markers the executor may append.
pub const FRAME_HEADROOM: usize = 4096;

/// Read one framed message.
///
/// Cancel-safety is not required here: the serve loop is strictly
/// sequential and never races this read against another consumer.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = read_len_prefix(reader).await?;

    if len > MAX_FRAME_LEN {
        return Err(WorkerError::FramingError(format!(
            "frame length {len} exceeds maximum {MAX_FRAME_LEN}"
        )));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await.map_err(|e| {
        WorkerError::FramingError(format!("truncated payload (expected {len} bytes): {e}"))
    })?;

    bincode::deserialize(&payload)
        .map_err(|e| WorkerError::FramingError(format!("undecodable payload: {e}")))
}

/// Write one framed message and flush it.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = bincode::serialize(message)
        .map_err(|e| WorkerError::FramingError(format!("unencodable message: {e}")))?;

    // Same cap as the read side: never emit a frame our own decoder
    // would reject.
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_LEN)
        .ok_or_else(|| {
            WorkerError::FramingError(format!(
                "message of {} bytes exceeds maximum frame length {MAX_FRAME_LEN}",
                payload.len()
            ))
        })?;

    writer
        .write_all(&len.to_le_bytes())
        .await
        .map_err(WorkerError::WriteFailure)?;
    writer
        .write_all(&payload)
        .await
        .map_err(WorkerError::WriteFailure)?;
    writer.flush().await.map_err(WorkerError::WriteFailure)?;

    Ok(())
}

/// Read the 4-byte length prefix, distinguishing a clean close (EOF before
/// the first byte) from a truncated prefix.
async fn read_len_prefix<R>(reader: &mut R) -> Result<u32>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4];
    let mut filled = 0;

    while filled < buf.len() {
        // A mid-stream IO error (e.g. connection reset) is fatal for the
        // connection, same as a truncated prefix.
        let n = reader
            .read(&mut buf[filled..])
            .await
            .map_err(|e| WorkerError::FramingError(format!("prefix read failed: {e}")))?;
        if n == 0 {
            if filled == 0 {
                return Err(WorkerError::ConnectionClosed);
            }
            return Err(WorkerError::FramingError(format!(
                "connection closed after {filled} of 4 prefix bytes"
            )));
        }
        filled += n;
    }

    Ok(u32::from_le_bytes(buf))
}
