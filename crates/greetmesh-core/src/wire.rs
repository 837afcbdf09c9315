//! Greeting wire format.
//!
//! Frame: [u32 big-endian payload length][UTF-8 JSON payload].
//! One request type carries the caller's name; one reply type carries a
//! human-readable greeting. There is no versioning and no error payload;
//! failures are signalled by closing the connection.

use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum payload size of a single frame.
pub const MAX_FRAME_SIZE: u32 = 64 * 1024;

/// Length prefix size in bytes.
pub const FRAME_HEADER_SIZE: usize = 4;

// ── Messages ──────────────────────────────────────────────────────────────────

/// Sent by the initiating node; carries its own name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetingRequest {
    pub name: String,
}

/// Returned by the responding node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetingReply {
    pub message: String,
}

impl GreetingReply {
    /// The fixed greeting template, with the responder's name embedded.
    pub fn from_responder(name: &str) -> Self {
        Self {
            message: format!("Hello from {name}"),
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {0} bytes exceeds the {max} byte limit", max = MAX_FRAME_SIZE)]
    FrameTooLarge(usize),
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("connection closed before a frame arrived")]
    Closed,
}

// ── Framing ───────────────────────────────────────────────────────────────────

/// Serialize a message into a complete length-prefixed frame.
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Bytes, WireError> {
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_FRAME_SIZE as usize {
        return Err(WireError::FrameTooLarge(payload.len()));
    }
    let mut frame = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.put_u32(payload.len() as u32);
    frame.put_slice(&payload);
    Ok(frame.freeze())
}

/// Write one message as a frame and flush.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_frame(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame and decode it.
///
/// Returns `Ok(None)` on a clean EOF before the length prefix, which is how
/// a peer ends a connection between exchanges.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, WireError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; FRAME_HEADER_SIZE];
    let first = reader.read(&mut len_buf).await?;
    if first == 0 {
        return Ok(None);
    }
    // A prefix cut short after its first byte is a truncated frame.
    reader.read_exact(&mut len_buf[first..]).await?;

    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge(len as usize));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(Some(serde_json::from_slice(&payload)?))
}
