//! Outbound line-delimited JSON framing.

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Error type for writing framed JSON.
#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("Failed to serialize JSON: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to write line: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialize a value as compact JSON followed by a single newline.
///
/// # Errors
///
/// Returns `serde_json::Error` if the value cannot be serialized.
pub fn encode_line<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write one framed JSON value and flush the writer.
///
/// # Errors
///
/// Returns `FrameError` if serialization or the write fails.
pub async fn write_json_line<W, T>(writer: &mut W, value: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin + ?Sized,
    T: Serialize + ?Sized,
{
    let bytes = encode_line(value)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}
