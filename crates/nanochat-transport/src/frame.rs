//! Length-prefixed text frames.
//!
//! Every frame on a chat stream is a big-endian `u16` byte count followed
//! by that many bytes of UTF-8:
//!
//! ```text
//! +--------+--------+----------------------+
//! | len hi | len lo |  UTF-8 payload ...   |
//! +--------+--------+----------------------+
//! ```
//!
//! A stream that ends exactly on a frame boundary is a clean close. A
//! stream that ends inside a frame is a receive error.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::TransportError;

/// Largest payload a single frame can carry.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Writes `text` as one frame and flushes the writer.
pub async fn write_frame<W>(
    writer: &mut W,
    text: &str,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let payload = text.as_bytes();
    let len = u16::try_from(payload.len())
        .map_err(|_| TransportError::FrameTooLarge(payload.len()))?;

    let mut buf = Vec::with_capacity(2 + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);

    writer
        .write_all(&buf)
        .await
        .map_err(TransportError::SendFailed)?;
    writer.flush().await.map_err(TransportError::SendFailed)
}

/// Reads the next frame.
///
/// Returns `Ok(None)` if the peer closed the stream between frames.
pub async fn read_frame<R>(
    reader: &mut R,
) -> Result<Option<String>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 2];
    let n = reader
        .read(&mut len_buf)
        .await
        .map_err(TransportError::ReceiveFailed)?;
    match n {
        0 => return Ok(None),
        1 => {
            reader
                .read_exact(&mut len_buf[1..])
                .await
                .map_err(TransportError::ReceiveFailed)?;
        }
        _ => {}
    }

    let len = u16::from_be_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(TransportError::ReceiveFailed)?;

    String::from_utf8(payload)
        .map(Some)
        .map_err(TransportError::InvalidUtf8)
}
