//! Length-prefixed framing for messages on a byte stream.
//!
//! Each message is encoded as a 2-byte little-endian length prefix followed
//! by the message body: `[u16 length][body]`. A multi-frame send is written
//! as one message whose body is the frames back to back, so the peer sees a
//! single logical unit.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::errors::{Result, TransportError};

pub const LENGTH_PREFIX_LEN: usize = 2;

/// Largest body a single message can carry.
pub const MAX_MESSAGE_LEN: usize = u16::MAX as usize;

/// Encodes `frames` as one length-prefixed message.
pub fn encode_message(frames: &[Bytes]) -> Result<Bytes> {
    let len: usize = frames.iter().map(Bytes::len).sum();
    let prefix = u16::try_from(len).map_err(|_| TransportError::MessageTooLarge(len))?;

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_LEN + len);
    buf.put_u16_le(prefix);
    for frame in frames {
        buf.put_slice(frame);
    }
    Ok(buf.freeze())
}

/// Writes one already-encoded message to the stream and flushes.
pub async fn write_encoded<W>(writer: &mut W, message: &Bytes) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(message).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the next message from the stream.
///
/// Returns `Ok(None)` on a clean end of stream between messages. A stream
/// that ends anywhere inside a message, prefix included, is an error.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Bytes>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    if reader.read(&mut prefix[..1]).await? == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut prefix[1..]).await?;

    let len = usize::from(u16::from_le_bytes(prefix));
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(Bytes::from(body)))
}
