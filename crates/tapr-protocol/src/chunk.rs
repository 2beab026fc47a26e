//! Push body framing.
//!
//! A push body is the transaction id followed by zero or more chunk frames:
//!
//! ```text
//! [16 bytes: tx]
//! [4 bytes: chunk length (big-endian u32)][N bytes: chunk data]
//! [4 bytes: chunk length (big-endian u32)][N bytes: chunk data]
//! ...
//! ```
//!
//! The body ends cleanly only at a frame boundary. End of input anywhere
//! else is [`ProtocolError::Truncated`].

use bytes::{BufMut, Bytes, BytesMut};
use tapr_types::{Tx, TX_LEN};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{ProtocolError, ProtocolResult};

/// Length of a chunk frame header.
pub const CHUNK_HEADER_LEN: usize = 4;

/// Default upper bound on a single chunk's payload.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// One decoded unit of push body data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub data: Bytes,
}

impl Chunk {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Fill `buf` completely, counting how much arrived before end of input.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> ProtocolResult<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Read the transaction id at the head of a push body.
pub async fn read_tx<R>(reader: &mut R) -> ProtocolResult<Tx>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; TX_LEN];
    let n = read_full(reader, &mut buf).await?;
    if n < TX_LEN {
        return Err(ProtocolError::Truncated {
            what: "transaction id",
            expected: TX_LEN,
            actual: n,
        });
    }
    Ok(Tx::from_raw(buf))
}

/// Read the next chunk frame.
///
/// Returns `Ok(None)` when the input ends exactly at a frame boundary.
pub async fn read_chunk<R>(reader: &mut R, max_size: usize) -> ProtocolResult<Option<Chunk>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; CHUNK_HEADER_LEN];
    let n = read_full(reader, &mut header).await?;
    if n == 0 {
        return Ok(None);
    }
    if n < CHUNK_HEADER_LEN {
        return Err(ProtocolError::Truncated {
            what: "chunk header",
            expected: CHUNK_HEADER_LEN,
            actual: n,
        });
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > max_size {
        return Err(ProtocolError::ChunkTooLarge { size: len, max: max_size });
    }

    let mut data = vec![0u8; len];
    let n = read_full(reader, &mut data).await?;
    if n < len {
        return Err(ProtocolError::Truncated {
            what: "chunk data",
            expected: len,
            actual: n,
        });
    }
    Ok(Some(Chunk::new(data)))
}

/// Builds push bodies on the client side.
#[derive(Debug)]
pub struct PushBodyEncoder {
    buf: BytesMut,
}

impl PushBodyEncoder {
    pub fn new(tx: Tx) -> Self {
        let mut buf = BytesMut::with_capacity(TX_LEN + 64);
        buf.put_slice(tx.as_bytes());
        Self { buf }
    }

    /// Append one chunk frame.
    pub fn chunk(mut self, data: &[u8]) -> Self {
        encode_chunk(data, &mut self.buf);
        self
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Append a single chunk frame to `buf`.
pub fn encode_chunk(data: &[u8], buf: &mut BytesMut) {
    buf.reserve(CHUNK_HEADER_LEN + data.len());
    buf.put_u32(data.len() as u32);
    buf.put_slice(data);
}
