//! Chunk stream reader: the producer half of a push.
//!
//! The reader owns the remainder of a push body after the transaction id,
//! decodes chunk frames, and publishes them on a bounded channel. It is the
//! only producer on that channel, so the consumer sees chunks in exactly the
//! order they were framed on the wire.

use tapr_protocol::{read_chunk, Chunk, ProtocolError};
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// What the reader observed on the body stream.
#[derive(Debug)]
pub enum StreamItem {
    /// A decoded chunk; more may follow.
    Data(Chunk),
    /// The body ended cleanly at a chunk boundary.
    End,
    /// The transport failed underneath the reader, e.g. the client went away.
    Interrupted(ProtocolError),
    /// The peer sent bytes that do not decode as chunk frames.
    Fault(ProtocolError),
}

impl StreamItem {
    fn is_terminal(&self) -> bool {
        !matches!(self, Self::Data(_))
    }
}

/// Spawns the decode task for one push body.
pub struct ChunkStreamReader;

impl ChunkStreamReader {
    /// Start reading `body` on a new task.
    ///
    /// The task stops after publishing a terminal item, when `cancel` fires,
    /// or when the receiver is dropped, whichever happens first. It never
    /// blocks on a full channel past cancellation.
    pub fn spawn<R>(
        mut body: R,
        capacity: usize,
        max_chunk_size: usize,
        cancel: CancellationToken,
    ) -> (mpsc::Receiver<StreamItem>, JoinHandle<()>)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity);

        let task = tokio::spawn(async move {
            let mut chunks: u64 = 0;
            loop {
                let item = tokio::select! {
                    _ = cancel.cancelled() => break,
                    res = read_chunk(&mut body, max_chunk_size) => match res {
                        Ok(Some(chunk)) => {
                            chunks += 1;
                            trace!(len = chunk.len(), "chunk decoded");
                            StreamItem::Data(chunk)
                        }
                        Ok(None) => StreamItem::End,
                        Err(e) if e.is_transport() => StreamItem::Interrupted(e),
                        Err(e) => StreamItem::Fault(e),
                    },
                };

                let terminal = item.is_terminal();
                let sent = tokio::select! {
                    _ = cancel.cancelled() => false,
                    res = tx.send(item) => res.is_ok(),
                };
                if !sent || terminal {
                    break;
                }
            }
            debug!(chunks, "chunk reader finished");
        });

        (rx, task)
    }
}
