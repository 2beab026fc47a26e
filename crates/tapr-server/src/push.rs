//! Push transactions: prepare, stream, and terminate.
//!
//! A push runs in three steps. `push_prepare` opens the destination and
//! registers it in the [`TxTable`] under a fresh [`Tx`]. `push` reads the tx
//! from the head of the body, attaches to the entry, and writes every chunk
//! the [`ChunkStreamReader`] produces, in order. Whatever ends the push (clean
//! end of body, cancellation, transport loss, malformed framing, or a failed
//! write) the entry is removed from the table and only then closed.

use std::sync::Arc;

use tapr_protocol::{
    read_tx, ErrorKind, PushLogEntry, PushLogRequest, PushPrepareRequest, PushPrepareResponse,
    PushResponse, WireError,
};
use tapr_store::{OpenFlags, Store};
use tapr_types::{PathName, Tx};
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PushConfig;
use crate::error::{ServerError, ServerResult};
use crate::heartbeat;
use crate::reader::{ChunkStreamReader, StreamItem};
use crate::table::{AttachError, TxTable};

/// How the write loop ended.
enum Termination {
    /// The body ended at a chunk boundary.
    Completed,
    /// The call was cancelled or the transport dropped.
    Cancelled,
    /// A backend write failed; the error goes back to the client as data.
    WriteFailed(WireError),
    /// The body could not be decoded.
    Malformed(tapr_protocol::ProtocolError),
}

/// The ingestion service: owns the store handle and the transaction table.
///
/// Cloning is cheap and clones share the same table.
#[derive(Clone)]
pub struct IoServer {
    store: Arc<dyn Store>,
    table: Arc<TxTable>,
    config: PushConfig,
    shutdown: CancellationToken,
}

impl IoServer {
    pub fn new(store: Arc<dyn Store>, config: PushConfig) -> Self {
        Self {
            store,
            table: Arc::new(TxTable::new()),
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn table(&self) -> &TxTable {
        &self.table
    }

    pub fn config(&self) -> &PushConfig {
        &self.config
    }

    /// A token cancelled when the server shuts down. Per-call tokens should
    /// be children of it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Open the destination and register a new transaction.
    ///
    /// Backend open errors are returned unchanged and leave no table entry.
    pub async fn push_prepare(&self, req: &PushPrepareRequest) -> ServerResult<PushPrepareResponse> {
        let name = PathName::new(req.name.as_str())?;
        let flags = OpenFlags::for_push(req.append);

        let handle = self.store.open_file(&name, flags).await?;
        let tx = self.table.insert_fresh(name.clone(), handle, Tx::generate);

        debug!(%tx, %name, append = req.append, "push prepare");
        Ok(PushPrepareResponse { tx })
    }

    /// Consume a push body and write it to the transaction's destination.
    ///
    /// `cancel` is the per-call cancellation signal. A push whose body ends
    /// at a chunk boundary completes normally; a cancelled push still evicts
    /// and closes its transaction and reports `cancelled`.
    pub async fn push<R>(&self, mut body: R, cancel: CancellationToken) -> ServerResult<PushResponse>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let tx = tokio::select! {
            _ = cancel.cancelled() => return Err(ServerError::Cancelled),
            res = read_tx(&mut body) => res?,
        };

        debug!(%tx, "push starting");

        let entry = match self.table.attach(&tx) {
            Ok(entry) => entry,
            Err(AttachError::NotFound) => {
                debug!(%tx, "push for unknown transaction");
                return Ok(PushResponse {
                    error: Some(WireError::new(
                        ErrorKind::NotExist,
                        format!("unknown transaction {tx}"),
                    )),
                    ..Default::default()
                });
            }
            Err(AttachError::Busy) => {
                warn!(%tx, "transaction already has an active push");
                return Ok(PushResponse {
                    error: Some(WireError::new(
                        ErrorKind::Busy,
                        format!("transaction {tx} already has an active push"),
                    )),
                    ..Default::default()
                });
            }
        };
        drop(entry);

        let reader_cancel = cancel.child_token();
        let _reader_guard = reader_cancel.clone().drop_guard();
        let (mut stream, _reader) = ChunkStreamReader::spawn(
            body,
            self.config.channel_capacity,
            self.config.max_chunk_size,
            reader_cancel,
        );

        let termination = loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => break Termination::Cancelled,
                item = stream.recv() => item,
            };

            match item {
                Some(StreamItem::Data(chunk)) => {
                    if let Err(e) = self.write_chunk(&tx, &chunk.data, &cancel).await {
                        match e {
                            Some(err) => break Termination::WriteFailed(err),
                            None => break Termination::Cancelled,
                        }
                    }
                    debug!(%tx, bytes = chunk.len(), "chunk written");
                }
                Some(StreamItem::End) => break Termination::Completed,
                Some(StreamItem::Interrupted(e)) => {
                    debug!(%tx, error = %e, "push transport interrupted");
                    break Termination::Cancelled;
                }
                Some(StreamItem::Fault(e)) => break Termination::Malformed(e),
                // The reader only stops without a terminal item on cancellation.
                None => break Termination::Cancelled,
            }
        };

        self.finish(tx, termination).await
    }

    /// Write one chunk through the table's handle for `tx`.
    ///
    /// `Err(None)` means the call was cancelled mid-write.
    async fn write_chunk(
        &self,
        tx: &Tx,
        data: &[u8],
        cancel: &CancellationToken,
    ) -> Result<(), Option<WireError>> {
        let entry = self.table.get(tx).ok_or_else(|| {
            Some(WireError::new(
                ErrorKind::NotExist,
                format!("transaction {tx} was evicted"),
            ))
        })?;

        let write = tokio::time::timeout(self.config.write_timeout(), entry.write_all(data));
        tokio::select! {
            _ = cancel.cancelled() => Err(None),
            res = write => match res {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    warn!(%tx, error = %e, "backend write failed");
                    Err(Some(WireError::from(&e)))
                }
                Err(_) => {
                    warn!(%tx, timeout_ms = self.config.write_timeout_ms, "backend write timed out");
                    Err(Some(WireError::new(
                        ErrorKind::Timeout,
                        format!("write did not finish within {}ms", self.config.write_timeout_ms),
                    )))
                }
            },
        }
    }

    /// Evict the transaction, close its handle, and build the response.
    async fn finish(&self, tx: Tx, termination: Termination) -> ServerResult<PushResponse> {
        let mut response = PushResponse::default();

        match self.table.remove(&tx) {
            Some(removed) => {
                response.bytes_written = removed.entry().bytes_written();
                let name = removed.entry().name().clone();
                if let Err(e) = removed.close().await {
                    warn!(%tx, %name, error = %e, "closing push destination failed");
                    response.error = Some(WireError::from(&e));
                }
                info!(%tx, %name, bytes = response.bytes_written, "push finished; file closed");
            }
            None => {
                warn!(%tx, "transaction evicted before the push finished");
                response.error = Some(WireError::new(
                    ErrorKind::NotExist,
                    format!("transaction {tx} was evicted"),
                ));
            }
        }

        match termination {
            Termination::Completed => {}
            Termination::Cancelled => {
                debug!(%tx, "push cancelled");
                response.cancelled = true;
            }
            Termination::WriteFailed(err) => response.error = Some(err),
            Termination::Malformed(e) => {
                warn!(%tx, error = %e, "malformed push body");
                return Err(e.into());
            }
        }

        Ok(response)
    }

    /// Start a heartbeat stream for `req.tx`.
    ///
    /// The stream does not consult the transaction table: it runs whether or
    /// not the transaction is still open, until `cancel` fires or the
    /// receiver is dropped.
    pub fn push_log(&self, req: &PushLogRequest, cancel: CancellationToken) -> mpsc::Receiver<PushLogEntry> {
        debug!(tx = %req.tx, "push log");
        heartbeat::spawn(req.tx, self.config.log_interval(), cancel)
    }

    /// Cancel every in-flight call and close any handles left in the table.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        for (tx, removed) in self.table.drain() {
            if let Err(e) = removed.close().await {
                warn!(%tx, error = %e, "closing handle on shutdown failed");
            }
        }
        info!("io server shut down");
    }
}

impl std::fmt::Debug for IoServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoServer")
            .field("store", &self.store)
            .field("active_transactions", &self.table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use proptest::prelude::*;
    use tapr_protocol::{encode_chunk, PushBodyEncoder, ProtocolError};
    use tapr_store::{FileHandle, MemoryStore, StoreError, StoreResult};
    use tokio::io::AsyncWriteExt;

    fn server(store: &MemoryStore) -> IoServer {
        IoServer::new(Arc::new(store.clone()), PushConfig::default())
    }

    fn name(s: &str) -> PathName {
        PathName::new(s).unwrap()
    }

    async fn prepare(io: &IoServer, n: &str, append: bool) -> Tx {
        io.push_prepare(&PushPrepareRequest { name: n.into(), append })
            .await
            .unwrap()
            .tx
    }

    fn body(tx: Tx, chunks: &[&[u8]]) -> std::io::Cursor<Vec<u8>> {
        let enc = chunks.iter().fold(PushBodyEncoder::new(tx), |e, c| e.chunk(c));
        std::io::Cursor::new(enc.finish().to_vec())
    }

    #[tokio::test]
    async fn hello_world_scenario() {
        let store = MemoryStore::default();
        let io = server(&store);

        let tx = prepare(&io, "vol1.tar", false).await;
        assert!(io.table().contains(&tx));

        let resp = io.push(body(tx, &[b"hello", b" world"]), CancellationToken::new()).await.unwrap();
        assert!(resp.is_ok());
        assert!(!resp.cancelled);
        assert_eq!(resp.bytes_written, 11);

        assert_eq!(store.contents(&name("vol1.tar")).unwrap(), b"hello world");
        assert!(io.table().get(&tx).is_none());
        assert_eq!(store.open_handles(), 0);
        assert_eq!(store.close_count(), 1);
    }

    #[tokio::test]
    async fn prepare_ids_are_distinct() {
        let store = MemoryStore::default();
        let io = server(&store);
        let a = prepare(&io, "vol1.tar", false).await;
        let b = prepare(&io, "vol1.tar", false).await;
        assert_ne!(a, b);
        assert_eq!(io.table().len(), 2);
        assert_eq!(store.open_handles(), 2);
    }

    #[tokio::test]
    async fn prepare_failure_leaves_no_entry() {
        let store = MemoryStore::default();
        store.deny(&name("locked.tar"));
        let io = server(&store);

        let err = io
            .push_prepare(&PushPrepareRequest { name: "locked.tar".into(), append: false })
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Store(StoreError::PermissionDenied(_))));
        assert!(io.table().is_empty());
    }

    #[tokio::test]
    async fn prepare_rejects_bad_name() {
        let store = MemoryStore::default();
        let io = server(&store);
        let err = io
            .push_prepare(&PushPrepareRequest { name: "../escape".into(), append: false })
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidName(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn append_mode_extends_file() {
        let store = MemoryStore::default();
        let io = server(&store);

        let tx = prepare(&io, "log.tar", false).await;
        io.push(body(tx, &[b"one"]), CancellationToken::new()).await.unwrap();
        let tx = prepare(&io, "log.tar", true).await;
        io.push(body(tx, &[b"two"]), CancellationToken::new()).await.unwrap();

        assert_eq!(store.contents(&name("log.tar")).unwrap(), b"onetwo");
    }

    #[tokio::test]
    async fn unknown_tx_is_application_error() {
        let store = MemoryStore::default();
        let io = server(&store);

        let resp = io.push(body(Tx::generate(), &[b"data"]), CancellationToken::new()).await.unwrap();
        assert_eq!(resp.error.unwrap().kind, ErrorKind::NotExist);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn truncated_tx_fails_call() {
        let store = MemoryStore::default();
        let io = server(&store);
        let err = io
            .push(std::io::Cursor::new(vec![1u8, 2, 3]), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Protocol(ProtocolError::Truncated { .. })));
    }

    #[tokio::test]
    async fn malformed_body_evicts_and_closes() {
        let store = MemoryStore::default();
        let io = server(&store);
        let tx = prepare(&io, "bad.tar", false).await;

        let mut bytes = PushBodyEncoder::new(tx).chunk(b"ok").finish().to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 50, 1, 2]);

        let err = io.push(std::io::Cursor::new(bytes), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ServerError::Protocol(ProtocolError::Truncated { .. })));
        assert!(!io.table().contains(&tx));
        assert_eq!(store.open_handles(), 0);
        assert_eq!(store.contents(&name("bad.tar")).unwrap(), b"ok");
    }

    #[tokio::test]
    async fn write_failure_is_reported_and_cleaned_up() {
        let store = MemoryStore::default();
        let io = server(&store);
        let tx = prepare(&io, "broken.tar", false).await;
        store.fail_writes(&name("broken.tar"));

        let resp = io.push(body(tx, &[b"never lands"]), CancellationToken::new()).await.unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.kind, ErrorKind::Io);
        assert_eq!(resp.bytes_written, 0);
        assert!(!io.table().contains(&tx));
        assert_eq!(store.open_handles(), 0);
        assert_eq!(store.close_count(), 1);
    }

    #[tokio::test]
    async fn cancellation_evicts_and_closes_once() {
        let store = MemoryStore::default();
        let io = server(&store);
        let tx = prepare(&io, "partial.tar", false).await;

        let (mut client, server_end) = tokio::io::duplex(1024);
        let cancel = CancellationToken::new();
        let push = tokio::spawn({
            let io = io.clone();
            let cancel = cancel.clone();
            async move { io.push(server_end, cancel).await }
        });

        let mut head = bytes::BytesMut::new();
        head.extend_from_slice(tx.as_bytes());
        encode_chunk(b"partial", &mut head);
        client.write_all(&head).await.unwrap();

        while store.contents(&name("partial.tar")).unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        cancel.cancel();

        let resp = push.await.unwrap().unwrap();
        assert!(resp.cancelled);
        assert!(resp.is_ok());
        assert_eq!(resp.bytes_written, 7);
        assert!(!io.table().contains(&tx));
        assert_eq!(store.close_count(), 1);
        drop(client);
    }

    #[tokio::test]
    async fn client_disconnect_mid_frame_is_treated_as_fault() {
        let store = MemoryStore::default();
        let io = server(&store);
        let tx = prepare(&io, "cut.tar", false).await;

        let (mut client, server_end) = tokio::io::duplex(1024);
        let push = tokio::spawn({
            let io = io.clone();
            async move { io.push(server_end, CancellationToken::new()).await }
        });
        client.write_all(tx.as_bytes()).await.unwrap();
        client.write_all(&[0, 0, 0, 10, b'a']).await.unwrap();
        drop(client);

        assert!(push.await.unwrap().is_err());
        assert!(io.table().is_empty());
        assert_eq!(store.open_handles(), 0);
    }

    #[tokio::test]
    async fn second_push_on_same_tx_is_busy() {
        let store = MemoryStore::default();
        let io = server(&store);
        let tx = prepare(&io, "shared.tar", false).await;

        let (mut client, server_end) = tokio::io::duplex(1024);
        let first = tokio::spawn({
            let io = io.clone();
            async move { io.push(server_end, CancellationToken::new()).await }
        });
        client.write_all(tx.as_bytes()).await.unwrap();
        while !io.table().get(&tx).map(|e| e.is_attached()).unwrap_or(false) {
            tokio::task::yield_now().await;
        }

        let resp = io.push(body(tx, &[b"intruder"]), CancellationToken::new()).await.unwrap();
        assert_eq!(resp.error.unwrap().kind, ErrorKind::Busy);

        client.write_all(&PushBodyEncoder::new(tx).chunk(b"owner").finish()[tapr_types::TX_LEN..]).await.unwrap();
        drop(client);
        let resp = first.await.unwrap().unwrap();
        assert!(resp.is_ok());
        assert_eq!(store.contents(&name("shared.tar")).unwrap(), b"owner");
    }

    #[tokio::test]
    async fn concurrent_pushes_are_isolated() {
        let store = MemoryStore::default();
        let io = server(&store);
        let good = prepare(&io, "good.tar", false).await;
        let bad = prepare(&io, "bad.tar", false).await;
        store.fail_writes(&name("bad.tar"));

        let chunks: Vec<Vec<u8>> = (0..50).map(|i| format!("{i:03}").into_bytes()).collect();
        let refs: Vec<&[u8]> = chunks.iter().map(|c| c.as_slice()).collect();

        let (a, b) = tokio::join!(
            io.push(body(good, &refs), CancellationToken::new()),
            io.push(body(bad, &refs), CancellationToken::new()),
        );
        assert!(a.unwrap().is_ok());
        assert!(b.unwrap().error.is_some());
        assert_eq!(store.contents(&name("good.tar")).unwrap(), chunks.concat());
        assert!(io.table().is_empty());
        assert_eq!(store.open_handles(), 0);
    }

    struct StuckHandle;

    #[async_trait::async_trait]
    impl FileHandle for StuckHandle {
        async fn write(&mut self, _buf: &[u8]) -> StoreResult<usize> {
            std::future::pending().await
        }

        async fn close(self: Box<Self>) -> StoreResult<()> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct StuckStore;

    #[async_trait::async_trait]
    impl Store for StuckStore {
        fn name(&self) -> &str {
            "stuck"
        }

        fn backend(&self) -> &'static str {
            "stuck"
        }

        async fn open_file(&self, _name: &PathName, _flags: OpenFlags) -> StoreResult<Box<dyn FileHandle>> {
            Ok(Box::new(StuckHandle))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_write_times_out() {
        let config = PushConfig { write_timeout_ms: 50, ..Default::default() };
        let io = IoServer::new(Arc::new(StuckStore), config);
        let tx = prepare(&io, "slow.tar", false).await;

        let resp = io.push(body(tx, &[b"x"]), CancellationToken::new()).await.unwrap();
        assert_eq!(resp.error.unwrap().kind, ErrorKind::Timeout);
        assert!(io.table().is_empty());
    }

    #[tokio::test]
    async fn hung_write_yields_to_cancellation() {
        let io = IoServer::new(Arc::new(StuckStore), PushConfig::default());
        let tx = prepare(&io, "slow.tar", false).await;
        let cancel = CancellationToken::new();

        let push = tokio::spawn({
            let io = io.clone();
            let cancel = cancel.clone();
            async move { io.push(body(tx, &[b"x"]), cancel).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let resp = tokio::time::timeout(Duration::from_secs(5), push).await.unwrap().unwrap().unwrap();
        assert!(resp.cancelled);
        assert!(io.table().is_empty());
    }

    #[tokio::test]
    async fn shutdown_closes_open_transactions() {
        let store = MemoryStore::default();
        let io = server(&store);
        prepare(&io, "a.tar", false).await;
        prepare(&io, "b.tar", false).await;

        io.shutdown().await;
        assert!(io.table().is_empty());
        assert_eq!(store.open_handles(), 0);
        assert!(io.shutdown_token().is_cancelled());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn backend_sees_chunks_in_order(chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..128), 0..24)) {
            let rt = tokio::runtime::Builder::new_multi_thread().worker_threads(2).enable_all().build().unwrap();
            let store = MemoryStore::default();
            let io = IoServer::new(
                Arc::new(store.clone()),
                PushConfig { channel_capacity: 1, ..Default::default() },
            );
            let refs: Vec<&[u8]> = chunks.iter().map(|c| c.as_slice()).collect();
            let resp = rt.block_on(async {
                let tx = prepare(&io, "prop.tar", false).await;
                io.push(body(tx, &refs), CancellationToken::new()).await.unwrap()
            });
            prop_assert!(resp.is_ok());
            prop_assert_eq!(store.contents(&name("prop.tar")).unwrap(), chunks.concat());
            prop_assert_eq!(store.close_count(), 1);
        }
    }
}
