use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tapr_store::{FileHandle, StoreError, StoreResult};
use tapr_types::{PathName, Tx};
use tokio::sync::Mutex as AsyncMutex;

/// An open push destination tracked by the [`TxTable`].
///
/// The handle sits behind its own async mutex so that a backend write never
/// holds the table lock. Only the push call attached to the entry writes it.
pub struct TxEntry {
    name: PathName,
    handle: AsyncMutex<Option<Box<dyn FileHandle>>>,
    attached: AtomicBool,
    bytes_written: AtomicU64,
}

impl TxEntry {
    fn new(name: PathName, handle: Box<dyn FileHandle>) -> Self {
        Self {
            name,
            handle: AsyncMutex::new(Some(handle)),
            attached: AtomicBool::new(false),
            bytes_written: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &PathName {
        &self.name
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::SeqCst)
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Write all of `data`, retrying short writes.
    pub async fn write_all(&self, mut data: &[u8]) -> StoreResult<()> {
        let mut guard = self.handle.lock().await;
        let handle = guard
            .as_mut()
            .ok_or_else(|| StoreError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "handle closed")))?;

        while !data.is_empty() {
            let n = handle.write(data).await?;
            if n == 0 {
                return Err(StoreError::Io(io::ErrorKind::WriteZero.into()));
            }
            self.bytes_written.fetch_add(n as u64, Ordering::SeqCst);
            data = &data[n..];
        }
        Ok(())
    }
}

impl std::fmt::Debug for TxEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxEntry")
            .field("name", &self.name)
            .field("attached", &self.is_attached())
            .field("bytes_written", &self.bytes_written())
            .finish()
    }
}

/// An entry that has left the table. Only removed entries can be closed.
#[derive(Debug)]
pub struct RemovedEntry(Arc<TxEntry>);

impl RemovedEntry {
    pub fn entry(&self) -> &TxEntry {
        &self.0
    }

    /// Close the backend handle. Returns `Ok(false)` if it was already closed.
    pub async fn close(self) -> StoreResult<bool> {
        let handle = self.0.handle.lock().await.take();
        match handle {
            Some(handle) => {
                handle.close().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Why a push could not attach to a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachError {
    /// No entry exists for the transaction.
    NotFound,
    /// Another push is already writing the transaction.
    Busy,
}

/// Maps in-flight transactions to their open destination handles.
///
/// Every operation holds the map lock only for the map access itself.
/// The table never closes handles; callers close what they [`remove`].
///
/// [`remove`]: TxTable::remove
#[derive(Debug, Default)]
pub struct TxTable {
    entries: Mutex<HashMap<Tx, Arc<TxEntry>>>,
}

impl TxTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entry. If `tx` is already present the handle is handed
    /// back untouched.
    pub fn put(
        &self,
        tx: Tx,
        name: PathName,
        handle: Box<dyn FileHandle>,
    ) -> Result<(), Box<dyn FileHandle>> {
        let mut entries = self.entries.lock().expect("tx table lock poisoned");
        if entries.contains_key(&tx) {
            return Err(handle);
        }
        entries.insert(tx, Arc::new(TxEntry::new(name, handle)));
        Ok(())
    }

    /// Insert under the first id from `next` that is not already live and
    /// return it. Ids are drawn under the map lock, so a concurrent insert
    /// cannot take the chosen id.
    pub fn insert_fresh(
        &self,
        name: PathName,
        handle: Box<dyn FileHandle>,
        mut next: impl FnMut() -> Tx,
    ) -> Tx {
        let mut entries = self.entries.lock().expect("tx table lock poisoned");
        let mut tx = next();
        while entries.contains_key(&tx) {
            tx = next();
        }
        entries.insert(tx, Arc::new(TxEntry::new(name, handle)));
        tx
    }

    pub fn get(&self, tx: &Tx) -> Option<Arc<TxEntry>> {
        self.entries
            .lock()
            .expect("tx table lock poisoned")
            .get(tx)
            .cloned()
    }

    pub fn remove(&self, tx: &Tx) -> Option<RemovedEntry> {
        self.entries
            .lock()
            .expect("tx table lock poisoned")
            .remove(tx)
            .map(RemovedEntry)
    }

    /// Claim the entry for a push call. At most one call is ever attached.
    pub fn attach(&self, tx: &Tx) -> Result<Arc<TxEntry>, AttachError> {
        let entry = self.get(tx).ok_or(AttachError::NotFound)?;
        if entry.attached.swap(true, Ordering::SeqCst) {
            return Err(AttachError::Busy);
        }
        Ok(entry)
    }

    pub fn contains(&self, tx: &Tx) -> bool {
        self.entries
            .lock()
            .expect("tx table lock poisoned")
            .contains_key(tx)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("tx table lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry, for shutdown.
    pub fn drain(&self) -> Vec<(Tx, RemovedEntry)> {
        self.entries
            .lock()
            .expect("tx table lock poisoned")
            .drain()
            .map(|(tx, entry)| (tx, RemovedEntry(entry)))
            .collect()
    }
}
