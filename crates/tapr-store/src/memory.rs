use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tapr_types::PathName;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{FileHandle, OpenFlags, Store};

#[derive(Default)]
struct Inner {
    files: Mutex<HashMap<PathName, Vec<u8>>>,
    failing_writes: Mutex<HashSet<PathName>>,
    denied: Mutex<HashSet<PathName>>,
    opened: AtomicU64,
    closed: AtomicU64,
}

/// In-memory store for tests and embedding.
///
/// File contents live in a `HashMap` behind a `Mutex`. Handles share the map,
/// so concurrent handles to the same name observe each other's writes the
/// way separate descriptors on one file would. The store also counts opens
/// and closes and can be told to fail opens or writes for specific names.
#[derive(Clone)]
pub struct MemoryStore {
    name: String,
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub const BACKEND: &'static str = "memory";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Inner::default()),
        }
    }

    /// Current contents of a file, if it exists.
    pub fn contents(&self, name: &PathName) -> Option<Vec<u8>> {
        self.inner.files.lock().expect("lock poisoned").get(name).cloned()
    }

    /// Number of files in the store.
    pub fn len(&self) -> usize {
        self.inner.files.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handles opened and not yet closed.
    pub fn open_handles(&self) -> u64 {
        self.inner.opened.load(Ordering::SeqCst) - self.inner.closed.load(Ordering::SeqCst)
    }

    /// Total number of `close` calls across all handles.
    pub fn close_count(&self) -> u64 {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Make every subsequent write to `name` fail.
    pub fn fail_writes(&self, name: &PathName) {
        self.inner
            .failing_writes
            .lock()
            .expect("lock poisoned")
            .insert(name.clone());
    }

    /// Make every subsequent open of `name` fail with `PermissionDenied`.
    pub fn deny(&self, name: &PathName) {
        self.inner.denied.lock().expect("lock poisoned").insert(name.clone());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("name", &self.name)
            .field("file_count", &self.len())
            .field("open_handles", &self.open_handles())
            .finish()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> &'static str {
        Self::BACKEND
    }

    async fn open_file(&self, name: &PathName, flags: OpenFlags) -> StoreResult<Box<dyn FileHandle>> {
        flags.validate()?;

        if self.inner.denied.lock().expect("lock poisoned").contains(name) {
            return Err(StoreError::PermissionDenied(name.clone()));
        }

        {
            let mut files = self.inner.files.lock().expect("lock poisoned");
            match files.get_mut(name) {
                Some(data) if flags.truncate => data.clear(),
                Some(_) => {}
                None if flags.create => {
                    files.insert(name.clone(), Vec::new());
                }
                None => return Err(StoreError::NotFound(name.clone())),
            }
        }

        self.inner.opened.fetch_add(1, Ordering::SeqCst);
        debug!(store = %self.name, name = %name, flags = %flags, "memory file opened");

        Ok(Box::new(MemoryHandle {
            name: name.clone(),
            append: flags.append,
            offset: 0,
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct MemoryHandle {
    name: PathName,
    append: bool,
    offset: usize,
    inner: Arc<Inner>,
}

#[async_trait]
impl FileHandle for MemoryHandle {
    async fn write(&mut self, buf: &[u8]) -> StoreResult<usize> {
        if self
            .inner
            .failing_writes
            .lock()
            .expect("lock poisoned")
            .contains(&self.name)
        {
            return Err(StoreError::Backend(format!("write to {} failed", self.name)));
        }

        let mut files = self.inner.files.lock().expect("lock poisoned");
        let data = files
            .get_mut(&self.name)
            .ok_or_else(|| StoreError::NotFound(self.name.clone()))?;

        if self.append {
            self.offset = data.len();
        }
        let end = self.offset + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[self.offset..end].copy_from_slice(buf);
        self.offset = end;

        Ok(buf.len())
    }

    async fn close(self: Box<Self>) -> StoreResult<()> {
        self.inner.closed.fetch_add(1, Ordering::SeqCst);
        debug!(name = %self.name, "memory file closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> PathName {
        PathName::new(s).unwrap()
    }

    #[tokio::test]
    async fn write_and_read_back() {
        let store = MemoryStore::default();
        let mut f = store.open_file(&name("a"), OpenFlags::for_push(false)).await.unwrap();
        assert_eq!(f.write(b"hello").await.unwrap(), 5);
        assert_eq!(f.write(b" world").await.unwrap(), 6);
        f.close().await.unwrap();
        assert_eq!(store.contents(&name("a")).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn truncate_discards_existing() {
        let store = MemoryStore::default();
        let mut f = store.open_file(&name("a"), OpenFlags::for_push(false)).await.unwrap();
        f.write(b"old contents").await.unwrap();
        f.close().await.unwrap();

        let mut f = store.open_file(&name("a"), OpenFlags::for_push(false)).await.unwrap();
        f.write(b"new").await.unwrap();
        f.close().await.unwrap();
        assert_eq!(store.contents(&name("a")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn append_keeps_existing() {
        let store = MemoryStore::default();
        let mut f = store.open_file(&name("a"), OpenFlags::for_push(false)).await.unwrap();
        f.write(b"one").await.unwrap();
        f.close().await.unwrap();

        let mut f = store.open_file(&name("a"), OpenFlags::for_push(true)).await.unwrap();
        f.write(b"two").await.unwrap();
        f.close().await.unwrap();
        assert_eq!(store.contents(&name("a")).unwrap(), b"onetwo");
    }

    #[tokio::test]
    async fn open_without_create_requires_existing() {
        let store = MemoryStore::default();
        let flags = OpenFlags { create: false, append: true, truncate: false };
        let err = store.open_file(&name("missing"), flags).await.err().unwrap();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn denied_open_fails() {
        let store = MemoryStore::default();
        store.deny(&name("secret"));
        let err = store.open_file(&name("secret"), OpenFlags::for_push(false)).await.err().unwrap();
        assert!(matches!(err, StoreError::PermissionDenied(_)));
        assert!(store.is_empty());
        assert_eq!(store.open_handles(), 0);
    }

    #[tokio::test]
    async fn failing_writes() {
        let store = MemoryStore::default();
        let mut f = store.open_file(&name("bad"), OpenFlags::for_push(false)).await.unwrap();
        store.fail_writes(&name("bad"));
        assert!(matches!(f.write(b"x").await, Err(StoreError::Backend(_))));
        f.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_and_close_are_counted() {
        let store = MemoryStore::default();
        let f1 = store.open_file(&name("a"), OpenFlags::for_push(false)).await.unwrap();
        let f2 = store.open_file(&name("b"), OpenFlags::for_push(false)).await.unwrap();
        assert_eq!(store.open_handles(), 2);
        f1.close().await.unwrap();
        assert_eq!(store.open_handles(), 1);
        f2.close().await.unwrap();
        assert_eq!(store.open_handles(), 0);
        assert_eq!(store.close_count(), 2);
    }

    #[tokio::test]
    async fn interleaved_handles_stay_separate() {
        let store = MemoryStore::default();
        let mut a = store.open_file(&name("a"), OpenFlags::for_push(false)).await.unwrap();
        let mut b = store.open_file(&name("b"), OpenFlags::for_push(false)).await.unwrap();
        a.write(b"a1").await.unwrap();
        b.write(b"b1").await.unwrap();
        a.write(b"a2").await.unwrap();
        b.write(b"b2").await.unwrap();
        assert_eq!(store.contents(&name("a")).unwrap(), b"a1a2");
        assert_eq!(store.contents(&name("b")).unwrap(), b"b1b2");
    }

    #[test]
    fn debug_format() {
        let store = MemoryStore::new("scratch");
        let debug = format!("{store:?}");
        assert!(debug.contains("MemoryStore"));
        assert!(debug.contains("scratch"));
    }
}
