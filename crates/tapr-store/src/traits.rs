use std::fmt;

use async_trait::async_trait;
use tapr_types::PathName;

use crate::error::{StoreError, StoreResult};

/// How a file is opened for writing.
///
/// Files are always opened write-only. `append` and `truncate` are mutually
/// exclusive; [`OpenFlags::validate`] rejects the combination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenFlags {
    /// Create the file if it does not exist.
    pub create: bool,
    /// Every write goes to the current end of the file.
    pub append: bool,
    /// Discard existing contents on open.
    pub truncate: bool,
}

impl OpenFlags {
    /// Flags for a push destination: always create, then either append to or
    /// truncate an existing file.
    pub fn for_push(append: bool) -> Self {
        Self {
            create: true,
            append,
            truncate: !append,
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.append && self.truncate {
            return Err(StoreError::InvalidFlags(
                "append and truncate are mutually exclusive".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for OpenFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec!["write"];
        if self.create {
            parts.push("create");
        }
        if self.append {
            parts.push("append");
        }
        if self.truncate {
            parts.push("truncate");
        }
        write!(f, "{}", parts.join("|"))
    }
}

/// An open, writable reference to a backend-resident file.
///
/// `close` consumes the handle: the type system guarantees a handle is
/// closed at most once. Dropping a handle without closing it releases the
/// underlying resource but skips any flush the backend performs on close.
#[async_trait]
pub trait FileHandle: Send + Sync {
    /// Write some prefix of `buf` and return how many bytes were accepted.
    async fn write(&mut self, buf: &[u8]) -> StoreResult<usize>;

    /// Flush and release the handle.
    async fn close(self: Box<Self>) -> StoreResult<()>;
}

/// A storage backend exposing the open-for-write capability.
///
/// Implementations must be safe for concurrent use: many push transactions
/// open and write different handles at the same time.
#[async_trait]
pub trait Store: Send + Sync + fmt::Debug {
    /// The configured name of this store instance.
    fn name(&self) -> &str;

    /// The backend kind this store was created from (`"memory"`, `"fs"`, ...).
    fn backend(&self) -> &'static str;

    /// Open `name` for writing with the given flags.
    async fn open_file(&self, name: &PathName, flags: OpenFlags) -> StoreResult<Box<dyn FileHandle>>;
}
