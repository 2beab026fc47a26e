use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tapr_types::PathName;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{FileHandle, OpenFlags, Store};

/// Store backed by regular files below a root directory.
///
/// Parent directories are not created implicitly: opening `a/b.tar` fails
/// with [`StoreError::NotFound`] unless `a/` already exists.
#[derive(Debug)]
pub struct FsStore {
    name: String,
    root: PathBuf,
}

impl FsStore {
    pub const BACKEND: &'static str = "fs";

    /// Create a store rooted at `root`, which must be an existing directory.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::InvalidConfig(format!(
                "store root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            name: name.into(),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of `name` inside this store.
    pub fn resolve(&self, name: &PathName) -> PathBuf {
        name.components().fold(self.root.clone(), |p, c| p.join(c))
    }
}

fn map_open_error(name: &PathName, err: io::Error) -> StoreError {
    match err.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound(name.clone()),
        io::ErrorKind::PermissionDenied => StoreError::PermissionDenied(name.clone()),
        _ => StoreError::Io(err),
    }
}

#[async_trait]
impl Store for FsStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> &'static str {
        Self::BACKEND
    }

    async fn open_file(&self, name: &PathName, flags: OpenFlags) -> StoreResult<Box<dyn FileHandle>> {
        flags.validate()?;
        let path = self.resolve(name);

        let file = OpenOptions::new()
            .write(true)
            .create(flags.create)
            .append(flags.append)
            .truncate(flags.truncate)
            .open(&path)
            .await
            .map_err(|e| map_open_error(name, e))?;

        debug!(store = %self.name, path = %path.display(), flags = %flags, "file opened");

        Ok(Box::new(FsHandle {
            name: name.clone(),
            file,
        }))
    }
}

struct FsHandle {
    name: PathName,
    file: File,
}

#[async_trait]
impl FileHandle for FsHandle {
    async fn write(&mut self, buf: &[u8]) -> StoreResult<usize> {
        Ok(self.file.write(buf).await?)
    }

    async fn close(mut self: Box<Self>) -> StoreResult<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        debug!(name = %self.name, "file closed");
        Ok(())
    }
}
