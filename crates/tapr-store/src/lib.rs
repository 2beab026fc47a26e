//! Pluggable storage backends for tapr.
//!
//! The ingestion core only needs one capability from a backend: open a named
//! file for writing and get back a handle that accepts bytes and can be closed.
//! That capability is the [`Store`] trait; handles implement [`FileHandle`].
//!
//! # Storage Backends
//!
//! - [`MemoryStore`] (`"memory"`) -- in-process files for tests and demos
//! - [`FsStore`] (`"fs"`) -- regular files below a root directory
//!
//! Backends are constructed by kind through an explicit [`StoreRegistry`]
//! built at startup; there is no process-wide registration table.
//!
//! # Design Rules
//!
//! 1. Append and truncate are mutually exclusive open modes.
//! 2. A handle is consumed by `close`, so it can be closed at most once.
//! 3. Backends must tolerate interleaved writes to different handles.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod config;
pub mod error;
pub mod fs;
pub mod memory;
pub mod registry;
pub mod traits;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use fs::FsStore;
pub use memory::MemoryStore;
pub use registry::{StoreConstructor, StoreRegistry};
pub use traits::{FileHandle, OpenFlags, Store};
