//! Ingestion server for tapr.
//!
//! Clients stage a file with `push_prepare`, stream its bytes as a chunked
//! body with `push`, and may watch a once-per-interval heartbeat with
//! `push_log`. The [`IoServer`] implements these operations over any
//! [`tapr_store::Store`]; the HTTP surface in [`router`] exposes them along
//! with the media changer.

pub mod config;
pub mod error;
pub mod handler;
pub mod heartbeat;
pub mod push;
pub mod reader;
pub mod router;
pub mod server;
pub mod table;

pub use config::{PushConfig, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use handler::{ApiError, AppState};
pub use push::IoServer;
pub use reader::{ChunkStreamReader, StreamItem};
pub use server::TaprServer;
pub use table::{AttachError, RemovedEntry, TxEntry, TxTable};
