//! Wire protocol for tapr.
//!
//! Defines the push control messages, the chunk framing of push bodies,
//! and the serialized application error that push responses carry when a
//! backend write fails.

pub mod chunk;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod wire_error;

pub use chunk::{
    encode_chunk, read_chunk, read_tx, Chunk, PushBodyEncoder, CHUNK_HEADER_LEN,
    DEFAULT_MAX_CHUNK_SIZE,
};
pub use endpoint::{endpoints, HealthResponse};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    PushLogEntry, PushLogRequest, PushPrepareRequest, PushPrepareResponse, PushResponse,
    PROTOCOL_VERSION,
};
pub use wire_error::{ErrorKind, WireError};
