use serde::{Deserialize, Serialize};
use tapr_types::Tx;

use crate::wire_error::WireError;

pub const PROTOCOL_VERSION: u32 = 1;

/// Ask the server to open `name` for a new push transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPrepareRequest {
    pub name: String,
    /// Append to an existing file instead of truncating it.
    #[serde(default)]
    pub append: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPrepareResponse {
    pub tx: Tx,
}

/// Terminal result of a push body stream.
///
/// A push that reaches the server always gets a response; a backend failure
/// mid-stream is reported in `error`, not as a failed call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
    /// Bytes durably handed to the backend before the push ended.
    pub bytes_written: u64,
    /// The stream was cut off rather than ending at a chunk boundary.
    #[serde(default)]
    pub cancelled: bool,
}

impl PushResponse {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushLogRequest {
    pub tx: Tx,
}

/// One heartbeat on a push log stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushLogEntry {
    pub seq: i64,
}
