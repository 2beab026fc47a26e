use std::fmt;

use serde::{Deserialize, Serialize};
use tapr_store::StoreError;

/// Broad classification of an application error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// The request was malformed or named something unacceptable.
    Invalid,
    /// The item already exists.
    Exist,
    /// The item does not exist.
    NotExist,
    /// The item is in use by another call.
    Busy,
    /// Permission was denied by the backend.
    Permission,
    /// The backend reported an I/O fault.
    Io,
    /// An operation did not finish in time.
    Timeout,
    /// The call was cancelled before it could do its work.
    Cancelled,
    /// Anything else.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Invalid => "invalid",
            Self::Exist => "exist",
            Self::NotExist => "not-exist",
            Self::Busy => "busy",
            Self::Permission => "permission",
            Self::Io => "io",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Serialized application error embedded in a successful response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub kind: ErrorKind,
    pub message: String,
}

impl WireError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for WireError {}

impl From<&StoreError> for WireError {
    fn from(err: &StoreError) -> Self {
        let kind = match err {
            StoreError::NotFound(_) => ErrorKind::NotExist,
            StoreError::PermissionDenied(_) => ErrorKind::Permission,
            StoreError::InvalidFlags(_)
            | StoreError::InvalidPath(_)
            | StoreError::InvalidConfig(_) => ErrorKind::Invalid,
            StoreError::AlreadyRegistered(_) => ErrorKind::Exist,
            StoreError::UnknownBackend(_) => ErrorKind::NotExist,
            StoreError::Io(_) => ErrorKind::Io,
            StoreError::Backend(_) => ErrorKind::Io,
        };
        Self::new(kind, err.to_string())
    }
}
