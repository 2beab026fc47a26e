use tapr_types::{PathName, TypeError};

/// Errors from storage backend operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The named file, or one of its parent directories, does not exist.
    #[error("not found: {0}")]
    NotFound(PathName),

    /// The backend refused access to the named file.
    #[error("permission denied: {0}")]
    PermissionDenied(PathName),

    /// Append and truncate were both requested.
    #[error("invalid open flags: {0}")]
    InvalidFlags(String),

    /// The destination name failed validation.
    #[error("invalid path: {0}")]
    InvalidPath(#[from] TypeError),

    /// A backend kind was registered twice.
    #[error("store backend already registered: {0}")]
    AlreadyRegistered(String),

    /// No constructor is registered for the requested backend kind.
    #[error("unknown store backend type: {0}")]
    UnknownBackend(String),

    /// The backend configuration is incomplete or inconsistent.
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),

    /// A backend-specific failure that is not an I/O error.
    #[error("backend failure: {0}")]
    Backend(String),

    /// I/O error from the underlying storage medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
