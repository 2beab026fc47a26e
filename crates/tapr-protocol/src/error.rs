use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("chunk too large: {size} bytes (max {max})")]
    ChunkTooLarge { size: usize, max: usize },

    #[error("stream truncated while reading {what}: got {actual} of {expected} bytes")]
    Truncated {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether this error means the transport went away rather than that the
    /// peer sent malformed data.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
