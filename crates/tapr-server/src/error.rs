use tapr_changer::ChangerError;
use tapr_protocol::{ErrorKind, WireError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid name: {0}")]
    InvalidName(#[from] tapr_types::TypeError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("push cancelled before the transaction id was read")]
    Cancelled,

    #[error("protocol error: {0}")]
    Protocol(#[from] tapr_protocol::ProtocolError),

    #[error("store error: {0}")]
    Store(#[from] tapr_store::StoreError),

    #[error("changer error: {0}")]
    Changer(#[from] ChangerError),

    #[error("no changer configured")]
    NoChanger,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// The error as reported to a client.
    pub fn to_wire(&self) -> WireError {
        let kind = match self {
            Self::InvalidName(_) | Self::InvalidRequest(_) | Self::Protocol(_) => ErrorKind::Invalid,
            Self::Store(e) => return WireError::from(e),
            Self::Changer(e) => match e {
                ChangerError::NoSuchSlot(_) => ErrorKind::NotExist,
                ChangerError::WrongCategory { .. } => ErrorKind::Invalid,
                ChangerError::SourceEmpty(_) | ChangerError::NoHomeSlot(_) => ErrorKind::NotExist,
                ChangerError::DestinationOccupied(_) | ChangerError::NoFreeSlot(_) => ErrorKind::Busy,
                _ => ErrorKind::Internal,
            },
            Self::NoChanger => ErrorKind::NotExist,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Io(_) => ErrorKind::Io,
            Self::Config(_) | Self::Internal(_) => ErrorKind::Internal,
        };
        WireError::new(kind, self.to_string())
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
