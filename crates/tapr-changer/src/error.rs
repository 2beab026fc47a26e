use crate::types::{Location, SlotCategory};

/// Errors from changer operations.
#[derive(Debug, thiserror::Error)]
pub enum ChangerError {
    /// The location does not name a slot in this library.
    #[error("no such slot: {0}")]
    NoSuchSlot(Location),

    /// The operation requires a slot of a different category.
    #[error("slot {location} is not a {expected} slot")]
    WrongCategory {
        location: Location,
        expected: SlotCategory,
    },

    /// The source slot holds no volume.
    #[error("source slot {0} is empty")]
    SourceEmpty(Location),

    /// The destination slot already holds a volume.
    #[error("destination slot {0} is occupied")]
    DestinationOccupied(Location),

    /// No empty slot of the category was available.
    #[error("no free {0} slot")]
    NoFreeSlot(SlotCategory),

    /// The volume has no home slot to return to.
    #[error("volume in {0} has no home slot")]
    NoHomeSlot(Location),

    /// A changer kind was registered twice.
    #[error("changer backend already registered: {0}")]
    AlreadyRegistered(String),

    /// No constructor is registered for the requested changer kind.
    #[error("unknown changer backend type: {0}")]
    UnknownBackend(String),

    /// The changer configuration is incomplete or inconsistent.
    #[error("invalid changer configuration: {0}")]
    InvalidConfig(String),
}

pub type ChangerResult<T> = Result<T, ChangerError>;
