use async_trait::async_trait;

use crate::error::ChangerResult;
use crate::types::{Location, StatusMap};

/// An automated media changer.
///
/// Implementations must be safe for concurrent use. The hardware serializes
/// physical moves, but many logical callers may request moves at once.
#[async_trait]
pub trait Changer: Send + Sync {
    /// Move media from `src` to `dst`. Both must be storage slots.
    async fn transfer(&self, src: Location, dst: Location) -> ChangerResult<()>;

    /// Move media from `src` into a data-transfer slot. With `dst` unset the
    /// volume is loaded into the first empty data-transfer slot.
    async fn load(&self, src: Location, dst: Option<Location>) -> ChangerResult<()>;

    /// Move media out of the data-transfer slot `src`. With `dst` unset the
    /// volume returns to its home slot.
    async fn unload(&self, src: Location, dst: Option<Location>) -> ChangerResult<()>;

    /// Every slot grouped by category.
    async fn status(&self) -> ChangerResult<StatusMap>;
}
