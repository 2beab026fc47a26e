use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::ChangerConfig;
use crate::error::{ChangerError, ChangerResult};
use crate::traits::Changer;
use crate::types::{Location, Slot, SlotCategory, StatusMap, Volume};

/// In-memory model of a tape library.
///
/// Every move takes the library lock for its full duration, including the
/// configured move delay, so concurrent callers are serialized the way the
/// robot arm serializes them.
pub struct SimulatedChanger {
    slots: Mutex<BTreeMap<Location, Option<Volume>>>,
    move_delay: Duration,
}

impl SimulatedChanger {
    pub const BACKEND: &'static str = "simulated";

    pub fn from_config(cfg: &ChangerConfig) -> ChangerResult<Self> {
        if cfg.volumes.len() > cfg.storage_slots as usize {
            return Err(ChangerError::InvalidConfig(format!(
                "{} volumes do not fit in {} storage slots",
                cfg.volumes.len(),
                cfg.storage_slots
            )));
        }
        if cfg.transfer_slots == 0 {
            return Err(ChangerError::InvalidConfig(
                "at least one data-transfer slot is required".into(),
            ));
        }

        let mut slots = BTreeMap::new();
        for addr in 0..cfg.storage_slots {
            let loc = Location::storage(addr);
            let volume = cfg
                .volumes
                .get(addr as usize)
                .map(|serial| Volume::new(serial.clone(), Some(loc)));
            slots.insert(loc, volume);
        }
        for addr in 0..cfg.import_export_slots {
            slots.insert(Location::import_export(addr), None);
        }
        for addr in 0..cfg.transfer_slots {
            slots.insert(Location::transfer(addr), None);
        }

        Ok(Self {
            slots: Mutex::new(slots),
            move_delay: Duration::from_millis(cfg.move_delay_ms),
        })
    }

    fn expect_category(location: Location, expected: SlotCategory) -> ChangerResult<()> {
        if location.category != expected {
            return Err(ChangerError::WrongCategory { location, expected });
        }
        Ok(())
    }

    /// Move the volume in `src` to `dst` while holding the library lock.
    async fn move_volume(
        &self,
        slots: &mut BTreeMap<Location, Option<Volume>>,
        src: Location,
        dst: Location,
    ) -> ChangerResult<()> {
        match slots.get(&dst) {
            None => return Err(ChangerError::NoSuchSlot(dst)),
            Some(Some(_)) => return Err(ChangerError::DestinationOccupied(dst)),
            Some(None) => {}
        }
        let volume = slots
            .get_mut(&src)
            .ok_or(ChangerError::NoSuchSlot(src))?
            .take()
            .ok_or(ChangerError::SourceEmpty(src))?;

        if !self.move_delay.is_zero() {
            tokio::time::sleep(self.move_delay).await;
        }

        debug!(serial = %volume.serial, %src, %dst, "volume moved");
        slots.insert(dst, Some(volume));
        Ok(())
    }

    fn first_empty(
        slots: &BTreeMap<Location, Option<Volume>>,
        category: SlotCategory,
    ) -> ChangerResult<Location> {
        slots
            .iter()
            .find(|(loc, vol)| loc.category == category && vol.is_none())
            .map(|(loc, _)| *loc)
            .ok_or(ChangerError::NoFreeSlot(category))
    }
}

#[async_trait]
impl Changer for SimulatedChanger {
    async fn transfer(&self, src: Location, dst: Location) -> ChangerResult<()> {
        Self::expect_category(src, SlotCategory::Storage)?;
        Self::expect_category(dst, SlotCategory::Storage)?;
        let mut slots = self.slots.lock().await;
        self.move_volume(&mut slots, src, dst).await
    }

    async fn load(&self, src: Location, dst: Option<Location>) -> ChangerResult<()> {
        let mut slots = self.slots.lock().await;
        let dst = match dst {
            Some(dst) => {
                Self::expect_category(dst, SlotCategory::DataTransfer)?;
                dst
            }
            None => Self::first_empty(&slots, SlotCategory::DataTransfer)?,
        };
        self.move_volume(&mut slots, src, dst).await?;
        info!(%src, %dst, "volume loaded");
        Ok(())
    }

    async fn unload(&self, src: Location, dst: Option<Location>) -> ChangerResult<()> {
        Self::expect_category(src, SlotCategory::DataTransfer)?;
        let mut slots = self.slots.lock().await;
        let dst = match dst {
            Some(dst) => dst,
            None => slots
                .get(&src)
                .ok_or(ChangerError::NoSuchSlot(src))?
                .as_ref()
                .ok_or(ChangerError::SourceEmpty(src))?
                .home
                .ok_or(ChangerError::NoHomeSlot(src))?,
        };
        self.move_volume(&mut slots, src, dst).await?;
        info!(%src, %dst, "volume unloaded");
        Ok(())
    }

    async fn status(&self) -> ChangerResult<StatusMap> {
        let slots = self.slots.lock().await;
        let mut status = StatusMap::new();
        for (location, volume) in slots.iter() {
            status.entry(location.category).or_default().push(Slot {
                location: *location,
                volume: volume.clone(),
            });
        }
        Ok(status)
    }
}

impl std::fmt::Debug for SimulatedChanger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedChanger")
            .field("move_delay", &self.move_delay)
            .finish_non_exhaustive()
    }
}
