use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a changer slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlotCategory {
    /// Shelf slot holding an idle volume.
    Storage,
    /// Mail slot used by operators to insert or remove media.
    ImportExport,
    /// Drive slot where a volume is mounted for reading and writing.
    DataTransfer,
}

impl fmt::Display for SlotCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage => write!(f, "storage"),
            Self::ImportExport => write!(f, "import-export"),
            Self::DataTransfer => write!(f, "data-transfer"),
        }
    }
}

/// Address of a slot within a category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub category: SlotCategory,
    pub addr: u32,
}

impl Location {
    pub const fn new(category: SlotCategory, addr: u32) -> Self {
        Self { category, addr }
    }

    pub const fn storage(addr: u32) -> Self {
        Self::new(SlotCategory::Storage, addr)
    }

    pub const fn transfer(addr: u32) -> Self {
        Self::new(SlotCategory::DataTransfer, addr)
    }

    pub const fn import_export(addr: u32) -> Self {
        Self::new(SlotCategory::ImportExport, addr)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.addr)
    }
}

/// A tape cartridge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Barcode label.
    pub serial: String,
    /// Storage slot the volume returns to on unload.
    pub home: Option<Location>,
}

impl Volume {
    pub fn new(serial: impl Into<String>, home: Option<Location>) -> Self {
        Self {
            serial: serial.into(),
            home,
        }
    }
}

/// A slot and whatever volume it currently holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub location: Location,
    pub volume: Option<Volume>,
}

impl Slot {
    pub fn is_empty(&self) -> bool {
        self.volume.is_none()
    }
}

pub type Slots = Vec<Slot>;

/// Changer status: every slot grouped by category.
pub type StatusMap = BTreeMap<SlotCategory, Slots>;
