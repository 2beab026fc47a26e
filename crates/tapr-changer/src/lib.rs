//! Automated media changer abstraction for tapr.
//!
//! A changer physically relocates tape volumes between slots. Slots come in
//! three [`SlotCategory`]s: storage slots holding idle volumes, import/export
//! slots for operator access, and data-transfer slots (drives).
//!
//! The ingestion path never drives the changer itself; the volume allocation
//! layer does, and relies on one guarantee: once [`Changer::load`] succeeds,
//! the volume is mounted and the store backed by that drive may open files.
//!
//! Implementations are selected by configuration through a
//! [`ChangerRegistry`]:
//!
//! - [`SimulatedChanger`] (`"simulated"`) -- in-memory library model

pub mod config;
pub mod error;
pub mod registry;
pub mod simulated;
pub mod traits;
pub mod types;

pub use config::ChangerConfig;
pub use error::{ChangerError, ChangerResult};
pub use registry::{ChangerConstructor, ChangerRegistry};
pub use simulated::SimulatedChanger;
pub use traits::Changer;
pub use types::{Location, Slot, SlotCategory, Slots, StatusMap, Volume};
