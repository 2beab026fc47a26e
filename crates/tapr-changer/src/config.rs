use serde::{Deserialize, Serialize};

/// Configuration for a changer instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangerConfig {
    /// Registered changer kind.
    pub backend: String,
    pub storage_slots: u32,
    pub import_export_slots: u32,
    pub transfer_slots: u32,
    /// Volume serials, placed into storage slots starting at address 0.
    pub volumes: Vec<String>,
    /// Simulated duration of one physical move.
    pub move_delay_ms: u64,
}

impl Default for ChangerConfig {
    fn default() -> Self {
        Self {
            backend: "simulated".into(),
            storage_slots: 8,
            import_export_slots: 1,
            transfer_slots: 2,
            volumes: Vec::new(),
            move_delay_ms: 0,
        }
    }
}
