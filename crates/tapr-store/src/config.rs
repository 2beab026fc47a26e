use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for a single store instance.
///
/// Which fields are required depends on the backend: `fs` needs `root`,
/// `memory` needs nothing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Name of the store instance, used in logs.
    pub name: String,
    /// Registered backend kind.
    pub backend: String,
    /// Root directory for file-backed stores.
    pub root: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "primary".into(),
            backend: "memory".into(),
            root: None,
        }
    }
}
