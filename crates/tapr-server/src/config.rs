use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tapr_changer::ChangerConfig;
use tapr_protocol::DEFAULT_MAX_CHUNK_SIZE;
use tapr_store::StoreConfig;

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub push: PushConfig,
    pub store: StoreConfig,
    pub changer: Option<ChangerConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8420)),
            push: PushConfig::default(),
            store: StoreConfig::default(),
            changer: None,
        }
    }
}

impl ServerConfig {
    /// Load a TOML configuration file. Missing fields take their defaults.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.push.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }
}

/// Tuning for push transactions.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Capacity of the channel between a chunk reader and its writer.
    pub channel_capacity: usize,
    /// Upper bound on a single backend write.
    pub write_timeout_ms: u64,
    /// Interval between push log heartbeats.
    pub log_interval_ms: u64,
    /// Largest chunk payload accepted on a push body.
    pub max_chunk_size: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 16,
            write_timeout_ms: 30_000,
            log_interval_ms: 1_000,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
        }
    }
}

impl PushConfig {
    pub fn validate(&self) -> ServerResult<()> {
        if self.channel_capacity == 0 {
            return Err(ServerError::Config("push.channel_capacity must be positive".into()));
        }
        if self.log_interval_ms == 0 {
            return Err(ServerError::Config("push.log_interval_ms must be positive".into()));
        }
        if self.write_timeout_ms == 0 {
            return Err(ServerError::Config("push.write_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_millis(self.log_interval_ms)
    }
}
