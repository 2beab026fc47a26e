/// HTTP endpoint paths for the tapr protocol.
pub mod endpoints {
    pub const PUSH_PREPARE: &str = "/v1/push/prepare";
    pub const PUSH: &str = "/v1/push";
    pub const PUSH_LOG: &str = "/v1/push/log/:tx";
    pub const HEALTH: &str = "/v1/health";
    pub const INFO: &str = "/v1/info";
    pub const CHANGER_STATUS: &str = "/v1/changer/status";
    pub const CHANGER_TRANSFER: &str = "/v1/changer/transfer";
    pub const CHANGER_LOAD: &str = "/v1/changer/load";
    pub const CHANGER_UNLOAD: &str = "/v1/changer/unload";

    /// Concrete push log path for a transaction.
    pub fn push_log(tx: &tapr_types::Tx) -> String {
        format!("/v1/push/log/{}", tx.to_hex())
    }
}

/// Health check response.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub protocol_version: u32,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            protocol_version: super::message::PROTOCOL_VERSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapr_types::{Tx, TX_LEN};

    #[test]
    fn health_response_defaults() {
        let h = HealthResponse::default();
        assert_eq!(h.status, "ok");
        assert_eq!(h.protocol_version, 1);
    }

    #[test]
    fn push_log_path() {
        let tx = Tx::from_raw([0; TX_LEN]);
        assert_eq!(endpoints::push_log(&tx), format!("/v1/push/log/{}", "0".repeat(32)));
        assert!(endpoints::PUSH_LOG.starts_with("/v1/push/log/"));
    }
}
