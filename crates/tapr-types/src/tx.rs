use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Length in bytes of a transaction identifier on the wire.
pub const TX_LEN: usize = 16;

/// Opaque transaction identifier.
///
/// A `Tx` is generated server-side when a push is prepared and must be
/// re-supplied by the client as the first [`TX_LEN`] bytes of the push body
/// and in every push log request. Identifiers come from the thread-local
/// CSPRNG, so collisions are negligible.
///
/// Human-readable formats (JSON, TOML) carry the hex form; binary formats
/// carry the raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tx([u8; TX_LEN]);

impl Tx {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TX_LEN];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_raw(bytes: [u8; TX_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a byte slice that must be exactly [`TX_LEN`] long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; TX_LEN] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: TX_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; TX_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 32-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tx({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Tx {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Tx {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::from_hex(&s).map_err(de::Error::custom)
        } else {
            <[u8; TX_LEN]>::deserialize(deserializer).map(Self)
        }
    }
}

impl From<[u8; TX_LEN]> for Tx {
    fn from(bytes: [u8; TX_LEN]) -> Self {
        Self(bytes)
    }
}
