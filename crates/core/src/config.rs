//! Session configuration: read timeouts and the discard budget.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1000);
/// Default number of non-matching frames discarded before giving up.
pub const DEFAULT_MAX_DISCARDS: usize = 32;
/// Default timeout of each read while flushing stale input.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Timing and backpressure knobs passed into a [`crate::session::Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a single read waits for a frame.
    #[serde(rename = "read_timeout_ms", with = "millis")]
    pub read_timeout: Duration,
    /// How many unsolicited or mismatched frames a read may discard.
    pub max_discards: usize,
    /// Per-read timeout while clearing stale input.
    #[serde(rename = "drain_timeout_ms", with = "millis")]
    pub drain_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_discards: DEFAULT_MAX_DISCARDS,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.read_timeout.is_zero() {
            return Err(Error::InvalidValue {
                field: "read_timeout",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Parse a JSON configuration; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
