//! Settings snapshot consumed by front ends (CLI, tray, notification daemon).

use crate::codec::LedEffect;
use crate::device::PollingRate;
use crate::error::{Error, Result};
use crate::payload::PowerDetails;
use serde::{Deserialize, Serialize};

/// Everything a front end displays, gathered in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    pub active_profile: u8,
    pub active_dpi_mode: u8,
    pub dpi_modes: Vec<DpiModeSettings>,
    pub polling_rate_hz: PollingRate,
    pub led: LedSettings,
    pub lod: LodSettings,
    pub motion_sync_enabled: bool,
    pub angle_snapping_enabled: bool,
    pub autosleep_seconds: u32,
    pub debounce_milliseconds: u8,
    pub power: PowerSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpiModeSettings {
    pub dpi_mode: u8,
    pub dpi: u32,
    /// `#rrggbb`
    pub led_color: String,
}

/// LED block. `effect` is absent while the LED is disabled; `brightness`
/// only accompanies a steady effect and `breathe_speed` a breathing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedSettings {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub effect: Option<LedEffect>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub brightness: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub breathe_speed: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LodSettings {
    pub mm: u8,
    pub ripple_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerSettings {
    pub connected: bool,
    pub battery_percent: u8,
    pub battery_millivolts: u16,
}

impl From<PowerDetails> for PowerSettings {
    fn from(power: PowerDetails) -> Self {
        Self {
            connected: power.power_connected,
            battery_percent: power.battery_percent,
            battery_millivolts: power.battery_millivolts,
        }
    }
}

impl SettingsSnapshot {
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}
