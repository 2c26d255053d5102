//! Register addresses of the device's settings memory.
//!
//! Each setting is a run of value bytes followed by one checksum byte holding
//! `0x55 - sum(values)`. Addresses are stable across firmware revisions of the
//! X2V2 Mini.

use crate::error::Result;
use crate::safety;

/// A setting stored as consecutive value addresses plus a trailing checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    pub name: &'static str,
    /// First value address.
    pub address: u8,
    /// Number of value bytes (1..=3).
    pub width: u8,
}

impl Setting {
    pub const fn scalar(name: &'static str, address: u8) -> Self {
        Self {
            name,
            address,
            width: 1,
        }
    }

    pub const fn triple(name: &'static str, address: u8) -> Self {
        Self {
            name,
            address,
            width: 3,
        }
    }

    /// Value addresses in order.
    pub fn value_addresses(&self) -> impl Iterator<Item = u8> {
        self.address..self.address + self.width
    }

    pub fn checksum_address(&self) -> u8 {
        self.address + self.width
    }
}

pub const POLLING_RATE: Setting = Setting::scalar("polling_rate", 0x00);
pub const DPI_MODE_COUNT: Setting = Setting::scalar("dpi_mode_count", 0x02);
pub const DPI_MODE: Setting = Setting::scalar("dpi_mode", 0x04);
pub const LOD_MM: Setting = Setting::scalar("lod_mm", 0x0A);
pub const LED_EFFECT: Setting = Setting::scalar("led_effect", 0x4C);
pub const LED_BRIGHTNESS: Setting = Setting::scalar("led_brightness", 0x4E);
pub const LED_BREATHE_SPEED: Setting = Setting::scalar("led_breathe_speed", 0x50);
pub const LED_ENABLED: Setting = Setting::scalar("led_enabled", 0x52);
pub const DEBOUNCE_TIME: Setting = Setting::scalar("debounce_time", 0xA9);
pub const MOTION_SYNC: Setting = Setting::scalar("motion_sync", 0xAB);
pub const AUTOSLEEP_TIME: Setting = Setting::scalar("autosleep_time", 0xAD);
pub const ANGLE_SNAPPING: Setting = Setting::scalar("angle_snapping", 0xAF);
pub const LOD_RIPPLE: Setting = Setting::scalar("lod_ripple", 0xB1);

/// Number of DPI mode slots with dedicated registers.
pub const DPI_MODE_SLOTS: u8 = 4;

const MODE_DPI_BASE: u8 = 0x0C;
const MODE_LED_COLOR_BASE: u8 = 0x2C;
const MODE_STRIDE: u8 = 4;

/// DPI registers of a mode slot (0..=3).
pub fn mode_dpi(mode: u8) -> Result<Setting> {
    let mode = safety::validate_mode_index(mode)?;
    Ok(Setting::triple("dpi", MODE_DPI_BASE + mode * MODE_STRIDE))
}

/// LED color registers of a mode slot (0..=3).
pub fn mode_led_color(mode: u8) -> Result<Setting> {
    let mode = safety::validate_mode_index(mode)?;
    Ok(Setting::triple("led_color", MODE_LED_COLOR_BASE + mode * MODE_STRIDE))
}

/// First address of the bulk-read sweep.
pub const SWEEP_START: u8 = 0x00;
/// Last start address the sweep is anchored to; the sweep runs 10 bytes past it.
pub const SWEEP_MAX_ADDRESS: u8 = 0xB8;
/// Bytes per memory-read window.
pub const SWEEP_WINDOW: u8 = 10;

/// Start addresses of every bulk-read window.
pub fn sweep_windows() -> impl Iterator<Item = u8> {
    let end = SWEEP_MAX_ADDRESS as u16 + SWEEP_WINDOW as u16;
    (SWEEP_START as u16..=end)
        .step_by(SWEEP_WINDOW as usize)
        .map(|start| start as u8)
}
