//! Safety layer: validates caller-supplied setting values before any frame
//! is built.
//!
//! # X2V2 Mini bounds
//!
//! ## DPI
//! - **Range**: 50 – 26,000, in 50-unit steps (checked by
//!   [`crate::codec::dpi_to_raw`])
//!
//! ## DPI mode slots
//! - **Range**: 0–3; four slots each hold a DPI value and an LED color
//!
//! ## Lift-off distance
//! - **Range**: 1–2 mm
//!
//! ## Onboard profiles
//! - **Range**: 0–3
//!
//! ## Safety invariants
//! 1. Out-of-range values are rejected, never clamped or rounded
//! 2. Only known polling rate enum values are accepted (no raw Hz pass-through)
//! 3. All validation happens BEFORE any frame is written

use crate::device::PollingRate;
use crate::error::{Error, Result};
use crate::registers::DPI_MODE_SLOTS;

/// Warning for any user-facing output about device writes.
pub const WRITE_DISCLAIMER: &str = "\
WARNING: This software writes directly to your mouse's settings memory. \
Every write is range-checked and checksummed, but a firmware that disagrees \
with a stored value may behave unexpectedly until restored to defaults.";

pub const LOD_MM_MIN: u8 = 1;
pub const LOD_MM_MAX: u8 = 2;

pub const PROFILE_COUNT: u8 = 4;

fn out_of_range(field: &'static str, value: u32, min: u32, max: u32) -> Error {
    Error::InvalidValue {
        field,
        reason: format!("{value} outside {min}..={max}"),
    }
}

/// Validate a DPI mode slot index.
pub fn validate_mode_index(mode: u8) -> Result<u8> {
    if mode >= DPI_MODE_SLOTS {
        return Err(out_of_range("dpi_mode", mode as u32, 0, (DPI_MODE_SLOTS - 1) as u32));
    }
    Ok(mode)
}

/// Validate a lift-off distance in millimetres.
pub fn validate_lod_mm(mm: u8) -> Result<u8> {
    if !(LOD_MM_MIN..=LOD_MM_MAX).contains(&mm) {
        return Err(out_of_range("lod_mm", mm as u32, LOD_MM_MIN as u32, LOD_MM_MAX as u32));
    }
    Ok(mm)
}

/// Validate an LED brightness given in a wider type.
pub fn validate_led_brightness(value: u32) -> Result<u8> {
    u8::try_from(value).map_err(|_| out_of_range("led_brightness", value, 0, u8::MAX as u32))
}

/// Validate an onboard profile number.
pub fn validate_profile(profile: u8) -> Result<u8> {
    if profile >= PROFILE_COUNT {
        return Err(out_of_range("profile", profile as u32, 0, (PROFILE_COUNT - 1) as u32));
    }
    Ok(profile)
}

/// Validate a polling rate value.
pub fn validate_polling_rate(hz: u16) -> Result<PollingRate> {
    PollingRate::from_hz(hz).ok_or_else(|| Error::InvalidValue {
        field: "polling_rate",
        reason: format!("{hz} Hz is not one of 125, 250, 500, 1000"),
    })
}
