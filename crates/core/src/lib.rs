//! pulsar-core: settings protocol, device discovery, and mouse configuration.
//!
//! This crate provides the core logic for configuring the Pulsar X2V2 Mini
//! over its vendor settings channel: 17-byte checksummed frames, a cached
//! mirror of the settings memory, and typed accessors on top of it.

pub mod codec;
pub mod comm;
pub mod config;
pub mod device;
pub mod error;
pub mod frame;
#[cfg(test)]
mod integration_tests;
pub mod payload;
pub mod register_map;
pub mod registers;
pub mod safety;
pub mod session;
pub mod settings;
pub mod transport;

/// Pulsar USB Vendor ID.
pub const PULSAR_VID: u16 = 0x3554;

/// Known X2V2 Mini product IDs.
pub mod pids {
    /// X2V2 Mini over USB cable.
    pub const X2V2_MINI_WIRED: u16 = 0xF507;
    /// X2V2 Mini through the 1 kHz wireless dongle.
    pub const X2V2_MINI_WIRELESS_1K: u16 = 0xF508;
}
