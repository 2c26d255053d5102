//! Sparse, process-local mirror of the device's settings memory.
//!
//! The map is populated by [`RegisterMap::bulk_read`] and kept current by
//! write-through in [`RegisterMap::write`]. Register writes are trusted once
//! the device sends any reply; their acknowledgements do not echo the data.

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::frame::checksum;
use crate::payload::{positions, Command, Request, MAX_MEMORY_SPAN};
use crate::registers::{self, Setting, SWEEP_WINDOW};
use crate::transport::{
    clear_stale_reads, read_matching, receive_frame, send_request, FrameTransport,
};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterMap {
    values: BTreeMap<u8, u8>,
}

impl RegisterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value of one register.
    pub fn get(&self, address: u8) -> Result<u8> {
        self.values
            .get(&address)
            .copied()
            .ok_or(Error::NotPopulated { address })
    }

    /// Cached value bytes of a setting, in address order.
    pub fn get_setting<const N: usize>(&self, setting: Setting) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        for (slot, address) in out.iter_mut().zip(setting.value_addresses()) {
            *slot = self.get(address)?;
        }
        Ok(out)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Forget everything; the next read of any register fails until the
    /// next bulk read.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Drop the cached bytes of one setting after the device changed it on
    /// its own.
    pub fn invalidate(&mut self, setting: Setting) {
        for address in setting.value_addresses() {
            self.values.remove(&address);
        }
        self.values.remove(&setting.checksum_address());
    }

    /// Sweep the settings region in 10-byte windows and replace the cache.
    ///
    /// Each reply must echo the requested start address and length. Any
    /// mismatch or timeout aborts the sweep and leaves the cache untouched.
    pub fn bulk_read(
        &mut self,
        transport: &dyn FrameTransport,
        config: &SessionConfig,
    ) -> Result<()> {
        clear_stale_reads(transport, config)?;

        let mut values = BTreeMap::new();
        for start in registers::sweep_windows() {
            let request = Request::MemoryRead {
                start,
                length: SWEEP_WINDOW,
            };
            send_request(transport, &request)?;
            let frame = read_matching(transport, config, Command::MemoryRead)?;

            let echoed_start = frame.byte(positions::ADDRESS);
            let echoed_length = frame.byte(positions::LENGTH);
            if echoed_start != start || echoed_length != SWEEP_WINDOW {
                return Err(Error::ProtocolViolation(format!(
                    "memory read echoed start 0x{echoed_start:02X} length {echoed_length}, \
                     requested start 0x{start:02X} length {SWEEP_WINDOW}"
                )));
            }

            for offset in 0..SWEEP_WINDOW {
                let value = frame.byte(positions::VALUE + offset as usize);
                values.insert(start.wrapping_add(offset), value);
            }
            debug!(
                start = format_args!("0x{:02X}", start),
                "Memory window read"
            );
        }

        debug!(registers = values.len(), "Bulk read complete");
        self.values = values;
        Ok(())
    }

    /// Write 1..=10 contiguous registers and mirror them locally.
    ///
    /// Exactly one reply is read, of any command; its content is not
    /// verified.
    pub fn write(
        &mut self,
        transport: &dyn FrameTransport,
        config: &SessionConfig,
        addresses: &BTreeMap<u8, u8>,
    ) -> Result<()> {
        let (start, values) = contiguous_span(addresses)?;

        clear_stale_reads(transport, config)?;
        send_request(transport, &Request::MemoryWrite { start, values })?;
        let reply = receive_frame(transport, config.read_timeout)?;
        debug!(
            start = format_args!("0x{:02X}", start),
            count = addresses.len(),
            reply_command = format_args!("0x{:02X}", reply.command()),
            "Memory write acknowledged"
        );

        self.values.extend(addresses);
        Ok(())
    }

    /// Write a setting's value bytes together with its checksum byte.
    pub fn write_setting(
        &mut self,
        transport: &dyn FrameTransport,
        config: &SessionConfig,
        setting: Setting,
        values: &[u8],
    ) -> Result<()> {
        let addresses = setting_addresses(setting, values)?;
        self.write(transport, config, &addresses)
    }
}

/// Address→value pairs for a setting's values plus its checksum.
pub fn setting_addresses(setting: Setting, values: &[u8]) -> Result<BTreeMap<u8, u8>> {
    if values.len() != setting.width as usize {
        return Err(Error::InvalidValue {
            field: setting.name,
            reason: format!("expected {} bytes, got {}", setting.width, values.len()),
        });
    }
    let pairs = setting.value_addresses().zip(values.iter().copied());
    let mut addresses: BTreeMap<u8, u8> = pairs.collect();
    addresses.insert(setting.checksum_address(), checksum(values));
    Ok(addresses)
}

/// Validate that `addresses` is 1..=10 consecutive registers and return the
/// start address plus the values in order.
fn contiguous_span(addresses: &BTreeMap<u8, u8>) -> Result<(u8, Vec<u8>)> {
    let count = addresses.len();
    if !(1..=MAX_MEMORY_SPAN).contains(&count) {
        return Err(Error::InvalidRange(format!(
            "{count} addresses; a write covers 1..={MAX_MEMORY_SPAN}"
        )));
    }

    // Keys iterate in ascending order.
    let mut keys = addresses.keys().copied();
    let start = keys.next().unwrap_or_default();
    for (offset, address) in keys.enumerate() {
        if address as usize != start as usize + offset + 1 {
            return Err(Error::InvalidRange(format!(
                "address 0x{address:02X} breaks the run starting at 0x{start:02X}"
            )));
        }
    }
    Ok((start, addresses.values().copied().collect()))
}
