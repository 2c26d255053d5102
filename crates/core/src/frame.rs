//! Fixed-length frame encoding and decoding.
//!
//! Every request and response on the settings channel is a 17-byte frame:
//!
//! ```text
//! [header][command][data 0..14][checksum]
//!    0        1       2..=15       16
//! ```
//!
//! The checksum is `0x55 - sum(bytes[0..16])` with 8-bit wraparound. The same
//! function guards each paired setting inside the register map.

use crate::error::{Error, Result};

/// Frame header; doubles as the HID output report id.
pub const HEADER: u8 = 0x08;

/// Total frame length including header and checksum.
pub const FRAME_LEN: usize = 17;

/// Number of data bytes between the command byte and the checksum.
pub const DATA_LEN: usize = 14;

/// Offset of the first data byte within a frame.
pub const DATA_OFFSET: usize = 2;

/// Seed of the checksum scheme.
const CHECKSUM_SEED: u8 = 0x55;

/// Compute `(0x55 - sum(values)) mod 256`.
pub fn checksum(values: &[u8]) -> u8 {
    let sum = values.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    CHECKSUM_SEED.wrapping_sub(sum)
}

/// An immutable, checksummed 17-byte frame.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame {
    bytes: [u8; FRAME_LEN],
}

impl Frame {
    /// Build a frame from a command byte and up to 14 data bytes.
    ///
    /// Unused data positions are zero-filled. `data[i]` lands at frame
    /// position `i + 2`.
    pub fn encode(command: u8, data: &[u8]) -> Result<Self> {
        if data.len() > DATA_LEN {
            return Err(Error::InvalidValue {
                field: "frame data",
                reason: format!("{} bytes exceeds the {DATA_LEN}-byte limit", data.len()),
            });
        }

        let mut bytes = [0u8; FRAME_LEN];
        bytes[0] = HEADER;
        bytes[1] = command;
        bytes[DATA_OFFSET..DATA_OFFSET + data.len()].copy_from_slice(data);
        bytes[FRAME_LEN - 1] = checksum(&bytes[..FRAME_LEN - 1]);
        Ok(Self { bytes })
    }

    /// Build a frame by writing selected frame positions (2..=15).
    ///
    /// Mirrors how requests are usually described: "start address at
    /// position 4, length at position 5".
    pub fn with_fields(command: u8, fields: &[(usize, u8)]) -> Result<Self> {
        let mut data = [0u8; DATA_LEN];
        for &(position, value) in fields {
            if !(DATA_OFFSET..DATA_OFFSET + DATA_LEN).contains(&position) {
                return Err(Error::InvalidValue {
                    field: "frame position",
                    reason: format!("position {position} is outside the data area 2..=15"),
                });
            }
            data[position - DATA_OFFSET] = value;
        }
        Self::encode(command, &data)
    }

    /// Validate raw bytes as a frame.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() != FRAME_LEN {
            return Err(Error::Format(format!("expected {FRAME_LEN} bytes, got {}", raw.len())));
        }

        let expected = checksum(&raw[..FRAME_LEN - 1]);
        let actual = raw[FRAME_LEN - 1];
        if expected != actual {
            return Err(Error::Format(format!(
                "checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}"
            )));
        }

        let mut bytes = [0u8; FRAME_LEN];
        bytes.copy_from_slice(raw);
        Ok(Self { bytes })
    }

    pub fn header(&self) -> u8 {
        self.bytes[0]
    }

    pub fn command(&self) -> u8 {
        self.bytes[1]
    }

    /// The 14 data bytes (frame positions 2..=15).
    pub fn data(&self) -> &[u8] {
        &self.bytes[DATA_OFFSET..DATA_OFFSET + DATA_LEN]
    }

    /// Byte at an absolute frame position.
    ///
    /// # Panics
    ///
    /// Panics if `position` is not below [`FRAME_LEN`].
    pub fn byte(&self, position: usize) -> u8 {
        self.bytes[position]
    }

    pub fn checksum(&self) -> u8 {
        self.bytes[FRAME_LEN - 1]
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Frame({:02X?})", self.bytes)
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}
