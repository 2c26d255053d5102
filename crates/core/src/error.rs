//! Error types for pulsar-core.

use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HID device communication failure.
    #[error("HID error: {0}")]
    Hid(String),

    /// Device not found during enumeration, or the handle was already closed.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Permission denied (udev rules missing, or interface held by another process).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Received frame has the wrong length or a bad trailing checksum.
    #[error("malformed frame: {0}")]
    Format(String),

    /// Well-formed frame whose command has no structured decoder.
    #[error("no structured decoder for command 0x{command:02X}")]
    UnsupportedDecode { command: u8 },

    /// Unrecognized sub-selector or shape within a decodable command.
    #[error("cannot decode frame: {0}")]
    Decode(String),

    /// Value outside the domain of a codec or setting.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// DPI value that is not a multiple of the 50-unit step.
    #[error("DPI {dpi} is not a multiple of {step}")]
    Alignment { dpi: u32, step: u32 },

    /// Raw register bytes that no valid value encodes to.
    #[error("invalid encoding for {field}: {raw:02X?}")]
    InvalidEncoding { field: &'static str, raw: Vec<u8> },

    /// Device echo disagrees with what was requested.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Register read before any bulk read covered the address.
    #[error("register 0x{address:02X} not populated; run a bulk read first")]
    NotPopulated { address: u8 },

    /// Register write spanning an invalid address range.
    #[error("invalid register range: {0}")]
    InvalidRange(String),

    /// No frame arrived within the read timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Only non-matching frames arrived within the discard budget.
    #[error("no matching reply for command 0x{command:02X} after discarding {discarded} frames")]
    NoMatch { command: u8, discarded: usize },

    /// Snapshot or configuration (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
