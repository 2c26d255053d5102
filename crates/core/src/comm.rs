//! Device communication layer with error handling and retry logic.
//!
//! Classifies errors so callers can tell a busy device from an unplugged one,
//! and retries idempotent queries after transient failures.

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::payload::Request;
use crate::transport::{exchange, FrameTransport};
use tracing::{debug, warn};

/// Maximum retry attempts for transient errors.
pub const MAX_RETRIES: u32 = 3;

/// Classification of communication errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Timed out or lost among unsolicited frames; may succeed on retry.
    Transient,
    /// Device is unplugged or the handle was closed.
    Disconnected,
    /// The OS refused access to the HID node (udev rules, exclusive access).
    PermissionDenied,
    /// The device answered with something it should not have.
    Desync,
    /// Caller-supplied value or cache state was rejected before any I/O.
    InvalidInput,
    /// No structured decoder for the frame, or a host-side failure.
    Unsupported,
}

impl ErrorClass {
    /// Classify an error for retry decisions.
    pub fn classify(err: &Error) -> Self {
        match err {
            Error::Timeout(_) | Error::NoMatch { .. } => Self::Transient,
            Error::DeviceNotFound(_) => Self::Disconnected,
            Error::PermissionDenied(_) => Self::PermissionDenied,
            Error::ProtocolViolation(_) | Error::Format(_) | Error::Decode(_) => Self::Desync,
            Error::InvalidValue { .. }
            | Error::Alignment { .. }
            | Error::InvalidEncoding { .. }
            | Error::InvalidRange(_)
            | Error::NotPopulated { .. } => Self::InvalidInput,
            Error::UnsupportedDecode { .. } | Error::Serialization(_) => Self::Unsupported,
            Error::Hid(msg) => {
                let lower = msg.to_lowercase();
                if lower.contains("disconnect")
                    || lower.contains("not found")
                    || lower.contains("no such device")
                {
                    Self::Disconnected
                } else if lower.contains("permission") || lower.contains("access denied") {
                    Self::PermissionDenied
                } else if lower.contains("timeout") || lower.contains("timed out") {
                    Self::Transient
                } else {
                    Self::Unsupported
                }
            }
        }
    }

    /// Whether this error class is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// Exchange a request with automatic retry for transient errors.
///
/// Only use this for requests that are safe to repeat (queries); every
/// attempt flushes stale input first.
pub fn send_with_retry(
    transport: &dyn FrameTransport,
    config: &SessionConfig,
    request: &Request,
    max_retries: u32,
) -> Result<Frame> {
    let mut attempt = 0;
    loop {
        match exchange(transport, config, request) {
            Ok(frame) => {
                if attempt > 0 {
                    debug!(?request, attempt = attempt + 1, "Request succeeded after retry");
                }
                return Ok(frame);
            }
            Err(e) => {
                let class = ErrorClass::classify(&e);
                if !class.is_retryable() || attempt == max_retries {
                    warn!(
                        ?request,
                        ?class,
                        attempt = attempt + 1,
                        max = max_retries + 1,
                        error = %e,
                        "Request failed"
                    );
                    return Err(e);
                }
                debug!(
                    ?request,
                    attempt = attempt + 1,
                    max = max_retries + 1,
                    error = %e,
                    "Transient error, retrying"
                );
                attempt += 1;
            }
        }
    }
}

/// Device connection status for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Handle open and the mouse reports itself online.
    Online,
    /// Handle open but the mouse is asleep or out of dongle range.
    Offline,
    /// Device is not found or disconnected.
    Disconnected,
    /// Permission denied; udev rules are probably missing.
    PermissionError,
    /// Communication error (transient or protocol).
    Error,
}

/// Check device connectivity with a status query.
pub fn check_device_status(transport: &dyn FrameTransport, config: &SessionConfig) -> DeviceStatus {
    match send_with_retry(transport, config, &Request::Status, MAX_RETRIES) {
        Ok(frame) => match frame.byte(crate::payload::positions::VALUE) {
            1 => DeviceStatus::Online,
            0 => DeviceStatus::Offline,
            other => {
                warn!(raw = other, "Unexpected online flag");
                DeviceStatus::Error
            }
        },
        Err(ref e) => match ErrorClass::classify(e) {
            ErrorClass::Disconnected => DeviceStatus::Disconnected,
            ErrorClass::PermissionDenied => DeviceStatus::PermissionError,
            _ => DeviceStatus::Error,
        },
    }
}
