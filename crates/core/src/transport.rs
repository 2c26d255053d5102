//! Frame transport abstraction and request/reply helpers.
//!
//! The protocol is half-duplex: one request is outstanding at a time, and
//! the device may interleave unsolicited event frames with replies. The
//! helpers here flush stale input, filter replies by command with a bounded
//! discard budget, and validate every received frame.

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::payload::{Command, Request, Response};
use std::time::Duration;
use tracing::{debug, trace};

/// Abstraction over the raw byte-in/byte-out channel.
///
/// Implementations need no internal locking; callers serialize access.
pub trait FrameTransport: Send {
    /// Write one raw frame.
    fn write_frame(&self, data: &[u8]) -> Result<()>;

    /// Read one raw report, failing with [`Error::Timeout`] if nothing
    /// arrives within `timeout`.
    fn read_frame(&self, timeout: Duration) -> Result<Vec<u8>>;

    /// Whether the underlying device handle is still held.
    fn is_open(&self) -> bool {
        true
    }

    /// Release the device handle. Must be idempotent.
    fn close(&mut self) {}
}

/// Serialize and send a request.
pub fn send_request(transport: &dyn FrameTransport, request: &Request) -> Result<Frame> {
    let frame = request.to_frame()?;
    trace!(
        command = format_args!("0x{:02X}", frame.command()),
        frame_hex = format_args!("{:02X?}", frame.as_bytes()),
        "TX"
    );
    transport.write_frame(frame.as_bytes())?;
    Ok(frame)
}

/// Read and validate one frame.
pub fn receive_frame(transport: &dyn FrameTransport, timeout: Duration) -> Result<Frame> {
    let raw = transport.read_frame(timeout)?;
    let frame = Frame::decode(&raw)?;
    trace!(
        command = format_args!("0x{:02X}", frame.command()),
        frame_hex = format_args!("{:02X?}", frame.as_bytes()),
        "RX"
    );
    Ok(frame)
}

/// Drain frames left over from before the next request.
///
/// Stops at the first timeout, or after `max_discards` frames so a chatty
/// device cannot stall the caller forever. Returns the number drained.
pub fn clear_stale_reads(transport: &dyn FrameTransport, config: &SessionConfig) -> Result<usize> {
    let mut drained = 0;
    while drained < config.max_discards {
        match transport.read_frame(config.drain_timeout) {
            Ok(raw) => {
                debug!(
                    frame_hex = format_args!("{:02X?}", raw),
                    "Drained stale frame"
                );
                drained += 1;
            }
            Err(Error::Timeout(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok(drained)
}

/// Read until a frame with the given command arrives.
///
/// Non-matching frames (typically unsolicited device events) are discarded,
/// at most `config.max_discards` of them before giving up with
/// [`Error::NoMatch`].
pub fn read_matching(
    transport: &dyn FrameTransport,
    config: &SessionConfig,
    command: Command,
) -> Result<Frame> {
    let mut discarded = 0;
    loop {
        let frame = receive_frame(transport, config.read_timeout)?;
        if frame.command() == command.as_byte() {
            return Ok(frame);
        }

        if discarded >= config.max_discards {
            return Err(Error::NoMatch {
                command: command.as_byte(),
                discarded,
            });
        }
        discarded += 1;
        match Response::classify(&frame) {
            Ok(Response::DeviceEvent(event)) => {
                debug!(?event, "Discarding unsolicited device event");
            }
            _ => {
                debug!(
                    expected = format_args!("0x{:02X}", command.as_byte()),
                    got = format_args!("0x{:02X}", frame.command()),
                    "Discarding non-matching frame"
                );
            }
        }
    }
}

/// Flush stale input, send a request, and wait for the reply with the same
/// command.
pub fn exchange(
    transport: &dyn FrameTransport,
    config: &SessionConfig,
    request: &Request,
) -> Result<Frame> {
    clear_stale_reads(transport, config)?;
    send_request(transport, request)?;
    read_matching(transport, config, request.command())
}
