//! Typed request and response payloads built on [`Frame`].
//!
//! Encoding is total: every [`Request`] has exactly one frame. Decoding is
//! partial: only frames that arrive unsolicited or are needed to verify an
//! echo have a structured form. Memory read/write replies are consumed
//! positionally by the register map and are reported as
//! [`Response::Unsupported`] by [`Response::classify`].

use crate::error::{Error, Result};
use crate::frame::Frame;

/// Frame positions shared by several commands.
pub mod positions {
    /// Start address of a memory read/write.
    pub const ADDRESS: usize = 4;
    /// Byte count of a memory read/write, or a small shape marker.
    pub const LENGTH: usize = 5;
    /// First value byte; also the profile number and event selector.
    pub const VALUE: usize = 6;
}

/// Maximum number of register values carried by a single memory frame.
pub const MAX_MEMORY_SPAN: usize = 10;

/// Shape marker at position 5 for profile frames carrying a profile number.
const PROFILE_MARKER: u8 = 0x01;

/// Shape marker at position 5 for device-event frames.
const EVENT_MARKER: u8 = 0x0A;

/// Command byte at frame position 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Device online status.
    Status = 0x03,
    /// Battery and charging details.
    Power = 0x04,
    /// Write up to 10 register bytes.
    MemoryWrite = 0x07,
    /// Read up to 10 register bytes.
    MemoryRead = 0x08,
    /// Restore factory defaults.
    Restore = 0x09,
    /// Unsolicited notification from the device.
    DeviceEvent = 0x0A,
    /// Query the active onboard profile.
    ProfileGet = 0x0E,
    /// Select the active onboard profile.
    ProfileSet = 0x0F,
}

impl Command {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x03 => Some(Self::Status),
            0x04 => Some(Self::Power),
            0x07 => Some(Self::MemoryWrite),
            0x08 => Some(Self::MemoryRead),
            0x09 => Some(Self::Restore),
            0x0A => Some(Self::DeviceEvent),
            0x0E => Some(Self::ProfileGet),
            0x0F => Some(Self::ProfileSet),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Device-event kinds, selected by the byte at position 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceEvent {
    /// Emitted by the firmware with no known meaning.
    Unknown1 = 0x01,
    /// The active DPI mode changed on the device.
    DpiMode = 0x02,
    /// Power state changed (cable plugged/unplugged, battery step).
    Power = 0x04,
}

impl DeviceEvent {
    pub const ALL: &'static [DeviceEvent] = &[Self::Unknown1, Self::DpiMode, Self::Power];

    pub fn from_selector(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Unknown1),
            0x02 => Some(Self::DpiMode),
            0x04 => Some(Self::Power),
            _ => None,
        }
    }

    pub fn selector(self) -> u8 {
        self as u8
    }
}

/// A request the host can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Status,
    PowerQuery,
    Restore,
    MemoryRead { start: u8, length: u8 },
    MemoryWrite { start: u8, values: Vec<u8> },
    ProfileGet,
    ProfileSet { profile: u8 },
    /// Acknowledge a device event by echoing its canonical frame.
    EventAck(DeviceEvent),
}

impl Request {
    pub fn command(&self) -> Command {
        match self {
            Self::Status => Command::Status,
            Self::PowerQuery => Command::Power,
            Self::Restore => Command::Restore,
            Self::MemoryRead { .. } => Command::MemoryRead,
            Self::MemoryWrite { .. } => Command::MemoryWrite,
            Self::ProfileGet => Command::ProfileGet,
            Self::ProfileSet { .. } => Command::ProfileSet,
            Self::EventAck(_) => Command::DeviceEvent,
        }
    }

    /// Serialize into a frame.
    pub fn to_frame(&self) -> Result<Frame> {
        let command = self.command().as_byte();
        match self {
            Self::Status | Self::PowerQuery | Self::Restore | Self::ProfileGet => {
                Frame::encode(command, &[])
            }
            Self::MemoryRead { start, length } => {
                if *length == 0 || *length as usize > MAX_MEMORY_SPAN {
                    return Err(Error::InvalidRange(format!(
                        "memory read length {length} outside 1..={MAX_MEMORY_SPAN}"
                    )));
                }
                Frame::with_fields(
                    command,
                    &[(positions::ADDRESS, *start), (positions::LENGTH, *length)],
                )
            }
            Self::MemoryWrite { start, values } => {
                if values.is_empty() || values.len() > MAX_MEMORY_SPAN {
                    return Err(Error::InvalidRange(format!(
                        "memory write of {} values outside 1..={MAX_MEMORY_SPAN}",
                        values.len()
                    )));
                }
                let mut fields = vec![
                    (positions::ADDRESS, *start),
                    (positions::LENGTH, values.len() as u8),
                ];
                fields.extend(
                    values
                        .iter()
                        .enumerate()
                        .map(|(i, &v)| (positions::VALUE + i, v)),
                );
                Frame::with_fields(command, &fields)
            }
            Self::ProfileSet { profile } => profile_frame(Command::ProfileSet, *profile),
            Self::EventAck(event) => event_frame(*event),
        }
    }
}

/// A decoded frame received from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Exact echo of the power query (the power details themselves are parsed
    /// positionally by [`PowerDetails::parse`]).
    PowerQueryEcho,
    RestoreEcho,
    DeviceEvent(DeviceEvent),
    /// Exact echo of a profile-get request.
    ProfileRequestEcho,
    ActiveProfile(u8),
    ProfileSetEcho(u8),
    /// Well-formed frame with no structured decoder.
    Unsupported { command: u8 },
}

impl Response {
    /// Classify a frame, reporting commands without a decoder as
    /// [`Response::Unsupported`].
    pub fn classify(frame: &Frame) -> Result<Self> {
        let Some(command) = Command::from_byte(frame.command()) else {
            return Ok(Self::Unsupported {
                command: frame.command(),
            });
        };

        match command {
            Command::Power => {
                if *frame == Request::PowerQuery.to_frame()? {
                    Ok(Self::PowerQueryEcho)
                } else {
                    Ok(Self::Unsupported {
                        command: frame.command(),
                    })
                }
            }
            Command::Restore => Ok(Self::RestoreEcho),
            Command::DeviceEvent => {
                let selector = frame.byte(positions::VALUE);
                let event = DeviceEvent::from_selector(selector).ok_or_else(|| {
                    Error::Decode(format!("unknown device event selector 0x{selector:02X}"))
                })?;
                if *frame != event_frame(event)? {
                    return Err(Error::Decode(format!(
                        "device event {event:?} has unexpected payload {frame:?}"
                    )));
                }
                Ok(Self::DeviceEvent(event))
            }
            Command::ProfileSet => {
                let profile = frame.byte(positions::VALUE);
                if *frame != profile_frame(Command::ProfileSet, profile)? {
                    return Err(Error::Decode(format!(
                        "profile-set echo has unexpected payload {frame:?}"
                    )));
                }
                Ok(Self::ProfileSetEcho(profile))
            }
            Command::ProfileGet => {
                if *frame == Request::ProfileGet.to_frame()? {
                    return Ok(Self::ProfileRequestEcho);
                }
                let profile = frame.byte(positions::VALUE);
                if *frame != profile_frame(Command::ProfileGet, profile)? {
                    return Err(Error::Decode(format!(
                        "profile-get response has unexpected payload {frame:?}"
                    )));
                }
                Ok(Self::ActiveProfile(profile))
            }
            Command::Status | Command::MemoryRead | Command::MemoryWrite => {
                Ok(Self::Unsupported {
                    command: frame.command(),
                })
            }
        }
    }

    /// Decode a frame, failing with [`Error::UnsupportedDecode`] for commands
    /// whose replies must be read positionally.
    pub fn decode(frame: &Frame) -> Result<Self> {
        match Self::classify(frame)? {
            Self::Unsupported { command } => Err(Error::UnsupportedDecode { command }),
            decoded => Ok(decoded),
        }
    }
}

fn profile_frame(command: Command, profile: u8) -> Result<Frame> {
    Frame::with_fields(
        command.as_byte(),
        &[
            (positions::LENGTH, PROFILE_MARKER),
            (positions::VALUE, profile),
        ],
    )
}

fn event_frame(event: DeviceEvent) -> Result<Frame> {
    Frame::with_fields(
        Command::DeviceEvent.as_byte(),
        &[
            (positions::LENGTH, EVENT_MARKER),
            (positions::VALUE, event.selector()),
        ],
    )
}

/// Battery and charging state from a power-query reply. Never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PowerDetails {
    pub battery_percent: u8,
    pub battery_millivolts: u16,
    /// Cable or dock attached.
    pub power_connected: bool,
}

impl PowerDetails {
    /// Parse the positional fields of a power-query reply.
    pub fn parse(frame: &Frame) -> Result<Self> {
        if frame.command() != Command::Power.as_byte() {
            return Err(Error::ProtocolViolation(format!(
                "expected power reply, got command 0x{:02X}",
                frame.command()
            )));
        }
        let battery_percent = frame.byte(positions::VALUE);
        if battery_percent > 100 {
            return Err(Error::InvalidEncoding {
                field: "battery_percent",
                raw: vec![battery_percent],
            });
        }
        Ok(Self {
            battery_percent,
            power_connected: frame.byte(7) != 0,
            battery_millivolts: u16::from_be_bytes([frame.byte(8), frame.byte(9)]),
        })
    }
}
