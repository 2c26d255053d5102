//! Device session: profile and power queries, restore, and typed settings
//! built on the register map.
//!
//! ```text
//! Disconnected ──open──▶ Connected ──first profile read──▶ ProfileKnown(n)
//!       ▲                    │                                   │
//!       └────────close───────┴───────────────close───────────────┘
//! ```
//!
//! Register writes are write-then-trust (any reply is accepted and the cache
//! is updated). Profile writes are write-then-verify: the echoed profile must
//! match or the cached profile stays as it was.

use crate::codec::{self, LedEffect, Rgb};
use crate::comm::{send_with_retry, MAX_RETRIES};
use crate::config::SessionConfig;
use crate::device::PollingRate;
use crate::error::{Error, Result};
use crate::payload::{positions, Command, DeviceEvent, PowerDetails, Request, Response};
use crate::register_map::RegisterMap;
use crate::registers::{self, Setting, DPI_MODE_SLOTS};
use crate::safety;
use crate::settings::{DpiModeSettings, LedSettings, LodSettings, SettingsSnapshot};
use crate::transport::{exchange, read_matching, receive_frame, send_request, FrameTransport};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    ProfileKnown(u8),
}

/// One attached mouse, its register cache, and its cached profile.
///
/// Not internally synchronized: callers sharing a session across threads must
/// serialize access themselves.
pub struct Session<T: FrameTransport> {
    transport: T,
    config: SessionConfig,
    registers: RegisterMap,
    profile: Option<u8>,
}

impl<T: FrameTransport> Session<T> {
    /// Wrap an opened transport. The register cache starts empty.
    pub fn new(transport: T, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            config,
            registers: RegisterMap::new(),
            profile: None,
        })
    }

    pub fn state(&self) -> SessionState {
        if !self.transport.is_open() {
            return SessionState::Disconnected;
        }
        match self.profile {
            Some(profile) => SessionState::ProfileKnown(profile),
            None => SessionState::Connected,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn registers(&self) -> &RegisterMap {
        &self.registers
    }

    /// Release the device and drop all cached state. Idempotent.
    pub fn close(&mut self) {
        self.transport.close();
        self.registers.clear();
        self.profile = None;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.transport.is_open() {
            Ok(())
        } else {
            Err(Error::DeviceNotFound("session is disconnected".into()))
        }
    }

    // --- Register cache -------------------------------------------------

    /// Bulk-read the whole settings region into the cache.
    pub fn refresh(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.registers.bulk_read(&self.transport, &self.config)
    }

    /// Cached value of one register.
    pub fn get(&self, address: u8) -> Result<u8> {
        self.registers.get(address)
    }

    /// Write contiguous raw registers (no per-setting checksum is added).
    pub fn write_registers(&mut self, addresses: &BTreeMap<u8, u8>) -> Result<()> {
        self.ensure_open()?;
        self.registers.write(&self.transport, &self.config, addresses)
    }

    fn write_setting(&mut self, setting: Setting, values: &[u8]) -> Result<()> {
        self.ensure_open()?;
        debug!(
            setting = setting.name,
            values = format_args!("{:02X?}", values),
            "Writing setting"
        );
        self.registers
            .write_setting(&self.transport, &self.config, setting, values)
    }

    fn scalar(&self, setting: Setting) -> Result<u8> {
        self.registers.get(setting.address)
    }

    fn flag(&self, setting: Setting) -> Result<bool> {
        codec::bool_from_raw(setting.name, self.scalar(setting)?)
    }

    // --- Power and status -----------------------------------------------

    /// Query battery and charging state. Never cached.
    pub fn power(&self) -> Result<PowerDetails> {
        self.ensure_open()?;
        let request = Request::PowerQuery;
        let frame = send_with_retry(&self.transport, &self.config, &request, MAX_RETRIES)?;
        PowerDetails::parse(&frame)
    }

    /// Whether the mouse reports itself online (relevant through the dongle).
    pub fn is_online(&self) -> Result<bool> {
        self.ensure_open()?;
        let frame = send_with_retry(&self.transport, &self.config, &Request::Status, MAX_RETRIES)?;
        codec::bool_from_raw("online", frame.byte(positions::VALUE))
    }

    // --- Profile --------------------------------------------------------

    /// Active profile, read from the device on first use.
    pub fn profile(&mut self) -> Result<u8> {
        match self.profile {
            Some(profile) => Ok(profile),
            None => self.read_profile(),
        }
    }

    /// Read the active profile from the device, replacing the cached value.
    pub fn read_profile(&mut self) -> Result<u8> {
        self.ensure_open()?;
        let mut frame = exchange(&self.transport, &self.config, &Request::ProfileGet)?;
        // Some firmware echoes the bare request before answering.
        if Response::decode(&frame)? == Response::ProfileRequestEcho {
            frame = read_matching(&self.transport, &self.config, Command::ProfileGet)?;
        }
        match Response::decode(&frame)? {
            Response::ActiveProfile(profile) => {
                debug!(profile, "Active profile read");
                self.profile = Some(profile);
                Ok(profile)
            }
            other => Err(Error::ProtocolViolation(format!(
                "expected active profile, got {other:?}"
            ))),
        }
    }

    /// Select the active profile and verify the device's echo.
    pub fn set_profile(&mut self, profile: u8) -> Result<()> {
        safety::validate_profile(profile)?;
        self.ensure_open()?;
        let frame = exchange(
            &self.transport,
            &self.config,
            &Request::ProfileSet { profile },
        )?;
        match Response::decode(&frame)? {
            Response::ProfileSetEcho(echoed) if echoed == profile => {
                info!(profile, "Active profile changed");
                self.profile = Some(profile);
                Ok(())
            }
            Response::ProfileSetEcho(echoed) => {
                warn!(requested = profile, echoed, "Profile echo mismatch");
                Err(Error::ProtocolViolation(format!(
                    "requested profile {profile}, device echoed {echoed}"
                )))
            }
            other => Err(Error::ProtocolViolation(format!(
                "expected profile-set echo, got {other:?}"
            ))),
        }
    }

    // --- Restore --------------------------------------------------------

    /// Restore factory defaults and invalidate every cached value.
    ///
    /// The cache is cleared once the request has been sent, even if the echo
    /// turns out to be wrong: the device state is unknown either way.
    pub fn restore(&mut self) -> Result<()> {
        self.ensure_open()?;
        let request = Request::Restore;
        let result = exchange(&self.transport, &self.config, &request);
        self.registers.clear();
        self.profile = None;

        let frame = result?;
        if frame != request.to_frame()? {
            warn!(reply = ?frame, "Restore echo mismatch");
            return Err(Error::ProtocolViolation(format!(
                "restore echo {frame:?} differs from request"
            )));
        }
        info!("Factory defaults restored");
        Ok(())
    }

    // --- Device events --------------------------------------------------

    /// Wait up to one read timeout for an unsolicited device event.
    ///
    /// A DPI-mode event invalidates the cached active mode. Non-event frames
    /// are discarded. Returns `None` on timeout.
    pub fn poll_event(&mut self) -> Result<Option<DeviceEvent>> {
        self.ensure_open()?;
        let frame = match receive_frame(&self.transport, self.config.read_timeout) {
            Ok(frame) => frame,
            Err(Error::Timeout(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        match Response::classify(&frame)? {
            Response::DeviceEvent(event) => {
                debug!(?event, "Device event");
                if event == DeviceEvent::DpiMode {
                    self.registers.invalidate(registers::DPI_MODE);
                }
                Ok(Some(event))
            }
            other => {
                debug!(?other, "Discarding non-event frame while polling");
                Ok(None)
            }
        }
    }

    /// Echo a device event back to the device.
    pub fn acknowledge_event(&self, event: DeviceEvent) -> Result<()> {
        self.ensure_open()?;
        send_request(&self.transport, &Request::EventAck(event))?;
        Ok(())
    }

    // --- Typed settings -------------------------------------------------

    pub fn polling_rate(&self) -> Result<PollingRate> {
        PollingRate::from_raw(self.scalar(registers::POLLING_RATE)?)
    }

    pub fn set_polling_rate(&mut self, rate: PollingRate) -> Result<()> {
        self.write_setting(registers::POLLING_RATE, &[rate.to_raw()])
    }

    /// Active DPI mode slot.
    pub fn dpi_mode(&self) -> Result<u8> {
        self.scalar(registers::DPI_MODE)
    }

    pub fn set_dpi_mode(&mut self, mode: u8) -> Result<()> {
        let mode = safety::validate_mode_index(mode)?;
        self.write_setting(registers::DPI_MODE, &[mode])
    }

    /// Number of DPI modes the mouse cycles through.
    pub fn dpi_mode_count(&self) -> Result<u8> {
        self.scalar(registers::DPI_MODE_COUNT)
    }

    pub fn lod_mm(&self) -> Result<u8> {
        self.scalar(registers::LOD_MM)
    }

    pub fn set_lod_mm(&mut self, mm: u8) -> Result<()> {
        let mm = safety::validate_lod_mm(mm)?;
        self.write_setting(registers::LOD_MM, &[mm])
    }

    pub fn lod_ripple(&self) -> Result<bool> {
        self.flag(registers::LOD_RIPPLE)
    }

    pub fn set_lod_ripple(&mut self, enabled: bool) -> Result<()> {
        self.write_setting(registers::LOD_RIPPLE, &[codec::bool_to_raw(enabled)])
    }

    pub fn debounce_ms(&self) -> Result<u8> {
        self.scalar(registers::DEBOUNCE_TIME)
    }

    pub fn motion_sync(&self) -> Result<bool> {
        self.flag(registers::MOTION_SYNC)
    }

    pub fn set_motion_sync(&mut self, enabled: bool) -> Result<()> {
        self.write_setting(registers::MOTION_SYNC, &[codec::bool_to_raw(enabled)])
    }

    pub fn angle_snapping(&self) -> Result<bool> {
        self.flag(registers::ANGLE_SNAPPING)
    }

    pub fn set_angle_snapping(&mut self, enabled: bool) -> Result<()> {
        self.write_setting(registers::ANGLE_SNAPPING, &[codec::bool_to_raw(enabled)])
    }

    pub fn led_effect(&self) -> Result<LedEffect> {
        LedEffect::from_raw(self.scalar(registers::LED_EFFECT)?)
    }

    pub fn set_led_effect(&mut self, effect: LedEffect) -> Result<()> {
        self.write_setting(registers::LED_EFFECT, &[effect.to_raw()])
    }

    pub fn led_brightness(&self) -> Result<u8> {
        self.scalar(registers::LED_BRIGHTNESS)
    }

    pub fn set_led_brightness(&mut self, brightness: u8) -> Result<()> {
        self.write_setting(registers::LED_BRIGHTNESS, &[brightness])
    }

    pub fn led_breathe_speed(&self) -> Result<u8> {
        self.scalar(registers::LED_BREATHE_SPEED)
    }

    pub fn led_enabled(&self) -> Result<bool> {
        self.flag(registers::LED_ENABLED)
    }

    pub fn set_led_enabled(&mut self, enabled: bool) -> Result<()> {
        self.write_setting(registers::LED_ENABLED, &[codec::bool_to_raw(enabled)])
    }

    /// Autosleep delay; the register holds tens of seconds.
    pub fn autosleep_seconds(&self) -> Result<u32> {
        Ok(self.scalar(registers::AUTOSLEEP_TIME)? as u32 * 10)
    }

    /// DPI of a mode slot.
    pub fn dpi(&self, mode: u8) -> Result<u32> {
        codec::dpi_from_raw(self.registers.get_setting(registers::mode_dpi(mode)?)?)
    }

    pub fn set_dpi(&mut self, mode: u8, dpi: u32) -> Result<()> {
        let setting = registers::mode_dpi(mode)?;
        let raw = codec::dpi_to_raw(dpi)?;
        self.write_setting(setting, &raw)
    }

    /// LED color of a mode slot.
    pub fn led_color(&self, mode: u8) -> Result<Rgb> {
        let setting = registers::mode_led_color(mode)?;
        Ok(Rgb::from_raw(self.registers.get_setting(setting)?))
    }

    pub fn set_led_color(&mut self, mode: u8, color: Rgb) -> Result<()> {
        let setting = registers::mode_led_color(mode)?;
        self.write_setting(setting, &color.to_raw())
    }

    /// DPI of the active mode.
    pub fn current_dpi(&self) -> Result<u32> {
        self.dpi(self.dpi_mode()?)
    }

    pub fn set_current_dpi(&mut self, dpi: u32) -> Result<()> {
        let mode = self.dpi_mode()?;
        self.set_dpi(mode, dpi)
    }

    /// LED color of the active mode.
    pub fn current_led_color(&self) -> Result<Rgb> {
        self.led_color(self.dpi_mode()?)
    }

    pub fn set_current_led_color(&mut self, color: Rgb) -> Result<()> {
        let mode = self.dpi_mode()?;
        self.set_led_color(mode, color)
    }

    // --- Snapshot -------------------------------------------------------

    /// Gather every setting plus a fresh power reading.
    ///
    /// Register-backed fields require a prior [`Session::refresh`].
    pub fn snapshot(&mut self) -> Result<SettingsSnapshot> {
        let power = self.power()?;
        let active_profile = self.profile()?;

        let mode_count = self.dpi_mode_count()?.min(DPI_MODE_SLOTS);
        let dpi_modes = (0..mode_count)
            .map(|mode| {
                Ok(DpiModeSettings {
                    dpi_mode: mode,
                    dpi: self.dpi(mode)?,
                    led_color: self.led_color(mode)?.to_hex(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let enabled = self.led_enabled()?;
        let led = if enabled {
            let effect = self.led_effect()?;
            LedSettings {
                enabled,
                effect: Some(effect),
                brightness: match effect {
                    LedEffect::Steady => Some(self.led_brightness()?),
                    _ => None,
                },
                breathe_speed: match effect {
                    LedEffect::Breathe => Some(self.led_breathe_speed()?),
                    _ => None,
                },
            }
        } else {
            LedSettings {
                enabled,
                effect: None,
                brightness: None,
                breathe_speed: None,
            }
        };

        Ok(SettingsSnapshot {
            active_profile,
            active_dpi_mode: self.dpi_mode()?,
            dpi_modes,
            polling_rate_hz: self.polling_rate()?,
            led,
            lod: LodSettings {
                mm: self.lod_mm()?,
                ripple_enabled: self.lod_ripple()?,
            },
            motion_sync_enabled: self.motion_sync()?,
            angle_snapping_enabled: self.angle_snapping()?,
            autosleep_seconds: self.autosleep_seconds()?,
            debounce_milliseconds: self.debounce_ms()?,
            power: power.into(),
        })
    }
}
