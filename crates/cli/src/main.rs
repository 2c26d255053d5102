//! pulsarctl: command-line configuration tool for the Pulsar X2V2 Mini.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pulsar_core::codec::{LedEffect, Rgb};
use pulsar_core::comm::{check_device_status, DeviceStatus, ErrorClass};
use pulsar_core::config::SessionConfig;
use pulsar_core::device::{self, HidFrameTransport};
use pulsar_core::error::Error;
use pulsar_core::payload::PowerDetails;
use pulsar_core::safety;
use pulsar_core::session::Session;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Parser)]
#[command(
    name = "pulsarctl",
    version,
    about = "Open-source Pulsar X2V2 Mini configuration",
    after_help = safety::WRITE_DISCLAIMER
)]
struct Cli {
    /// Load session settings from a JSON file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Per-read timeout in milliseconds.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
    /// Unsolicited frames to discard before giving up on a reply.
    #[arg(long, global = true)]
    max_discards: Option<usize>,
    /// Timeout used while flushing stale input, in milliseconds.
    #[arg(long, global = true)]
    drain_timeout_ms: Option<u64>,
    /// Open the mouse at this HID path (see list-devices).
    #[arg(long, global = true)]
    path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn enabled(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Effect {
    Off,
    Steady,
    Breathe,
}

impl From<Effect> for LedEffect {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::Off => LedEffect::Off,
            Effect::Steady => LedEffect::Steady,
            Effect::Breathe => LedEffect::Breathe,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List connected Pulsar mice.
    ListDevices,
    /// Print every setting as JSON.
    Settings,
    /// Show battery and charging state.
    Power {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Check whether the mouse is reachable and online.
    Status {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show the active onboard profile.
    GetProfile,
    /// Select the active onboard profile (0-3).
    SetProfile { profile: u8 },
    /// Set the DPI of a mode slot (50-26000, multiple of 50).
    SetDpi {
        /// Mode slot (0-3).
        mode: u8,
        dpi: u32,
    },
    /// Set the LED color of a mode slot.
    SetColor {
        /// Mode slot (0-3).
        mode: u8,
        /// Hex color, e.g. "#ff8800".
        color: String,
    },
    /// Select the active DPI mode slot (0-3).
    SetDpiMode { mode: u8 },
    /// Set polling rate (125, 250, 500, or 1000 Hz).
    SetRate { hz: u16 },
    /// Set the LED effect.
    SetLedEffect { effect: Effect },
    /// Set LED brightness (0-255).
    SetLedBrightness { value: u32 },
    /// Turn the LED on or off.
    SetLedEnabled { state: Toggle },
    /// Turn motion sync on or off.
    SetMotionSync { state: Toggle },
    /// Turn angle snapping on or off.
    SetAngleSnapping { state: Toggle },
    /// Set lift-off distance in millimetres (1-2).
    SetLod { mm: u8 },
    /// Turn lift-off ripple control on or off.
    SetLodRipple { state: Toggle },
    /// Print one raw register (address in hex, e.g. 0x0C).
    ReadRegister { address: String },
    /// Restore factory defaults.
    Restore,
    /// Print device events as they arrive.
    Watch {
        /// Stop after this many events.
        #[arg(long)]
        count: Option<usize>,
        /// Echo each event back to the device.
        #[arg(long)]
        ack: bool,
    },
}

impl Cli {
    fn session_config(&self) -> Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("read config {}", path.display()))?;
                SessionConfig::from_json(&text)?
            }
            None => SessionConfig::default(),
        };
        if let Some(ms) = self.timeout_ms {
            config.read_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = self.max_discards {
            config.max_discards = n;
        }
        if let Some(ms) = self.drain_timeout_ms {
            config.drain_timeout = Duration::from_millis(ms);
        }
        config.validate()?;
        Ok(config)
    }
}

const PERMISSION_HINT: &str = "\nHint: install udev rules granting access to the hidraw node";
const DISCONNECTED_HINT: &str = "\nHint: ensure the mouse or its dongle is plugged in";

fn open_transport(path: Option<&str>) -> pulsar_core::error::Result<HidFrameTransport> {
    let Some(path) = path else {
        return HidFrameTransport::open_first_supported();
    };
    debug!(path, "Looking up device by path");
    let info = device::discover_devices()?
        .into_iter()
        .find(|d| d.path == path)
        .ok_or_else(|| Error::DeviceNotFound(format!("no Pulsar mouse at {path}")))?;
    HidFrameTransport::open(info)
}

fn open_session(config: SessionConfig, path: Option<&str>) -> Result<Session<HidFrameTransport>> {
    let transport = open_transport(path).map_err(|e| {
        let hint = match ErrorClass::classify(&e) {
            ErrorClass::PermissionDenied => PERMISSION_HINT,
            ErrorClass::Disconnected => DISCONNECTED_HINT,
            _ => "",
        };
        anyhow::anyhow!("{e}{hint}")
    })?;
    let session = Session::new(transport, config)?;
    let info = session.transport().info();
    info!(model = info.model.name(), path = %info.path, "Session ready");
    Ok(session)
}

fn status_label(status: DeviceStatus) -> &'static str {
    match status {
        DeviceStatus::Online => "online",
        DeviceStatus::Offline => "offline (asleep or out of range)",
        DeviceStatus::Disconnected => "disconnected",
        DeviceStatus::PermissionError => "permission denied",
        DeviceStatus::Error => "not responding",
    }
}

fn status_json(model: &str, status: DeviceStatus) -> Result<String> {
    let value = serde_json::json!({
        "model": model,
        "status": status_label(status),
        "online": status == DeviceStatus::Online,
    });
    Ok(serde_json::to_string_pretty(&value)?)
}

fn power_json(power: &PowerDetails) -> Result<String> {
    Ok(serde_json::to_string_pretty(power)?)
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}

fn parse_address(text: &str) -> Result<u8> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u8::from_str_radix(digits, 16).with_context(|| format!("invalid register address '{text}'"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = cli.session_config()?;
    let path = cli.path.as_deref();

    match cli.command {
        Commands::ListDevices => {
            let devices = device::discover_devices()?;
            if devices.is_empty() {
                println!("No Pulsar mice found.");
                println!("Ensure your mouse is connected and udev rules are set up.");
            } else {
                for dev in &devices {
                    let serial = dev.serial.as_deref().unwrap_or("unknown");
                    println!("{}", dev.model.name());
                    println!("  VID: 0x{:04X}  PID: 0x{:04X}", dev.vid, dev.pid);
                    println!("  interface: {}", dev.interface);
                    println!("  serial: {serial}");
                    println!("  path: {}", dev.path);
                }
            }
        }
        Commands::Settings => {
            let mut session = open_session(config, path)?;
            session.refresh()?;
            println!("{}", session.snapshot()?.to_json_pretty()?);
        }
        Commands::Power { json } => {
            let session = open_session(config, path)?;
            let power = session.power()?;
            if json {
                println!("{}", power_json(&power)?);
            } else {
                let state = if power.power_connected {
                    "charging"
                } else {
                    "on battery"
                };
                let (percent, mv) = (power.battery_percent, power.battery_millivolts);
                println!("Battery: {percent}% ({mv} mV), {state}");
            }
        }
        Commands::Status { json } => {
            let session = open_session(config, path)?;
            let status = check_device_status(session.transport(), session.config());
            let model = session.transport().info().model.name();
            if json {
                println!("{}", status_json(model, status)?);
            } else {
                println!("{model}: {}", status_label(status));
            }
        }
        Commands::GetProfile => {
            let mut session = open_session(config, path)?;
            println!("Active profile: {}", session.profile()?);
        }
        Commands::SetProfile { profile } => {
            safety::validate_profile(profile)?;
            let mut session = open_session(config, path)?;
            session.set_profile(profile)?;
            println!("Active profile set to {profile}");
        }
        Commands::SetDpi { mode, dpi } => {
            let mut session = open_session(config, path)?;
            session.set_dpi(mode, dpi)?;
            println!("Mode {mode} DPI set to {dpi}");
        }
        Commands::SetColor { mode, color } => {
            let color = Rgb::from_hex(&color)?;
            let mut session = open_session(config, path)?;
            session.set_led_color(mode, color)?;
            println!("Mode {mode} color set to {color}");
        }
        Commands::SetDpiMode { mode } => {
            let mut session = open_session(config, path)?;
            session.set_dpi_mode(mode)?;
            println!("Active DPI mode set to {mode}");
        }
        Commands::SetRate { hz } => {
            let rate = safety::validate_polling_rate(hz)?;
            let mut session = open_session(config, path)?;
            session.set_polling_rate(rate)?;
            println!("Polling rate set to {rate}");
        }
        Commands::SetLedEffect { effect } => {
            let effect = LedEffect::from(effect);
            let mut session = open_session(config, path)?;
            session.set_led_effect(effect)?;
            println!("LED effect set to {effect}");
        }
        Commands::SetLedBrightness { value } => {
            let brightness = safety::validate_led_brightness(value)?;
            let mut session = open_session(config, path)?;
            session.set_led_brightness(brightness)?;
            println!("LED brightness set to {brightness}");
        }
        Commands::SetLedEnabled { state } => {
            let mut session = open_session(config, path)?;
            session.set_led_enabled(state.enabled())?;
            println!("LED {}", on_off(state.enabled()));
        }
        Commands::SetMotionSync { state } => {
            let mut session = open_session(config, path)?;
            session.set_motion_sync(state.enabled())?;
            println!("Motion sync {}", on_off(state.enabled()));
        }
        Commands::SetAngleSnapping { state } => {
            let mut session = open_session(config, path)?;
            session.set_angle_snapping(state.enabled())?;
            println!("Angle snapping {}", on_off(state.enabled()));
        }
        Commands::SetLod { mm } => {
            let mut session = open_session(config, path)?;
            session.set_lod_mm(mm)?;
            println!("Lift-off distance set to {mm} mm");
        }
        Commands::SetLodRipple { state } => {
            let mut session = open_session(config, path)?;
            session.set_lod_ripple(state.enabled())?;
            println!("Lift-off ripple control {}", on_off(state.enabled()));
        }
        Commands::ReadRegister { address } => {
            let address = parse_address(&address)?;
            let mut session = open_session(config, path)?;
            session.refresh()?;
            let value = session.get(address)?;
            println!("0x{address:02X}: 0x{value:02X} ({value})");
        }
        Commands::Restore => {
            let mut session = open_session(config, path)?;
            session.restore()?;
            println!("Factory defaults restored");
        }
        Commands::Watch { count, ack } => {
            let mut session = open_session(config, path)?;
            let mut seen = 0;
            println!("Watching for device events (Ctrl+C to stop)");
            while count.map_or(true, |limit| seen < limit) {
                if let Some(event) = session.poll_event()? {
                    debug!(?event, "Device event");
                    println!("{event:?}");
                    if ack {
                        session.acknowledge_event(event)?;
                    }
                    seen += 1;
                }
            }
        }
    }

    Ok(())
}
