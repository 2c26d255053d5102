//! Device model: discovery, connection, and the hidapi-backed transport.

use crate::error::{Error, Result};
use crate::frame::FRAME_LEN;
use crate::transport::FrameTransport;
use crate::{pids, PULSAR_VID};
use std::time::Duration;
use tracing::{debug, info};

/// Supported connection modes, each with its own product ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseModel {
    X2V2MiniWired,
    X2V2MiniWireless,
}

impl MouseModel {
    /// Preference order when several are attached: wired first.
    pub const ALL: &'static [MouseModel] = &[Self::X2V2MiniWired, Self::X2V2MiniWireless];

    /// Look up model from USB product ID.
    pub fn from_pid(pid: u16) -> Option<Self> {
        match pid {
            pids::X2V2_MINI_WIRED => Some(Self::X2V2MiniWired),
            pids::X2V2_MINI_WIRELESS_1K => Some(Self::X2V2MiniWireless),
            _ => None,
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::X2V2MiniWired => "Pulsar X2V2 Mini (wired)",
            Self::X2V2MiniWireless => "Pulsar X2V2 Mini (1 kHz dongle)",
        }
    }

    /// USB Product ID.
    pub fn pid(&self) -> u16 {
        match self {
            Self::X2V2MiniWired => pids::X2V2_MINI_WIRED,
            Self::X2V2MiniWireless => pids::X2V2_MINI_WIRELESS_1K,
        }
    }
}

/// Logical channels (USB interfaces) and their fixed report lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Interface 0: standard mouse reports.
    Pointer,
    /// Interface 1: settings requests, replies, and device events.
    Settings,
    /// Interface 2: auxiliary reports.
    Auxiliary,
}

impl Channel {
    pub fn interface(&self) -> i32 {
        match self {
            Self::Pointer => 0,
            Self::Settings => 1,
            Self::Auxiliary => 2,
        }
    }

    pub fn report_len(&self) -> usize {
        match self {
            Self::Pointer => 8,
            Self::Settings => FRAME_LEN,
            Self::Auxiliary => 7,
        }
    }
}

/// Information about a discovered device interface.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub model: MouseModel,
    pub vid: u16,
    pub pid: u16,
    pub interface: i32,
    pub path: String,
    pub serial: Option<String>,
}

/// Discover settings-channel interfaces of all connected supported mice.
///
/// Results are ordered by [`MouseModel::ALL`] preference.
pub fn discover_devices() -> Result<Vec<DeviceInfo>> {
    debug!("Starting HID device enumeration");
    let api = hidapi::HidApi::new().map_err(|e| Error::Hid(e.to_string()))?;
    let mut devices = collect_devices(&api);
    devices.sort_by_key(|d| MouseModel::ALL.iter().position(|m| *m == d.model));
    debug!(count = devices.len(), "Device enumeration complete");
    Ok(devices)
}

fn collect_devices(api: &hidapi::HidApi) -> Vec<DeviceInfo> {
    let mut devices = Vec::new();
    for info in api.device_list() {
        if info.vendor_id() != PULSAR_VID {
            continue;
        }
        if info.interface_number() != Channel::Settings.interface() {
            continue;
        }

        if let Some(model) = MouseModel::from_pid(info.product_id()) {
            info!(
                model = model.name(),
                vid = format_args!("0x{:04X}", info.vendor_id()),
                pid = format_args!("0x{:04X}", info.product_id()),
                path = %info.path().to_string_lossy(),
                "Found Pulsar device"
            );
            devices.push(DeviceInfo {
                model,
                vid: info.vendor_id(),
                pid: info.product_id(),
                interface: info.interface_number(),
                path: info.path().to_string_lossy().into_owned(),
                serial: info.serial_number().map(|s| s.to_string()),
            });
        }
    }
    devices
}

fn map_hid_error(context: &str, err: hidapi::HidError) -> Error {
    let msg = format!("{context}: {err}");
    let lower = msg.to_lowercase();
    if lower.contains("permission") || lower.contains("access denied") {
        Error::PermissionDenied(msg)
    } else {
        Error::Hid(msg)
    }
}

/// Exclusive handle on the settings channel of one attached mouse.
///
/// The handle is released on [`FrameTransport::close`] or drop, whichever
/// comes first.
pub struct HidFrameTransport {
    device: Option<hidapi::HidDevice>,
    info: DeviceInfo,
}

impl HidFrameTransport {
    /// Open the first supported mouse, preferring the wired connection.
    pub fn open_first_supported() -> Result<Self> {
        let api = hidapi::HidApi::new().map_err(|e| Error::Hid(e.to_string()))?;
        let mut devices = collect_devices(&api);
        devices.sort_by_key(|d| MouseModel::ALL.iter().position(|m| *m == d.model));
        let Some(info) = devices.into_iter().next() else {
            return Err(Error::DeviceNotFound(format!(
                "no Pulsar mouse (VID=0x{PULSAR_VID:04X}) on interface {}",
                Channel::Settings.interface()
            )));
        };
        Self::open_with(&api, info)
    }

    /// Open a specific discovered interface.
    pub fn open(info: DeviceInfo) -> Result<Self> {
        let api = hidapi::HidApi::new().map_err(|e| Error::Hid(e.to_string()))?;
        Self::open_with(&api, info)
    }

    fn open_with(api: &hidapi::HidApi, info: DeviceInfo) -> Result<Self> {
        let path = std::ffi::CString::new(info.path.clone())
            .map_err(|e| Error::Hid(format!("invalid device path: {e}")))?;
        let (vid, pid) = (info.vid, info.pid);
        let ctx = format!("open HID device (VID=0x{vid:04X} PID=0x{pid:04X})");
        let device = api.open_path(&path).map_err(|e| map_hid_error(&ctx, e))?;
        info!(model = info.model.name(), path = %info.path, "Opened settings channel");
        Ok(Self {
            device: Some(device),
            info,
        })
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn device(&self) -> Result<&hidapi::HidDevice> {
        let name = self.info.model.name();
        self.device
            .as_ref()
            .ok_or_else(|| Error::DeviceNotFound(format!("{name} handle closed")))
    }
}

impl FrameTransport for HidFrameTransport {
    fn write_frame(&self, data: &[u8]) -> Result<()> {
        let written = self
            .device()?
            .write(data)
            .map_err(|e| map_hid_error("write", e))?;
        if written != data.len() {
            return Err(Error::Hid(format!("short write: {written} of {} bytes", data.len())));
        }
        Ok(())
    }

    fn read_frame(&self, timeout: Duration) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; Channel::Settings.report_len()];
        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;
        let n = self
            .device()?
            .read_timeout(&mut buf, timeout_ms)
            .map_err(|e| map_hid_error("read_timeout", e))?;

        if n == 0 {
            return Err(Error::Timeout(format!("hid_read timed out after {timeout_ms}ms")));
        }
        buf.truncate(n);
        Ok(buf)
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn close(&mut self) {
        if self.device.take().is_some() {
            info!(model = self.info.model.name(), "Released settings channel");
        }
    }
}

impl Drop for HidFrameTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Polling rate options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum PollingRate {
    Hz125 = 125,
    Hz250 = 250,
    Hz500 = 500,
    Hz1000 = 1000,
}

impl PollingRate {
    /// Convert from raw Hz value.
    pub fn from_hz(hz: u16) -> Option<Self> {
        match hz {
            125 => Some(Self::Hz125),
            250 => Some(Self::Hz250),
            500 => Some(Self::Hz500),
            1000 => Some(Self::Hz1000),
            _ => None,
        }
    }

    /// Get the Hz value.
    pub fn as_hz(&self) -> u16 {
        *self as u16
    }

    /// Register encoding: the report interval in milliseconds.
    pub fn to_raw(self) -> u8 {
        match self {
            Self::Hz1000 => 1,
            Self::Hz500 => 2,
            Self::Hz250 => 4,
            Self::Hz125 => 8,
        }
    }

    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            1 => Ok(Self::Hz1000),
            2 => Ok(Self::Hz500),
            4 => Ok(Self::Hz250),
            8 => Ok(Self::Hz125),
            other => Err(Error::InvalidEncoding {
                field: "polling_rate",
                raw: vec![other],
            }),
        }
    }

    /// All supported rates.
    pub const ALL: &'static [PollingRate] = &[
        PollingRate::Hz125,
        PollingRate::Hz250,
        PollingRate::Hz500,
        PollingRate::Hz1000,
    ];
}

impl From<PollingRate> for u16 {
    fn from(rate: PollingRate) -> Self {
        rate.as_hz()
    }
}

impl TryFrom<u16> for PollingRate {
    type Error = String;

    fn try_from(hz: u16) -> std::result::Result<Self, Self::Error> {
        Self::from_hz(hz).ok_or_else(|| format!("unsupported polling rate {hz} Hz"))
    }
}

impl std::fmt::Display for PollingRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} Hz", self.as_hz())
    }
}
