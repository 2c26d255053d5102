//! Conversions between raw register bytes and typed setting values.
//!
//! The firmware stores DPI as two independently-steppable factors: a 50-unit
//! step in the low byte (duplicated) and a 12800-unit step packed into both
//! nibbles of the third byte:
//!
//! ```text
//! q = dpi / 50 - 1
//! [q % 256, q % 256, (q / 256) << 2 | (q / 256) << 6]
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

pub const DPI_MIN: u32 = 50;
pub const DPI_MAX: u32 = 26000;
pub const DPI_STEP: u32 = 50;

/// DPI added per unit of the high factor.
const DPI_HIGH_STEP: u32 = 12800;

/// Bits of each nibble in the third DPI byte that must stay clear.
const NIBBLE_RESERVED: u8 = 0b0011;

/// Encode a DPI value into its 3-byte register form.
pub fn dpi_to_raw(dpi: u32) -> Result<[u8; 3]> {
    if !(DPI_MIN..=DPI_MAX).contains(&dpi) {
        return Err(Error::InvalidValue {
            field: "dpi",
            reason: format!("{dpi} outside {DPI_MIN}..={DPI_MAX}"),
        });
    }
    let (quotient, remainder) = (dpi / DPI_STEP, dpi % DPI_STEP);
    if remainder != 0 {
        return Err(Error::Alignment {
            dpi,
            step: DPI_STEP,
        });
    }

    let factor = quotient - 1;
    let high = (factor / 256) as u8;
    let low = (factor % 256) as u8;
    Ok([low, low, (high << 2) | (high << 6)])
}

/// Decode the 3-byte register form of a DPI value.
///
/// Only the encoding is checked. The decoded value is not range-checked:
/// a high-factor nibble of `0xC` decodes to as much as 51,200, above
/// [`DPI_MAX`].
pub fn dpi_from_raw(raw: [u8; 3]) -> Result<u32> {
    let invalid = || Error::InvalidEncoding {
        field: "dpi",
        raw: raw.to_vec(),
    };

    if raw[0] != raw[1] {
        return Err(invalid());
    }
    let low_nibble = raw[2] & 0x0F;
    let high_nibble = raw[2] >> 4;
    if low_nibble != high_nibble || low_nibble & NIBBLE_RESERVED != 0 {
        return Err(invalid());
    }

    let low = raw[1] as u32 + 1;
    let high = (low_nibble >> 2) as u32;
    Ok(low * DPI_STEP + high * DPI_HIGH_STEP)
}

/// An LED color as stored in three consecutive registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `rrggbb`.
    pub fn from_hex(value: &str) -> Result<Self> {
        let digits = value.strip_prefix('#').unwrap_or(value);
        let invalid = || Error::InvalidValue {
            field: "led_color",
            reason: format!("'{value}' is not a 6-digit hex color"),
        };

        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| invalid())
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    /// Lowercase `#rrggbb`.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_raw(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    pub fn from_raw(raw: [u8; 3]) -> Self {
        Self::new(raw[0], raw[1], raw[2])
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for Rgb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// Decode a strict boolean register: only 0 and 1 are valid.
pub fn bool_from_raw(field: &'static str, raw: u8) -> Result<bool> {
    match raw {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(Error::InvalidEncoding {
            field,
            raw: vec![other],
        }),
    }
}

pub fn bool_to_raw(value: bool) -> u8 {
    u8::from(value)
}

/// LED lighting effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LedEffect {
    Off = 0,
    Steady = 1,
    Breathe = 2,
}

impl LedEffect {
    pub const ALL: &'static [LedEffect] = &[LedEffect::Off, LedEffect::Steady, LedEffect::Breathe];

    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Self::Off),
            1 => Ok(Self::Steady),
            2 => Ok(Self::Breathe),
            other => Err(Error::InvalidEncoding {
                field: "led_effect",
                raw: vec![other],
            }),
        }
    }

    pub fn to_raw(self) -> u8 {
        self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Steady => "steady",
            Self::Breathe => "breathe",
        }
    }

    /// Case-insensitive parse of `off`, `steady`, or `breathe`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "off" => Some(Self::Off),
            "steady" => Some(Self::Steady),
            "breathe" => Some(Self::Breathe),
            _ => None,
        }
    }
}

impl std::fmt::Display for LedEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dpi_roundtrip_over_full_range() {
        for dpi in (DPI_MIN..=DPI_MAX).step_by(DPI_STEP as usize) {
            let raw = dpi_to_raw(dpi).unwrap();
            assert_eq!(dpi_from_raw(raw).unwrap(), dpi, "raw {raw:02X?}");
        }
    }

    #[test]
    fn dpi_encoding_shape_holds() {
        for dpi in (DPI_MIN..=DPI_MAX).step_by(DPI_STEP as usize) {
            let raw = dpi_to_raw(dpi).unwrap();
            assert_eq!(raw[0], raw[1]);
            assert_eq!(raw[2] & 0x0F, raw[2] >> 4);
            assert_eq!(raw[2] & 0b0011_0011, 0);
        }
    }

    #[test]
    fn dpi_known_encodings() {
        assert_eq!(dpi_to_raw(50).unwrap(), [0x00, 0x00, 0x00]);
        assert_eq!(dpi_to_raw(1600).unwrap(), [0x1F, 0x1F, 0x00]);
        assert_eq!(dpi_to_raw(12800).unwrap(), [0xFF, 0xFF, 0x00]);
        assert_eq!(dpi_to_raw(12850).unwrap(), [0x00, 0x00, 0x44]);
        assert_eq!(dpi_to_raw(26000).unwrap(), [0x07, 0x07, 0x88]);
    }

    #[test]
    fn dpi_decode_passes_values_above_max_through() {
        assert_eq!(dpi_from_raw([0x00, 0x00, 0xCC]).unwrap(), 38450);
        assert_eq!(dpi_from_raw([0xFF, 0xFF, 0xCC]).unwrap(), 51200);
        assert!(dpi_from_raw([0xFF, 0xFF, 0xCC]).unwrap() > DPI_MAX);
    }

    #[test]
    fn dpi_rejects_out_of_range() {
        assert!(matches!(dpi_to_raw(26050), Err(Error::InvalidValue { .. })));
        assert!(matches!(dpi_to_raw(0), Err(Error::InvalidValue { .. })));
    }

    #[test]
    fn dpi_rejects_misaligned() {
        assert!(matches!(dpi_to_raw(75), Err(Error::Alignment { dpi: 75, step: 50 })));
    }

    #[test]
    fn dpi_decode_rejects_bad_encodings() {
        // Low bytes disagree
        assert!(matches!(
            dpi_from_raw([0x01, 0x02, 0x00]),
            Err(Error::InvalidEncoding { .. })
        ));
        // Nibbles disagree
        assert!(dpi_from_raw([0x01, 0x01, 0x40]).is_err());
        // Reserved bits set
        assert!(dpi_from_raw([0x01, 0x01, 0x11]).is_err());
    }

    #[test]
    fn color_roundtrip() {
        let rgb = Rgb::from_hex("#1a2b3c").unwrap();
        assert_eq!(rgb.to_raw(), [0x1a, 0x2b, 0x3c]);
        assert_eq!(Rgb::from_raw([0x1a, 0x2b, 0x3c]).to_hex(), "#1a2b3c");
    }

    #[test]
    fn color_accepts_missing_prefix_and_uppercase() {
        assert_eq!(Rgb::from_hex("FF0080").unwrap(), Rgb::new(0xFF, 0x00, 0x80));
        assert_eq!("#00ff00".parse::<Rgb>().unwrap().to_string(), "#00ff00");
    }

    #[test]
    fn color_rejects_malformed_hex() {
        for bad in ["", "#12345", "#1234567", "#gg0000", "#+12345", "12 345"] {
            assert!(
                matches!(Rgb::from_hex(bad), Err(Error::InvalidValue { .. })),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn bool_is_strict() {
        assert!(!bool_from_raw("motion_sync", 0).unwrap());
        assert!(bool_from_raw("motion_sync", 1).unwrap());
        assert!(matches!(
            bool_from_raw("motion_sync", 2),
            Err(Error::InvalidEncoding { .. })
        ));
        assert_eq!(bool_to_raw(true), 1);
        assert_eq!(bool_to_raw(false), 0);
    }

    #[test]
    fn led_effect_raw_values() {
        for effect in LedEffect::ALL {
            assert_eq!(LedEffect::from_raw(effect.to_raw()).unwrap(), *effect);
            assert_eq!(LedEffect::from_name(effect.name()), Some(*effect));
        }
        assert!(matches!(LedEffect::from_raw(3), Err(Error::InvalidEncoding { .. })));
        assert_eq!(LedEffect::from_name("Rainbow"), None);
    }
}
