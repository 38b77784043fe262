//! Color values produced by color scales.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An 8-bit RGBA color.
///
/// Serializes as a hex string (`"#RRGGBB"` or `"#RRGGBBAA"`) so presets stay
/// readable in YAML/JSON; named colors are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Per-channel linear blend; `t` is clamped to `[0, 1]`.
    pub fn lerp(self, other: Rgba, t: f64) -> Rgba {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| -> u8 { (a as f64 + (b as f64 - a as f64) * t).round() as u8 };

        Rgba {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgba {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(named) = named_color(trimmed) {
            return Ok(named);
        }

        let hex = trimmed.trim_start_matches('#');
        let channel = |range: std::ops::Range<usize>| {
            hex.get(range)
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or_else(|| ColorParseError(s.to_string()))
        };

        match hex.len() {
            6 => Ok(Rgba::opaque(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
            8 => Ok(Rgba::new(
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)?,
            )),
            _ => Err(ColorParseError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Rgba {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgba> for String {
    fn from(color: Rgba) -> Self {
        color.to_hex()
    }
}

fn named_color(name: &str) -> Option<Rgba> {
    let color = match name.to_lowercase().as_str() {
        "black" => Rgba::opaque(0, 0, 0),
        "white" => Rgba::opaque(255, 255, 255),
        "red" => Rgba::opaque(255, 0, 0),
        "green" => Rgba::opaque(0, 128, 0),
        "blue" => Rgba::opaque(0, 0, 255),
        "yellow" => Rgba::opaque(255, 255, 0),
        "orange" => Rgba::opaque(255, 165, 0),
        "purple" => Rgba::opaque(128, 0, 128),
        "gray" | "grey" => Rgba::opaque(128, 128, 128),
        _ => return None,
    };
    Some(color)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color '{0}', expected #RRGGBB, #RRGGBBAA or a color name")]
pub struct ColorParseError(pub String);

/// Result of a per-pixel color lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelColor {
    /// Nothing is drawn for this pixel.
    Transparent,
    Color(Rgba),
}

impl PixelColor {
    pub fn is_transparent(&self) -> bool {
        matches!(self, PixelColor::Transparent)
    }

    pub fn color(&self) -> Option<Rgba> {
        match self {
            PixelColor::Transparent => None,
            PixelColor::Color(c) => Some(*c),
        }
    }

    /// RGBA bytes as written into a renderer buffer; transparent is all zero.
    pub fn to_rgba_bytes(&self) -> [u8; 4] {
        match self {
            PixelColor::Transparent => [0, 0, 0, 0],
            PixelColor::Color(c) => c.to_array(),
        }
    }
}

impl From<Rgba> for PixelColor {
    fn from(color: Rgba) -> Self {
        PixelColor::Color(color)
    }
}

impl fmt::Display for PixelColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelColor::Transparent => f.write_str("transparent"),
            PixelColor::Color(c) => write!(f, "{}", c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!("#FF0000".parse::<Rgba>().unwrap(), Rgba::opaque(255, 0, 0));
        assert_eq!("00ff00".parse::<Rgba>().unwrap(), Rgba::opaque(0, 255, 0));
        assert_eq!(
            "#0000FF80".parse::<Rgba>().unwrap(),
            Rgba::new(0, 0, 255, 128)
        );
        assert_eq!("orange".parse::<Rgba>().unwrap(), Rgba::opaque(255, 165, 0));
        assert!("#GGGGGG".parse::<Rgba>().is_err());
        assert!("#FFF".parse::<Rgba>().is_err());
    }

    #[test]
    fn test_lerp_endpoints_and_midpoint() {
        let a = Rgba::opaque(0, 0, 0);
        let b = Rgba::opaque(200, 100, 50);

        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 0.5), Rgba::opaque(100, 50, 25));
        // Out-of-range t is clamped
        assert_eq!(a.lerp(b, 3.0), b);
    }

    #[test]
    fn test_serde_as_hex_string() {
        let color = Rgba::new(18, 52, 86, 255);
        let json = serde_json::to_string(&color).unwrap();
        assert_eq!(json, "\"#123456\"");

        let back: Rgba = serde_json::from_str(&json).unwrap();
        assert_eq!(back, color);
    }

    #[test]
    fn test_transparent_bytes() {
        assert_eq!(PixelColor::Transparent.to_rgba_bytes(), [0, 0, 0, 0]);
        assert_eq!(
            PixelColor::from(Rgba::opaque(1, 2, 3)).to_rgba_bytes(),
            [1, 2, 3, 255]
        );
    }
}
