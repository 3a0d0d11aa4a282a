//! RGB colour values
//!
//! Colours serialise as six-digit lowercase hex so encoded graph
//! definitions stay byte-stable.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// An opaque RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// Construct from channel values
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a colour name or hex string
    ///
    /// Accepts `rrggbb` or `rgb` hex (leading `#` optional) and the named
    /// colours of the default palette plus black/white/gray.
    pub fn parse(s: &str) -> Option<Color> {
        let named = match s.to_ascii_lowercase().as_str() {
            "red" => Some(Color::rgb(255, 0, 0)),
            "green" => Some(Color::rgb(0, 255, 0)),
            "blue" => Some(Color::rgb(0, 0, 255)),
            "magenta" => Some(Color::rgb(255, 0, 255)),
            "yellow" => Some(Color::rgb(255, 255, 0)),
            "cyan" => Some(Color::rgb(0, 255, 255)),
            "pink" => Some(Color::rgb(255, 192, 203)),
            "orange" => Some(Color::rgb(255, 165, 0)),
            "black" => Some(Color::rgb(0, 0, 0)),
            "white" => Some(Color::rgb(255, 255, 255)),
            "gray" | "grey" => Some(Color::rgb(128, 128, 128)),
            _ => None,
        };
        if named.is_some() {
            return named;
        }

        let hex = s.strip_prefix('#').unwrap_or(s);
        match hex.len() {
            6 => {
                let v = u32::from_str_radix(hex, 16).ok()?;
                Some(Color::rgb((v >> 16) as u8, (v >> 8) as u8, v as u8))
            }
            3 => {
                let v = u32::from_str_radix(hex, 16).ok()?;
                let (r, g, b) = ((v >> 8) & 0xf, (v >> 4) & 0xf, v & 0xf);
                Some(Color::rgb(
                    (r << 4 | r) as u8,
                    (g << 4 | g) as u8,
                    (b << 4 | b) as u8,
                ))
            }
            _ => None,
        }
    }

    /// Lowercase `rrggbb` form
    pub fn to_hex(self) -> String {
        format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Perceptual luma, for grayscale palette mapping
    pub fn luma(self) -> u8 {
        (0.21 * self.r as f64 + 0.72 * self.g as f64 + 0.07 * self.b as f64) as u8
    }

    /// Blend `self` over `base` with opacity `alpha` in `[0, 1]`
    pub fn over(self, base: Color, alpha: f64) -> Color {
        let a = alpha.clamp(0.0, 1.0);
        let mix = |top: u8, bot: u8| (top as f64 * a + bot as f64 * (1.0 - a)).round() as u8;
        Color::rgb(mix(self.r, base.r), mix(self.g, base.g), mix(self.b, base.b))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::parse(&s).ok_or_else(|| D::Error::custom(format!("invalid color: {:?}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(Color::parse("ff0000"), Some(Color::rgb(255, 0, 0)));
        assert_eq!(Color::parse("#00ff00"), Some(Color::rgb(0, 255, 0)));
        assert_eq!(Color::parse("f00"), Some(Color::rgb(255, 0, 0)));
        assert_eq!(Color::parse("4682b4"), Some(Color::rgb(70, 130, 180)));
        assert!(Color::parse("xyz").is_none());
        assert!(Color::parse("ff00").is_none());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(Color::parse("red"), Some(Color::rgb(255, 0, 0)));
        assert_eq!(Color::parse("Orange"), Some(Color::rgb(255, 165, 0)));
        assert_eq!(Color::parse("grey"), Color::parse("gray"));
    }

    #[test]
    fn test_hex_round_trip() {
        let c = Color::rgb(70, 130, 180);
        assert_eq!(Color::parse(&c.to_hex()), Some(c));
    }

    #[test]
    fn test_blend_over() {
        let c = Color::rgb(255, 0, 0).over(Color::rgb(255, 255, 255), 0.4);
        assert_eq!(c, Color::rgb(255, 153, 153));
        let opaque = Color::rgb(10, 20, 30).over(Color::rgb(0, 0, 0), 1.0);
        assert_eq!(opaque, Color::rgb(10, 20, 30));
    }

    #[test]
    fn test_serde_as_hex_string() {
        let json = serde_json::to_string(&Color::rgb(255, 165, 0)).unwrap();
        assert_eq!(json, "\"ffa500\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Color::rgb(255, 165, 0));
    }
}
