//! Colors.

use core::convert::TryFrom;
use core::fmt;
use serde::{Deserialize, Serialize};

/// An RGBA color with components between 0 and 1.
///
/// Colors are written to descriptor documents as `#rrggbb` or `#rrggbbaa`, so only 8 bits per
/// channel survive a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0., 0., 0.);
    pub const WHITE: Color = Color::rgb(1., 1., 1.);

    pub const fn rgb(r: f64, g: f64, b: f64) -> Color {
        Color { r, g, b, a: 1. }
    }

    /// Creates a color from 8-bit channels.
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Color {
        Color {
            r: f64::from(r) / 255.,
            g: f64::from(g) / 255.,
            b: f64::from(b) / 255.,
            a: f64::from(a) / 255.,
        }
    }

    /// Parses `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(s: &str) -> Option<Color> {
        let hex = s.strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            3 => {
                let mut c = [0; 3];
                for (i, ch) in hex.chars().enumerate() {
                    let v = ch.to_digit(16)? as u8;
                    c[i] = v * 16 + v;
                }
                Some(Color::from_rgba8(c[0], c[1], c[2], 255))
            }
            6 => Some(Color::from_rgba8(channel(0)?, channel(2)?, channel(4)?, 255)),
            8 => Some(Color::from_rgba8(
                channel(0)?,
                channel(2)?,
                channel(4)?,
                channel(6)?,
            )),
            _ => None,
        }
    }

    /// Returns the channels quantized to 8 bits.
    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |c: f64| (c.max(0.).min(1.) * 255.).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let [r, g, b, a] = self.to_rgba8();
        if a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
        }
    }
}

impl TryFrom<String> for Color {
    type Error = String;
    fn try_from(s: String) -> Result<Color, String> {
        Color::from_hex(&s).ok_or_else(|| format!("invalid color {:?}", s))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> String {
        color.to_string()
    }
}

#[test]
fn test_hex_forms() {
    assert_eq!(Color::from_hex("#fff"), Some(Color::WHITE));
    assert_eq!(Color::from_hex("#000000"), Some(Color::BLACK));
    let c = Color::from_hex("#3d7eff80").unwrap();
    assert_eq!(c.to_rgba8(), [0x3d, 0x7e, 0xff, 0x80]);
    assert_eq!(c.to_string(), "#3d7eff80");
    assert_eq!(Color::from_hex("3d7eff"), None);
    assert_eq!(Color::from_hex("#3d7ef"), None);
}
