use std::{fmt::Display, num::ParseFloatError, str::FromStr};

use ahash::AHashMap;
use once_cell::sync::Lazy;

/// An sRGB color with an alpha channel.
///
/// Unpremultiplied by convention.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Color([u8; 4]);

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(u8::MAX, u8::MAX, u8::MAX);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    /// Creates a color from its RGBA components.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    /// Creates a color from RGB components with 100% alpha.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, u8::MAX)
    }

    /// Gets the red component.
    pub fn red(&self) -> u8 {
        self.0[0]
    }

    /// Gets the green component.
    pub fn green(&self) -> u8 {
        self.0[1]
    }

    /// Gets the blue component.
    pub fn blue(&self) -> u8 {
        self.0[2]
    }

    /// Gets the alpha component.
    pub fn alpha(&self) -> u8 {
        self.0[3]
    }

    /// Gets the color as an array of values in RGBA order.
    pub fn to_array(&self) -> [u8; 4] {
        self.0
    }

    /// Creates a color from an array of values in RGBA order.
    pub fn from_array(array: [u8; 4]) -> Self {
        Self(array)
    }

    pub(crate) fn to_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.red(), self.green(), self.blue(), self.alpha())
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rgba = self.to_array();
        write!(f, "#{:02x}{:02x}{:02x}", rgba[0], rgba[1], rgba[2])?;
        if rgba[3] != u8::MAX {
            write!(f, "{:02x}", rgba[3])?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ColorParseError {
    #[error("expected parenthesis after color type")]
    MissingParenthesis,
    #[error("unknown color '{0}'")]
    UnknownColor(String),
    #[error("invalid hex color '{0}'")]
    BadHex(String),
    #[error(transparent)]
    BadValue(#[from] ParseFloatError),
    #[error("expected 3 or 4 color components but found {actual}")]
    ComponentMismatch { actual: usize },
}

impl FromStr for Color {
    type Err = ColorParseError;

    /// Parses a CSS color: `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`,
    /// `rgb(..)`, `rgba(..)` or a named color.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let lower = s.to_ascii_lowercase();
        if let Some(hex) = lower.strip_prefix('#') {
            parse_hex(hex)
        } else if let Some(rest) = lower.strip_prefix("rgba") {
            parse_functional(rest)
        } else if let Some(rest) = lower.strip_prefix("rgb") {
            parse_functional(rest)
        } else {
            NAMED_COLORS
                .get(lower.as_str())
                .copied()
                .ok_or(ColorParseError::UnknownColor(lower))
        }
    }
}

fn parse_hex(hex: &str) -> Result<Color, ColorParseError> {
    let bad = || ColorParseError::BadHex(hex.to_owned());
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(bad());
    }
    let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).map_err(|_| bad());
    let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| bad());
    match hex.len() {
        3 | 4 => {
            let mut rgba = [u8::MAX; 4];
            for (i, component) in rgba.iter_mut().enumerate().take(hex.len()) {
                *component = digit(i)? * 17;
            }
            Ok(Color(rgba))
        }
        6 | 8 => {
            let mut rgba = [u8::MAX; 4];
            for (i, component) in rgba.iter_mut().enumerate().take(hex.len() / 2) {
                *component = pair(i * 2)?;
            }
            Ok(Color(rgba))
        }
        _ => Err(bad()),
    }
}

/// Parses the parenthesized part of `rgb(r, g, b)` or `rgba(r, g, b, a)`.
///
/// Alpha is a fraction in `[0, 1]`; both forms accept an optional alpha.
fn parse_functional(s: &str) -> Result<Color, ColorParseError> {
    let components = parse_components(parenthesized(s)?)?;
    let channel = |v: f32| v.round().clamp(0., 255.) as u8;
    match *components.as_slice() {
        [r, g, b] => Ok(Color::rgb(channel(r), channel(g), channel(b))),
        [r, g, b, a] => Ok(Color::rgba(
            channel(r),
            channel(g),
            channel(b),
            channel(a.clamp(0., 1.) * 255.),
        )),
        _ => Err(ColorParseError::ComponentMismatch {
            actual: components.len(),
        }),
    }
}

fn parenthesized(s: &str) -> Result<&str, ColorParseError> {
    let s = s.trim();
    match (s.chars().next(), s.chars().last()) {
        (Some('('), Some(')')) if s.len() >= 2 => Ok(&s[1..s.len() - 1]),
        _ => Err(ColorParseError::MissingParenthesis),
    }
}

fn parse_components(s: &str) -> Result<Vec<f32>, ColorParseError> {
    let mut result = Vec::new();
    for part in s.split(',') {
        result.push(f32::from_str(part.trim())?);
    }
    Ok(result)
}

static NAMED_COLORS: Lazy<AHashMap<&'static str, Color>> = Lazy::new(|| {
    let mut map = AHashMap::new();
    for (name, color) in [
        ("transparent", Color::TRANSPARENT),
        ("black", Color::BLACK),
        ("white", Color::WHITE),
        ("red", Color::rgb(255, 0, 0)),
        ("lime", Color::rgb(0, 255, 0)),
        ("green", Color::rgb(0, 128, 0)),
        ("blue", Color::rgb(0, 0, 255)),
        ("yellow", Color::rgb(255, 255, 0)),
        ("cyan", Color::rgb(0, 255, 255)),
        ("aqua", Color::rgb(0, 255, 255)),
        ("magenta", Color::rgb(255, 0, 255)),
        ("fuchsia", Color::rgb(255, 0, 255)),
        ("gray", Color::rgb(128, 128, 128)),
        ("grey", Color::rgb(128, 128, 128)),
        ("silver", Color::rgb(192, 192, 192)),
        ("maroon", Color::rgb(128, 0, 0)),
        ("olive", Color::rgb(128, 128, 0)),
        ("teal", Color::rgb(0, 128, 128)),
        ("navy", Color::rgb(0, 0, 128)),
        ("purple", Color::rgb(128, 0, 128)),
        ("orange", Color::rgb(255, 165, 0)),
    ] {
        map.insert(name, color);
    }
    map
});
