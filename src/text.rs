//! Font selection and text outlines.
//!
//! Fonts are stored in a `fontdb` database and parsed with `ttf-parser`.
//! Text is turned into glyph outlines on a [`Path`], so filling and
//! stroking text goes through the same rasterization as any other shape.

use glam::{Affine2, Vec2};
use ttf_parser::{Face, GlyphId, OutlineBuilder};

use crate::{
    path::Path,
    types::{TextAlign, TextBaseline},
};

#[derive(Debug, thiserror::Error)]
pub enum FontParseError {
    #[error("font '{0}' does not specify a size")]
    MissingSize(String),
    #[error("font '{0}' does not specify a family")]
    MissingFamily(String),
}

#[derive(Debug, thiserror::Error)]
#[error("failed to parse font as TTF/OTF font data")]
pub struct MalformedFont;

/// A parsed CSS font shorthand, e.g. `italic bold 12px "Fira Sans", serif`.
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub size: f32,
    pub families: Vec<String>,
    pub bold: bool,
    pub italic: bool,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            size: 10.,
            families: vec!["sans-serif".to_owned()],
            bold: false,
            italic: false,
        }
    }
}

impl std::str::FromStr for Font {
    type Err = FontParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut font = Font {
            families: Vec::new(),
            ..Default::default()
        };
        let mut rest = s.trim();
        let mut found_size = false;

        while let Some(token) = rest.split_whitespace().next() {
            rest = rest[rest.find(token).unwrap_or(0) + token.len()..].trim_start();
            match token {
                "italic" | "oblique" => font.italic = true,
                "bold" | "bolder" | "600" | "700" | "800" | "900" => font.bold = true,
                "normal" | "lighter" | "small-caps" | "100" | "200" | "300" | "400" | "500" => {}
                _ => match parse_size(token) {
                    Some(size) => {
                        font.size = size;
                        found_size = true;
                        break;
                    }
                    None => return Err(FontParseError::MissingSize(s.to_owned())),
                },
            }
        }
        if !found_size {
            return Err(FontParseError::MissingSize(s.to_owned()));
        }

        font.families = rest
            .split(',')
            .map(|family| family.trim().trim_matches(|c| c == '"' || c == '\'').to_owned())
            .filter(|family| !family.is_empty())
            .collect();
        if font.families.is_empty() {
            return Err(FontParseError::MissingFamily(s.to_owned()));
        }
        Ok(font)
    }
}

/// Parses a font size in pixels. Accepts `px`, `pt` and `em`
/// units, with an optional `/line-height` suffix.
fn parse_size(token: &str) -> Option<f32> {
    let token = token.split('/').next()?;
    let (number, factor) = if let Some(n) = token.strip_suffix("px") {
        (n, 1.)
    } else if let Some(n) = token.strip_suffix("pt") {
        (n, 4. / 3.)
    } else if let Some(n) = token.strip_suffix("em") {
        (n, 16.)
    } else {
        return None;
    };
    let size = number.parse::<f32>().ok()? * factor;
    (size.is_finite() && size >= 0.).then(|| size)
}

/// Result of `measureText`.
///
/// `ascent` and `descent` are distances from the alphabetic baseline
/// and both positive.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct TextMetrics {
    pub width: f32,
    pub ascent: f32,
    pub descent: f32,
}

/// How to place a run of text.
#[derive(Debug, Copy, Clone)]
pub(crate) struct TextPlacement {
    pub origin: Vec2,
    pub align: TextAlign,
    pub baseline: TextBaseline,
    pub max_width: Option<f32>,
    pub transform: Affine2,
}

/// The fonts available to a session.
pub struct Fonts {
    db: fontdb::Database,
}

impl Default for Fonts {
    fn default() -> Self {
        Self {
            db: fontdb::Database::new(),
        }
    }
}

impl Fonts {
    pub fn add(&mut self, data: Vec<u8>) -> Result<(), MalformedFont> {
        Face::from_slice(&data, 0).map_err(|_| MalformedFont)?;
        self.db.load_font_data(data);
        Ok(())
    }

    pub fn load_system_fonts(&mut self) {
        self.db.load_system_fonts();
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Measures `text`. Without any usable font the metrics are zero.
    pub fn measure(&self, font: &Font, text: &str) -> TextMetrics {
        self.with_face(font, |face| {
            let scale = font.size / face.units_per_em() as f32;
            metrics(face, text, scale)
        })
        .unwrap_or_default()
    }

    /// Appends the outlines of `text` to `path`, in device space.
    ///
    /// Returns `false` if no font could be found.
    pub(crate) fn outline(
        &self,
        font: &Font,
        text: &str,
        placement: TextPlacement,
        path: &mut Path,
    ) -> bool {
        self.with_face(font, |face| {
            let scale = font.size / face.units_per_em() as f32;
            let metrics = metrics(face, text, scale);

            let squeeze = match placement.max_width {
                Some(max) if metrics.width > max && metrics.width > 0. => max.max(0.) / metrics.width,
                _ => 1.,
            };
            let mut pen_x =
                placement.origin.x - metrics.width * squeeze * placement.align.offset_factor();
            let baseline_y = placement.origin.y
                + placement.baseline.offset(metrics.ascent, -metrics.descent);

            for c in text.chars() {
                let glyph = face.glyph_index(c).unwrap_or(GlyphId(0));
                let mut builder = GlyphOutline {
                    path: &mut *path,
                    transform: placement.transform,
                    origin: Vec2::new(pen_x, baseline_y),
                    scale: Vec2::new(scale * squeeze, scale),
                };
                face.outline_glyph(glyph, &mut builder);
                pen_x += advance(face, glyph) * scale * squeeze;
            }
        })
        .is_some()
    }

    fn with_face<T>(&self, font: &Font, f: impl FnOnce(&Face) -> T) -> Option<T> {
        let id = self.query(font)?;
        self.db
            .with_face_data(id, |data, index| {
                Face::from_slice(data, index).ok().map(|face| f(&face))
            })
            .flatten()
    }

    fn query(&self, font: &Font) -> Option<fontdb::ID> {
        let families: Vec<fontdb::Family> = font
            .families
            .iter()
            .map(|family| match family.as_str() {
                "serif" => fontdb::Family::Serif,
                "sans-serif" => fontdb::Family::SansSerif,
                "monospace" => fontdb::Family::Monospace,
                "cursive" => fontdb::Family::Cursive,
                "fantasy" => fontdb::Family::Fantasy,
                name => fontdb::Family::Name(name),
            })
            .collect();
        let query = fontdb::Query {
            families: &families,
            weight: if font.bold {
                fontdb::Weight::BOLD
            } else {
                fontdb::Weight::NORMAL
            },
            stretch: fontdb::Stretch::Normal,
            style: if font.italic {
                fontdb::Style::Italic
            } else {
                fontdb::Style::Normal
            },
        };
        self.db.query(&query).or_else(|| {
            // Fall back to whatever we have rather than drawing nothing.
            let fallback = self.db.faces().first().map(|face| face.id);
            if fallback.is_some() {
                log::debug!("No font matches {:?}; using fallback", font.families);
            }
            fallback
        })
    }
}

fn advance(face: &Face, glyph: GlyphId) -> f32 {
    face.glyph_hor_advance(glyph).unwrap_or(0) as f32
}

fn metrics(face: &Face, text: &str, scale: f32) -> TextMetrics {
    let width = text
        .chars()
        .map(|c| advance(face, face.glyph_index(c).unwrap_or(GlyphId(0))))
        .sum::<f32>()
        * scale;
    TextMetrics {
        width,
        ascent: face.ascender() as f32 * scale,
        descent: -(face.descender() as f32) * scale,
    }
}

/// Receives glyph outlines in font units (y up) and emits
/// them onto a path in device space.
struct GlyphOutline<'a> {
    path: &'a mut Path,
    transform: Affine2,
    origin: Vec2,
    scale: Vec2,
}

impl GlyphOutline<'_> {
    fn map(&self, x: f32, y: f32) -> Vec2 {
        let user = self.origin + Vec2::new(x * self.scale.x, -y * self.scale.y);
        self.transform.transform_point2(user)
    }
}

impl OutlineBuilder for GlyphOutline<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.map(x, y);
        self.path.move_to(p);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.map(x, y);
        self.path.line_to(p);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (control, end) = (self.map(x1, y1), self.map(x, y));
        self.path.quad_to(control, end);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (control1, control2, end) = (self.map(x1, y1), self.map(x2, y2), self.map(x, y));
        self.path.cubic_to(control1, control2, end);
    }

    fn close(&mut self) {
        self.path.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_font_shorthand() {
        let font: Font = "italic bold 12px \"Fira Sans\", serif".parse().unwrap();
        assert_eq!(font.size, 12.);
        assert!(font.italic && font.bold);
        assert_eq!(font.families, vec!["Fira Sans".to_owned(), "serif".to_owned()]);

        let font: Font = "18pt/1.5 monospace".parse().unwrap();
        assert_eq!(font.size, 24.);
        assert_eq!(font.families, vec!["monospace".to_owned()]);
    }

    #[test]
    fn invalid_font_shorthand() {
        assert!(matches!(
            "bold Arial".parse::<Font>(),
            Err(FontParseError::MissingSize(_))
        ));
        assert!(matches!(
            "12px".parse::<Font>(),
            Err(FontParseError::MissingFamily(_))
        ));
        assert!(matches!(
            "".parse::<Font>(),
            Err(FontParseError::MissingSize(_))
        ));
    }

    #[test]
    fn no_fonts_means_zero_metrics() {
        let fonts = Fonts::default();
        assert_eq!(fonts.measure(&Font::default(), "hello"), TextMetrics::default());

        let mut path = Path::new();
        let drew = fonts.outline(
            &Font::default(),
            "hello",
            TextPlacement {
                origin: Vec2::ZERO,
                align: TextAlign::Start,
                baseline: TextBaseline::Alphabetic,
                max_width: None,
                transform: Affine2::IDENTITY,
            },
            &mut path,
        );
        assert!(!drew);
        assert!(path.is_empty());
    }

    #[test]
    fn garbage_font_data_is_rejected() {
        let mut fonts = Fonts::default();
        assert!(fonts.add(vec![0, 1, 2, 3]).is_err());
        assert!(fonts.is_empty());
    }
}
