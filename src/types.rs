use std::str::FromStr;

use tiny_skia::BlendMode;

/// A keyword that did not name any value of the expected type.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownKeyword {
    kind: &'static str,
    value: String,
}

impl UnknownKeyword {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LineJoin {
    Miter,
    Round,
    Bevel,
}

impl Default for LineCap {
    fn default() -> Self {
        LineCap::Butt
    }
}

impl Default for LineJoin {
    fn default() -> Self {
        LineJoin::Miter
    }
}

impl FromStr for LineCap {
    type Err = UnknownKeyword;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "butt" => Ok(LineCap::Butt),
            "round" => Ok(LineCap::Round),
            "square" => Ok(LineCap::Square),
            _ => Err(UnknownKeyword::new("line cap", s)),
        }
    }
}

impl FromStr for LineJoin {
    type Err = UnknownKeyword;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "miter" => Ok(LineJoin::Miter),
            "round" => Ok(LineJoin::Round),
            "bevel" => Ok(LineJoin::Bevel),
            _ => Err(UnknownKeyword::new("line join", s)),
        }
    }
}

impl From<LineCap> for tiny_skia::LineCap {
    fn from(cap: LineCap) -> Self {
        match cap {
            LineCap::Butt => tiny_skia::LineCap::Butt,
            LineCap::Round => tiny_skia::LineCap::Round,
            LineCap::Square => tiny_skia::LineCap::Square,
        }
    }
}

impl From<LineJoin> for tiny_skia::LineJoin {
    fn from(join: LineJoin) -> Self {
        match join {
            LineJoin::Miter => tiny_skia::LineJoin::Miter,
            LineJoin::Round => tiny_skia::LineJoin::Round,
            LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
        }
    }
}

/// Horizontal anchoring of text relative to the draw position.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextAlign {
    Start,
    End,
    Left,
    Right,
    Center,
}

impl Default for TextAlign {
    fn default() -> Self {
        TextAlign::Start
    }
}

impl TextAlign {
    /// Fraction of the text width to shift left by.
    ///
    /// Text direction is always left-to-right, so `Start == Left`.
    pub(crate) fn offset_factor(self) -> f32 {
        match self {
            TextAlign::Start | TextAlign::Left => 0.,
            TextAlign::Center => 0.5,
            TextAlign::End | TextAlign::Right => 1.,
        }
    }
}

impl FromStr for TextAlign {
    type Err = UnknownKeyword;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(TextAlign::Start),
            "end" => Ok(TextAlign::End),
            "left" => Ok(TextAlign::Left),
            "right" => Ok(TextAlign::Right),
            "center" => Ok(TextAlign::Center),
            _ => Err(UnknownKeyword::new("text align", s)),
        }
    }
}

/// Vertical anchoring of text relative to the draw position.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextBaseline {
    Top,
    Hanging,
    Middle,
    Alphabetic,
    Ideographic,
    Bottom,
}

impl Default for TextBaseline {
    fn default() -> Self {
        TextBaseline::Alphabetic
    }
}

impl TextBaseline {
    /// Distance to move the alphabetic baseline down by, given
    /// the font's ascent (positive) and descent (negative).
    pub(crate) fn offset(self, ascent: f32, descent: f32) -> f32 {
        match self {
            TextBaseline::Top | TextBaseline::Hanging => ascent,
            TextBaseline::Middle => (ascent + descent) / 2.,
            TextBaseline::Alphabetic => 0.,
            TextBaseline::Ideographic | TextBaseline::Bottom => descent,
        }
    }
}

impl FromStr for TextBaseline {
    type Err = UnknownKeyword;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(TextBaseline::Top),
            "hanging" => Ok(TextBaseline::Hanging),
            "middle" => Ok(TextBaseline::Middle),
            "alphabetic" => Ok(TextBaseline::Alphabetic),
            "ideographic" => Ok(TextBaseline::Ideographic),
            "bottom" => Ok(TextBaseline::Bottom),
            _ => Err(UnknownKeyword::new("text baseline", s)),
        }
    }
}

/// A `globalCompositeOperation` value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CompositeOp(BlendMode);

impl CompositeOp {
    pub fn blend_mode(self) -> BlendMode {
        self.0
    }
}

impl Default for CompositeOp {
    fn default() -> Self {
        CompositeOp(BlendMode::SourceOver)
    }
}

impl FromStr for CompositeOp {
    type Err = UnknownKeyword;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = match s {
            "source-over" => BlendMode::SourceOver,
            "source-in" => BlendMode::SourceIn,
            "source-out" => BlendMode::SourceOut,
            "source-atop" => BlendMode::SourceAtop,
            "destination-over" => BlendMode::DestinationOver,
            "destination-in" => BlendMode::DestinationIn,
            "destination-out" => BlendMode::DestinationOut,
            "destination-atop" => BlendMode::DestinationAtop,
            "lighter" => BlendMode::Plus,
            "copy" => BlendMode::Source,
            "xor" => BlendMode::Xor,
            "multiply" => BlendMode::Multiply,
            "screen" => BlendMode::Screen,
            "overlay" => BlendMode::Overlay,
            "darken" => BlendMode::Darken,
            "lighten" => BlendMode::Lighten,
            "color-dodge" => BlendMode::ColorDodge,
            "color-burn" => BlendMode::ColorBurn,
            "hard-light" => BlendMode::HardLight,
            "soft-light" => BlendMode::SoftLight,
            "difference" => BlendMode::Difference,
            "exclusion" => BlendMode::Exclusion,
            "hue" => BlendMode::Hue,
            "saturation" => BlendMode::Saturation,
            "color" => BlendMode::Color,
            "luminosity" => BlendMode::Luminosity,
            _ => return Err(UnknownKeyword::new("composite operation", s)),
        };
        Ok(CompositeOp(mode))
    }
}
