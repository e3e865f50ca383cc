//! Drawing commands and their wire form.
//!
//! A [`Command`] is one typed drawing operation. Callers that live
//! across a serialization boundary send [`RawCommand`]s instead,
//! `[name, operand...]` tuples that decode into `Command`s.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    text::Font,
    types::{CompositeOp, LineCap, LineJoin, TextAlign, TextBaseline},
    Color,
};

/// Where to draw an image.
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePlacement {
    /// Natural size at `(dx, dy)`.
    At { dx: f32, dy: f32 },
    /// Scaled into `(dx, dy, dw, dh)`.
    Scaled { dx: f32, dy: f32, dw: f32, dh: f32 },
    /// The `source` region of the image drawn into `dest`.
    Region { source: [f32; 4], dest: [f32; 4] },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Save,
    Restore,

    Scale { x: f32, y: f32 },
    Rotate(f32),
    Translate { x: f32, y: f32 },
    /// `[a, b, c, d, e, f]`
    Transform([f32; 6]),
    SetTransform([f32; 6]),

    GlobalAlpha(f32),
    GlobalCompositeOperation(CompositeOp),
    StrokeStyle(Color),
    FillStyle(Color),
    LineWidth(f32),
    LineCap(LineCap),
    LineJoin(LineJoin),
    MiterLimit(f32),
    ShadowOffsetX(f32),
    ShadowOffsetY(f32),
    ShadowBlur(f32),
    ShadowColor(Color),
    Font(Font),
    TextAlign(TextAlign),
    TextBaseline(TextBaseline),

    ClearRect { x: f32, y: f32, w: f32, h: f32 },
    FillRect { x: f32, y: f32, w: f32, h: f32 },
    StrokeRect { x: f32, y: f32, w: f32, h: f32 },

    BeginPath,
    ClosePath,
    MoveTo { x: f32, y: f32 },
    LineTo { x: f32, y: f32 },
    QuadraticCurveTo { cpx: f32, cpy: f32, x: f32, y: f32 },
    BezierCurveTo { cp1x: f32, cp1y: f32, cp2x: f32, cp2y: f32, x: f32, y: f32 },
    ArcTo { x1: f32, y1: f32, x2: f32, y2: f32, radius: f32 },
    Rect { x: f32, y: f32, w: f32, h: f32 },
    Arc { x: f32, y: f32, radius: f32, start_angle: f32, end_angle: f32, anticlockwise: bool },
    Fill,
    Stroke,
    Clip,
    IsPointInPath { x: f32, y: f32 },

    FillText { text: String, x: f32, y: f32, max_width: Option<f32> },
    StrokeText { text: String, x: f32, y: f32, max_width: Option<f32> },
    MeasureText(String),

    DrawImage { name: String, placement: ImagePlacement },
    Scroll { x: f32, y: f32, w: f32, h: f32, dx: f32, dy: f32, fill_style: Option<Color> },
    LoadImage { name: String, url: String },
}

/// One operand of a [`RawCommand`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<f64> for Operand {
    fn from(n: f64) -> Self {
        Operand::Number(n)
    }
}

impl From<f32> for Operand {
    fn from(n: f32) -> Self {
        Operand::Number(n.into())
    }
}

impl From<i32> for Operand {
    fn from(n: i32) -> Self {
        Operand::Number(n.into())
    }
}

impl From<bool> for Operand {
    fn from(b: bool) -> Self {
        Operand::Bool(b)
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Operand::Text(s.to_owned())
    }
}

impl From<String> for Operand {
    fn from(s: String) -> Self {
        Operand::Text(s)
    }
}

impl<T: Into<Operand>> From<Option<T>> for Operand {
    fn from(value: Option<T>) -> Self {
        value.map_or(Operand::Null, Into::into)
    }
}

/// A command in wire form: the operation name followed by its operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawCommand(pub Vec<Operand>);

impl RawCommand {
    pub fn new(op: &str, operands: impl IntoIterator<Item = Operand>) -> Self {
        let mut raw = vec![Operand::from(op)];
        raw.extend(operands);
        Self(raw)
    }

    /// The operation name, if the first element is a string.
    pub fn op(&self) -> Option<&str> {
        match self.0.first() {
            Some(Operand::Text(op)) => Some(op.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("command does not start with an operation name")]
    MissingOperation,
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),
    #[error("'{op}' expects {expected:?} operands, found {found}")]
    Arity {
        op: String,
        expected: &'static [usize],
        found: usize,
    },
    #[error("operand {index} of '{op}' should be {expected}")]
    Operand {
        op: String,
        index: usize,
        expected: &'static str,
    },
}

impl TryFrom<&RawCommand> for Command {
    type Error = DecodeError;

    fn try_from(raw: &RawCommand) -> Result<Self, Self::Error> {
        raw.decode()
    }
}

impl RawCommand {
    pub fn decode(&self) -> Result<Command, DecodeError> {
        let op = self.op().ok_or(DecodeError::MissingOperation)?;
        let args = Operands {
            op,
            operands: &self.0[1..],
        };

        let command = match op {
            "save" => args.arity(&[0]).map(|_| Command::Save)?,
            "restore" => args.arity(&[0]).map(|_| Command::Restore)?,

            "scale" => {
                let [x, y] = args.numbers()?;
                Command::Scale { x, y }
            }
            "rotate" => {
                let [angle] = args.numbers()?;
                Command::Rotate(angle)
            }
            "translate" => {
                let [x, y] = args.numbers()?;
                Command::Translate { x, y }
            }
            "transform" => Command::Transform(args.numbers()?),
            "setTransform" => Command::SetTransform(args.numbers()?),

            "globalAlpha" => Command::GlobalAlpha(args.single_number()?),
            "globalCompositeOperation" => {
                Command::GlobalCompositeOperation(args.single_keyword("a composite operation")?)
            }
            "strokeStyle" => Command::StrokeStyle(args.single_keyword("a color")?),
            "fillStyle" => Command::FillStyle(args.single_keyword("a color")?),
            "lineWidth" => Command::LineWidth(args.single_number()?),
            "lineCap" => Command::LineCap(args.single_keyword("a line cap")?),
            "lineJoin" => Command::LineJoin(args.single_keyword("a line join")?),
            "miterLimit" => Command::MiterLimit(args.single_number()?),
            "shadowOffsetX" => Command::ShadowOffsetX(args.single_number()?),
            "shadowOffsetY" => Command::ShadowOffsetY(args.single_number()?),
            "shadowBlur" => Command::ShadowBlur(args.single_number()?),
            "shadowColor" => Command::ShadowColor(args.single_keyword("a color")?),
            "font" => Command::Font(args.single_keyword("a CSS font")?),
            "textAlign" => Command::TextAlign(args.single_keyword("a text alignment")?),
            "textBaseline" => Command::TextBaseline(args.single_keyword("a text baseline")?),

            "clearRect" => {
                let [x, y, w, h] = args.numbers()?;
                Command::ClearRect { x, y, w, h }
            }
            "fillRect" => {
                let [x, y, w, h] = args.numbers()?;
                Command::FillRect { x, y, w, h }
            }
            "strokeRect" => {
                let [x, y, w, h] = args.numbers()?;
                Command::StrokeRect { x, y, w, h }
            }

            "beginPath" => args.arity(&[0]).map(|_| Command::BeginPath)?,
            "closePath" => args.arity(&[0]).map(|_| Command::ClosePath)?,
            "moveTo" => {
                let [x, y] = args.numbers()?;
                Command::MoveTo { x, y }
            }
            "lineTo" => {
                let [x, y] = args.numbers()?;
                Command::LineTo { x, y }
            }
            "quadraticCurveTo" => {
                let [cpx, cpy, x, y] = args.numbers()?;
                Command::QuadraticCurveTo { cpx, cpy, x, y }
            }
            "bezierCurveTo" => {
                let [cp1x, cp1y, cp2x, cp2y, x, y] = args.numbers()?;
                Command::BezierCurveTo {
                    cp1x,
                    cp1y,
                    cp2x,
                    cp2y,
                    x,
                    y,
                }
            }
            "arcTo" => {
                let [x1, y1, x2, y2, radius] = args.numbers()?;
                Command::ArcTo {
                    x1,
                    y1,
                    x2,
                    y2,
                    radius,
                }
            }
            "rect" => {
                let [x, y, w, h] = args.numbers()?;
                Command::Rect { x, y, w, h }
            }
            "arc" => {
                args.arity(&[5, 6])?;
                Command::Arc {
                    x: args.number(0)?,
                    y: args.number(1)?,
                    radius: args.number(2)?,
                    start_angle: args.number(3)?,
                    end_angle: args.number(4)?,
                    anticlockwise: args.optional_bool(5)?,
                }
            }
            "fill" => args.arity(&[0]).map(|_| Command::Fill)?,
            "stroke" => args.arity(&[0]).map(|_| Command::Stroke)?,
            "clip" => args.arity(&[0]).map(|_| Command::Clip)?,
            "isPointInPath" => {
                let [x, y] = args.numbers()?;
                Command::IsPointInPath { x, y }
            }

            "fillText" | "strokeText" => {
                args.arity(&[3, 4])?;
                let (text, x, y) = (args.text(0)?.to_owned(), args.number(1)?, args.number(2)?);
                let max_width = args.optional_number(3)?;
                if op == "fillText" {
                    Command::FillText {
                        text,
                        x,
                        y,
                        max_width,
                    }
                } else {
                    Command::StrokeText {
                        text,
                        x,
                        y,
                        max_width,
                    }
                }
            }
            "measureText" => {
                args.arity(&[1])?;
                Command::MeasureText(args.text(0)?.to_owned())
            }

            "drawImage" => {
                args.arity(&[3, 5, 9])?;
                let name = args.text(0)?.to_owned();
                let tail = (1..args.operands.len())
                    .map(|i| args.number(i))
                    .collect::<Result<Vec<_>, _>>()?;
                let placement = match tail[..] {
                    [dx, dy] => ImagePlacement::At { dx, dy },
                    [dx, dy, dw, dh] => ImagePlacement::Scaled { dx, dy, dw, dh },
                    [sx, sy, sw, sh, dx, dy, dw, dh] => ImagePlacement::Region {
                        source: [sx, sy, sw, sh],
                        dest: [dx, dy, dw, dh],
                    },
                    _ => {
                        return Err(DecodeError::Arity {
                            op: op.to_owned(),
                            expected: &[3, 5, 9],
                            found: args.operands.len(),
                        })
                    }
                };
                Command::DrawImage { name, placement }
            }
            "scroll" => {
                args.arity(&[7])?;
                let fill_style = match &args.operands[6] {
                    Operand::Null => None,
                    _ => Some(args.keyword(6, "a color or null")?),
                };
                Command::Scroll {
                    x: args.number(0)?,
                    y: args.number(1)?,
                    w: args.number(2)?,
                    h: args.number(3)?,
                    dx: args.number(4)?,
                    dy: args.number(5)?,
                    fill_style,
                }
            }
            "loadImage" => {
                args.arity(&[2])?;
                Command::LoadImage {
                    name: args.text(0)?.to_owned(),
                    url: args.text(1)?.to_owned(),
                }
            }

            _ => return Err(DecodeError::UnknownOperation(op.to_owned())),
        };
        Ok(command)
    }
}

/// The operands of one raw command, with typed accessors
/// that produce decode errors.
struct Operands<'a> {
    op: &'a str,
    operands: &'a [Operand],
}

impl<'a> Operands<'a> {
    fn arity(&self, expected: &'static [usize]) -> Result<(), DecodeError> {
        if expected.contains(&self.operands.len()) {
            Ok(())
        } else {
            Err(DecodeError::Arity {
                op: self.op.to_owned(),
                expected,
                found: self.operands.len(),
            })
        }
    }

    fn mismatch(&self, index: usize, expected: &'static str) -> DecodeError {
        DecodeError::Operand {
            op: self.op.to_owned(),
            index,
            expected,
        }
    }

    fn number(&self, index: usize) -> Result<f32, DecodeError> {
        match self.operands.get(index) {
            Some(Operand::Number(n)) => Ok(*n as f32),
            _ => Err(self.mismatch(index, "a number")),
        }
    }

    /// Exactly `N` numeric operands.
    fn numbers<const N: usize>(&self) -> Result<[f32; N], DecodeError> {
        const ARITIES: [&[usize]; 7] = [&[0], &[1], &[2], &[3], &[4], &[5], &[6]];
        self.arity(ARITIES.get(N).copied().unwrap_or(&[]))?;
        let mut numbers = [0.; N];
        for (i, slot) in numbers.iter_mut().enumerate() {
            *slot = self.number(i)?;
        }
        Ok(numbers)
    }

    fn single_number(&self) -> Result<f32, DecodeError> {
        let [n] = self.numbers()?;
        Ok(n)
    }

    fn text(&self, index: usize) -> Result<&'a str, DecodeError> {
        match self.operands.get(index) {
            Some(Operand::Text(s)) => Ok(s.as_str()),
            _ => Err(self.mismatch(index, "a string")),
        }
    }

    fn keyword<T: FromStr>(&self, index: usize, expected: &'static str) -> Result<T, DecodeError> {
        self.text(index)?
            .trim()
            .parse()
            .map_err(|_| self.mismatch(index, expected))
    }

    fn single_keyword<T: FromStr>(&self, expected: &'static str) -> Result<T, DecodeError> {
        self.arity(&[1])?;
        self.keyword(0, expected)
    }

    fn optional_number(&self, index: usize) -> Result<Option<f32>, DecodeError> {
        match self.operands.get(index) {
            None | Some(Operand::Null) => Ok(None),
            Some(_) => self.number(index).map(Some),
        }
    }

    fn optional_bool(&self, index: usize) -> Result<bool, DecodeError> {
        match self.operands.get(index) {
            None | Some(Operand::Null) => Ok(false),
            Some(Operand::Bool(b)) => Ok(*b),
            Some(_) => Err(self.mismatch(index, "a boolean")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(op: &str, operands: Vec<Operand>) -> RawCommand {
        RawCommand::new(op, operands)
    }

    #[test]
    fn decode_numbers() {
        let command = raw("fillRect", vec![1.into(), 2.into(), 3.into(), 4.into()])
            .decode()
            .unwrap();
        assert_eq!(
            command,
            Command::FillRect {
                x: 1.,
                y: 2.,
                w: 3.,
                h: 4.
            }
        );

        let command = raw(
            "setTransform",
            vec![1.into(), 0.into(), 0.into(), 1.into(), 5.into(), 6.into()],
        )
        .decode()
        .unwrap();
        assert_eq!(command, Command::SetTransform([1., 0., 0., 1., 5., 6.]));
    }

    #[test]
    fn decode_styles() {
        assert_eq!(
            raw("fillStyle", vec!["#ff0000".into()]).decode().unwrap(),
            Command::FillStyle(Color::rgb(255, 0, 0))
        );
        assert_eq!(
            raw("lineCap", vec!["round".into()]).decode().unwrap(),
            Command::LineCap(LineCap::Round)
        );
        assert!(matches!(
            raw("fillStyle", vec!["not a color".into()]).decode(),
            Err(DecodeError::Operand { index: 0, .. })
        ));
    }

    #[test]
    fn unknown_and_malformed() {
        assert!(matches!(
            raw("frobnicate", vec![]).decode(),
            Err(DecodeError::UnknownOperation(op)) if op == "frobnicate"
        ));
        assert!(matches!(
            raw("moveTo", vec![1.into()]).decode(),
            Err(DecodeError::Arity { found: 1, .. })
        ));
        assert!(matches!(
            raw("moveTo", vec![1.into(), "two".into()]).decode(),
            Err(DecodeError::Operand { index: 1, .. })
        ));
        assert!(matches!(
            RawCommand(vec![Operand::Number(1.)]).decode(),
            Err(DecodeError::MissingOperation)
        ));
    }

    #[test]
    fn optional_trailing_operands() {
        let arc = raw("arc", vec![0.into(), 0.into(), 5.into(), 0.into(), 1.into()])
            .decode()
            .unwrap();
        assert!(matches!(arc, Command::Arc { anticlockwise: false, .. }));
        let arc = raw(
            "arc",
            vec![0.into(), 0.into(), 5.into(), 0.into(), 1.into(), true.into()],
        )
        .decode()
        .unwrap();
        assert!(matches!(arc, Command::Arc { anticlockwise: true, .. }));

        let text = raw("fillText", vec!["hi".into(), 1.into(), 2.into(), 30.into()])
            .decode()
            .unwrap();
        assert!(matches!(text, Command::FillText { max_width: Some(w), .. } if w == 30.));
    }

    #[test]
    fn draw_image_arity_selects_variant() {
        let numbers = |n: usize| (0..n).map(|i| Operand::from(i as f64)).collect::<Vec<_>>();
        let decode = |n: usize| {
            let mut operands = vec![Operand::from("logo")];
            operands.extend(numbers(n));
            raw("drawImage", operands).decode()
        };

        assert!(matches!(
            decode(2),
            Ok(Command::DrawImage { placement: ImagePlacement::At { .. }, .. })
        ));
        assert!(matches!(
            decode(4),
            Ok(Command::DrawImage { placement: ImagePlacement::Scaled { .. }, .. })
        ));
        assert!(matches!(
            decode(8),
            Ok(Command::DrawImage { placement: ImagePlacement::Region { .. }, .. })
        ));
        for n in [0, 1, 3, 5, 6, 7, 9] {
            assert!(matches!(decode(n), Err(DecodeError::Arity { .. })), "{} numbers", n);
        }
    }

    #[test]
    fn scroll_fill_style_may_be_null() {
        let mut operands: Vec<Operand> = (0..6).map(|i| Operand::from(i)).collect();
        operands.push(Operand::Null);
        let command = raw("scroll", operands.clone()).decode().unwrap();
        assert!(matches!(command, Command::Scroll { fill_style: None, .. }));

        operands[6] = "white".into();
        let command = raw("scroll", operands).decode().unwrap();
        assert!(matches!(
            command,
            Command::Scroll { fill_style: Some(Color::WHITE), .. }
        ));
    }
}
