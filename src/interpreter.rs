use crate::{
    command::{Command, DecodeError, ImagePlacement, RawCommand},
    image::ImageRegistry,
    scroll::scroll,
    text::TextMetrics,
    DrawingContext,
};

/// The value produced by a query command.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CommandOutput {
    PointInPath(bool),
    TextMetrics(TextMetrics),
}

/// Runs a batch of commands in order against `cx`.
///
/// Returns one slot per command. Only `IsPointInPath` and
/// `MeasureText` fill their slot.
pub fn execute(
    cx: &mut DrawingContext,
    images: &mut ImageRegistry,
    batch: impl IntoIterator<Item = Command>,
) -> Vec<Option<CommandOutput>> {
    batch
        .into_iter()
        .map(|command| dispatch(cx, images, command))
        .collect()
}

/// Decodes and runs a batch of wire commands.
///
/// A command that fails to decode is skipped and its slot is `None`.
/// The rest of the batch still runs.
pub fn execute_raw<'a>(
    cx: &mut DrawingContext,
    images: &mut ImageRegistry,
    batch: impl IntoIterator<Item = &'a RawCommand>,
) -> Vec<Option<CommandOutput>> {
    batch
        .into_iter()
        .map(|raw| match raw.decode() {
            Ok(command) => dispatch(cx, images, command),
            Err(e) => {
                match &e {
                    DecodeError::UnknownOperation(_) => log::trace!("Skipping command: {}", e),
                    _ => log::debug!("Skipping malformed command: {}", e),
                }
                None
            }
        })
        .collect()
}

fn dispatch(
    cx: &mut DrawingContext,
    images: &mut ImageRegistry,
    command: Command,
) -> Option<CommandOutput> {
    match command {
        Command::Save => {
            cx.save();
        }
        Command::Restore => {
            cx.restore();
        }

        Command::Scale { x, y } => {
            cx.scale(x, y);
        }
        Command::Rotate(angle) => {
            cx.rotate(angle);
        }
        Command::Translate { x, y } => {
            cx.translate(x, y);
        }
        Command::Transform([a, b, c, d, e, f]) => {
            cx.transform(a, b, c, d, e, f);
        }
        Command::SetTransform([a, b, c, d, e, f]) => {
            cx.set_transform(a, b, c, d, e, f);
        }

        Command::GlobalAlpha(alpha) => {
            cx.set_global_alpha(alpha);
        }
        Command::GlobalCompositeOperation(op) => {
            cx.set_composite_op(op);
        }
        Command::StrokeStyle(color) => {
            cx.set_stroke_style(color);
        }
        Command::FillStyle(color) => {
            cx.set_fill_style(color);
        }
        Command::LineWidth(width) => {
            cx.set_line_width(width);
        }
        Command::LineCap(cap) => {
            cx.set_line_cap(cap);
        }
        Command::LineJoin(join) => {
            cx.set_line_join(join);
        }
        Command::MiterLimit(limit) => {
            cx.set_miter_limit(limit);
        }
        Command::ShadowOffsetX(x) => {
            cx.set_shadow_offset_x(x);
        }
        Command::ShadowOffsetY(y) => {
            cx.set_shadow_offset_y(y);
        }
        Command::ShadowBlur(blur) => {
            cx.set_shadow_blur(blur);
        }
        Command::ShadowColor(color) => {
            cx.set_shadow_color(color);
        }
        Command::Font(font) => {
            cx.set_font(font);
        }
        Command::TextAlign(align) => {
            cx.set_text_align(align);
        }
        Command::TextBaseline(baseline) => {
            cx.set_text_baseline(baseline);
        }

        Command::ClearRect { x, y, w, h } => {
            cx.clear_rect(x, y, w, h);
        }
        Command::FillRect { x, y, w, h } => {
            cx.fill_rect(x, y, w, h);
        }
        Command::StrokeRect { x, y, w, h } => {
            cx.stroke_rect(x, y, w, h);
        }

        Command::BeginPath => {
            cx.begin_path();
        }
        Command::ClosePath => {
            cx.close_path();
        }
        Command::MoveTo { x, y } => {
            cx.move_to(x, y);
        }
        Command::LineTo { x, y } => {
            cx.line_to(x, y);
        }
        Command::QuadraticCurveTo { cpx, cpy, x, y } => {
            cx.quadratic_curve_to(cpx, cpy, x, y);
        }
        Command::BezierCurveTo {
            cp1x,
            cp1y,
            cp2x,
            cp2y,
            x,
            y,
        } => {
            cx.bezier_curve_to(cp1x, cp1y, cp2x, cp2y, x, y);
        }
        Command::ArcTo {
            x1,
            y1,
            x2,
            y2,
            radius,
        } => {
            cx.arc_to(x1, y1, x2, y2, radius);
        }
        Command::Rect { x, y, w, h } => {
            cx.rect(x, y, w, h);
        }
        Command::Arc {
            x,
            y,
            radius,
            start_angle,
            end_angle,
            anticlockwise,
        } => {
            cx.arc(x, y, radius, start_angle, end_angle, anticlockwise);
        }
        Command::Fill => {
            cx.fill();
        }
        Command::Stroke => {
            cx.stroke();
        }
        Command::Clip => {
            cx.clip();
        }
        Command::IsPointInPath { x, y } => {
            return Some(CommandOutput::PointInPath(cx.is_point_in_path(x, y)));
        }

        Command::FillText {
            text,
            x,
            y,
            max_width,
        } => {
            cx.fill_text(&text, x, y, max_width);
        }
        Command::StrokeText {
            text,
            x,
            y,
            max_width,
        } => {
            cx.stroke_text(&text, x, y, max_width);
        }
        Command::MeasureText(text) => {
            return Some(CommandOutput::TextMetrics(cx.measure_text(&text)));
        }

        Command::DrawImage { name, placement } => match images.get(&name) {
            Some(image) => match placement {
                ImagePlacement::At { dx, dy } => {
                    cx.draw_image(image, dx, dy);
                }
                ImagePlacement::Scaled { dx, dy, dw, dh } => {
                    cx.draw_image_scaled(image, dx, dy, dw, dh);
                }
                ImagePlacement::Region {
                    source: [sx, sy, sw, sh],
                    dest: [dx, dy, dw, dh],
                } => {
                    cx.draw_image_region(image, (sx, sy, sw, sh), (dx, dy, dw, dh));
                }
            },
            None => log::trace!("Image '{}' is not loaded; skipping draw", name),
        },
        Command::Scroll {
            x,
            y,
            w,
            h,
            dx,
            dy,
            fill_style,
        } => scroll(cx, x, y, w, h, dx, dy, fill_style),
        Command::LoadImage { name, url } => {
            images.load(&name, &url);
        }
    }
    None
}
