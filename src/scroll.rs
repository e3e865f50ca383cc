//! Shifting a rectangle of pixels and filling the strip it exposes.

use crate::{Color, DrawingContext};

/// Integer geometry of one scroll, in device pixels.
///
/// Operands are clamped to the `i32` range and the plan is computed in
/// `i64`, so no combination of finite operands can overflow.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct ScrollPlan {
    copy_from: (i64, i64),
    copy_to: (i64, i64),
    copy_size: (i64, i64),
    fill_origin: (i64, i64),
    fill_size: (i64, i64),
}

impl ScrollPlan {
    fn new((x, y, w, h): (i64, i64, i64, i64), (dx, dy): (i64, i64)) -> Self {
        let (ax, ay) = (dx.abs(), dy.abs());
        Self {
            copy_from: (
                x + if dx >= 0 { 0 } else { ax },
                y + if dy >= 0 { 0 } else { ay },
            ),
            copy_to: (x + if dx > 0 { ax } else { 0 }, y + if dy > 0 { ay } else { 0 }),
            copy_size: (w - ax, h - ay),
            fill_origin: (
                x + if dx < 0 { w - ax - 1 } else { 0 },
                y + if dy < 0 { h - ay - 1 } else { 0 },
            ),
            fill_size: (if ax > 0 { ax } else { w }, if ay > 0 { ay } else { h }),
        }
    }

    /// The part of the copy whose source and destination both lie on a
    /// `width` x `height` surface.
    fn clipped_copy(
        &self,
        (width, height): (u32, u32),
    ) -> Option<((i32, i32), (u32, u32), (i32, i32))> {
        let (sx, len_x, tx) =
            clip_copy_span(self.copy_from.0, self.copy_to.0, self.copy_size.0, width)?;
        let (sy, len_y, ty) =
            clip_copy_span(self.copy_from.1, self.copy_to.1, self.copy_size.1, height)?;
        Some(((sx, sy), (len_x, len_y), (tx, ty)))
    }

    /// The fill rectangle intersected with a `width` x `height` surface.
    fn clipped_fill(&self, (width, height): (u32, u32)) -> Option<(i32, i32, u32, u32)> {
        let (x, w) = clip_span(self.fill_origin.0, self.fill_size.0, width)?;
        let (y, h) = clip_span(self.fill_origin.1, self.fill_size.1, height)?;
        Some((x, y, w, h))
    }
}

fn clip_copy_span(from: i64, to: i64, len: i64, limit: u32) -> Option<(i32, u32, i32)> {
    let limit = i64::from(limit);
    let start = (-from).max(-to).max(0);
    let end = len.min(limit - from).min(limit - to);
    if end <= start {
        return None;
    }
    Some(((from + start) as i32, (end - start) as u32, (to + start) as i32))
}

/// Normalizes a negative extent the way `fillRect` does, then clips.
fn clip_span(origin: i64, len: i64, limit: u32) -> Option<(i32, u32)> {
    let (origin, len) = if len < 0 { (origin + len, -len) } else { (origin, len) };
    let start = origin.max(0);
    let end = (origin + len).min(i64::from(limit));
    if end <= start {
        return None;
    }
    Some((start as i32, (end - start) as u32))
}

/// Shifts the pixels of the rectangle `(x, y, w, h)` by `(dx, dy)`
/// on the active surface, then fills the exposed strip with `fill_style`
/// if one is given.
///
/// Coordinates are device pixels. The copy ignores the transform,
/// clip and alpha of the current state. The fill happens under an
/// identity transform, and the caller's state is left as it was.
#[allow(clippy::too_many_arguments)]
pub fn scroll(
    cx: &mut DrawingContext,
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    dx: f32,
    dy: f32,
    fill_style: Option<Color>,
) {
    if ![x, y, w, h, dx, dy].iter().all(|v| v.is_finite()) {
        log::debug!("Ignoring scroll with non-finite operands");
        return;
    }
    let round = |v: f32| v.round().clamp(i32::MIN as f32, i32::MAX as f32) as i64;
    let plan = ScrollPlan::new((round(x), round(y), round(w), round(h)), (round(dx), round(dy)));
    let bounds = (cx.surface().width(), cx.surface().height());

    let (copy_w, copy_h) = plan.copy_size;
    if copy_w > 0 && copy_h > 0 {
        if let Some((from, size, to)) = plan.clipped_copy(bounds) {
            cx.surface().copy_region(from, size, to);
        }
    }

    if let Some(color) = fill_style {
        if let Some((fx, fy, fw, fh)) = plan.clipped_fill(bounds) {
            cx.save()
                .reset_transform()
                .set_fill_style(color)
                .fill_rect(fx as f32, fy as f32, fw as f32, fh as f32)
                .restore();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::RwLock;

    use super::*;
    use crate::{text::Fonts, Surface};

    const FILL: Color = Color::rgb(0, 0, 255);

    fn gradient(width: u32, height: u32) -> DrawingContext {
        let surface = Surface::new(width, height).unwrap();
        for (i, pixel) in surface.write().pixels_mut().iter_mut().enumerate() {
            let (x, y) = (i as u32 % width, i as u32 / width);
            *pixel = tiny_skia::ColorU8::from_rgba(x as u8 * 10, y as u8 * 10, 0, 255).premultiply();
        }
        DrawingContext::new(surface, Arc::new(RwLock::new(Fonts::default())))
    }

    fn pixels(cx: &DrawingContext) -> Vec<u32> {
        cx.surface().to_argb()
    }

    #[test]
    fn plan_follows_formula() {
        let plan = ScrollPlan::new((10, 20, 30, 40), (5, 0));
        assert_eq!(plan.copy_from, (10, 20));
        assert_eq!(plan.copy_to, (15, 20));
        assert_eq!(plan.copy_size, (25, 40));
        assert_eq!(plan.fill_origin, (10, 20));
        assert_eq!(plan.fill_size, (5, 40));

        let plan = ScrollPlan::new((10, 20, 30, 40), (0, -4));
        assert_eq!(plan.copy_from, (10, 24));
        assert_eq!(plan.copy_to, (10, 20));
        assert_eq!(plan.copy_size, (30, 36));
        assert_eq!(plan.fill_origin, (10, 20 + 40 - 4 - 1));
        assert_eq!(plan.fill_size, (30, 4));
    }

    #[test]
    fn shift_right_fills_left_strip() {
        let mut cx = gradient(8, 4);
        let before = cx.surface().snapshot();
        scroll(&mut cx, 0., 0., 8., 4., 2., 0., Some(FILL));

        let after = cx.surface().snapshot();
        for y in 0..4 {
            for x in 2..8 {
                assert_eq!(after.pixel(x, y), before.pixel(x - 2, y));
            }
            for x in 0..2 {
                assert_eq!(cx.surface().pixel(x, y), Some(FILL));
            }
        }
    }

    #[test]
    fn zero_displacement() {
        let mut cx = gradient(6, 6);
        let before = pixels(&cx);
        scroll(&mut cx, 1., 1., 4., 4., 0., 0., None);
        assert_eq!(pixels(&cx), before);

        scroll(&mut cx, 1., 1., 4., 4., 0., 0., Some(FILL));
        for y in 0..6 {
            for x in 0..6 {
                let inside = (1..5).contains(&x) && (1..5).contains(&y);
                let expected = if inside {
                    0xff0000ff
                } else {
                    before[(y * 6 + x) as usize]
                };
                assert_eq!(pixels(&cx)[(y * 6 + x) as usize], expected);
            }
        }
    }

    #[test]
    fn displacement_larger_than_region_only_fills() {
        let mut cx = gradient(4, 4);
        let before = pixels(&cx);
        scroll(&mut cx, 0., 0., 2., 2., 5., 0., None);
        assert_eq!(pixels(&cx), before);
    }

    #[test]
    fn state_is_preserved() {
        let mut cx = gradient(4, 4);
        cx.translate(1., 1.).set_fill_style(Color::WHITE);
        let state = cx.state().clone();
        scroll(&mut cx, 0., 0., 4., 4., 1., 1., Some(FILL));
        assert_eq!(cx.state(), &state);
    }

    #[test]
    fn shift_left_fills_before_last_column() {
        let mut cx = gradient(8, 4);
        let before = cx.surface().snapshot();
        scroll(&mut cx, 0., 0., 8., 4., -2., 0., Some(FILL));

        let after = cx.surface().snapshot();
        for y in 0..4 {
            for x in 0..5 {
                assert_eq!(after.pixel(x, y), before.pixel(x + 2, y));
            }
            for x in 5..7 {
                assert_eq!(cx.surface().pixel(x, y), Some(FILL));
            }
            assert_eq!(after.pixel(7, y), before.pixel(7, y));
        }
    }

    #[test]
    fn shift_up_fills_before_last_row() {
        let mut cx = gradient(4, 8);
        let before = cx.surface().snapshot();
        scroll(&mut cx, 0., 0., 4., 8., 0., -3., Some(FILL));

        let after = cx.surface().snapshot();
        for x in 0..4 {
            for y in 0..4 {
                assert_eq!(after.pixel(x, y), before.pixel(x, y + 3));
            }
            for y in 4..7 {
                assert_eq!(cx.surface().pixel(x, y), Some(FILL));
            }
            assert_eq!(after.pixel(x, 7), before.pixel(x, 7));
        }
    }

    #[test]
    fn huge_displacements_skip_copy() {
        for (dx, dy) in [(-3.0e9, 0.), (3.0e9, 0.), (0., -f32::MAX), (f32::MAX, 1.0e30)] {
            let mut cx = gradient(16, 16);
            scroll(&mut cx, 0., 0., 10., 10., dx, dy, Some(Color::WHITE));
            scroll(&mut cx, 1.0e12, -1.0e12, 1.0e12, 1.0e12, 1., 1., Some(FILL));
        }

        let mut cx = gradient(16, 16);
        let before = cx.surface().snapshot();
        scroll(&mut cx, 0., 0., 10., 10., -3.0e9, 0., Some(Color::WHITE));
        let after = cx.surface().snapshot();
        for y in 0..16 {
            for x in 0..16 {
                let filled = x < 9 && y < 10;
                if filled {
                    assert_eq!(cx.surface().pixel(x, y), Some(Color::WHITE));
                } else {
                    assert_eq!(after.pixel(x, y), before.pixel(x, y));
                }
            }
        }
    }

    #[test]
    fn randomized_scrolls_stay_inside_rectangle() {
        let rng = fastrand::Rng::with_seed(7);
        for _ in 0..50 {
            let (width, height) = (16, 12);
            let mut cx = gradient(width, height);
            let before = cx.surface().snapshot();

            let x = rng.i32(0..8);
            let y = rng.i32(0..6);
            let w = rng.i32(2..=(width as i32 - x));
            let h = rng.i32(2..=(height as i32 - y));
            let dx = rng.i32(-(w - 1)..w);
            let dy = rng.i32(-(h - 1)..h);
            scroll(
                &mut cx,
                x as f32,
                y as f32,
                w as f32,
                h as f32,
                dx as f32,
                dy as f32,
                Some(FILL),
            );

            let plan = ScrollPlan::new(
                (x as i64, y as i64, w as i64, h as i64),
                (dx as i64, dy as i64),
            );
            let (fx, fy) = (plan.fill_origin.0 as i32, plan.fill_origin.1 as i32);
            let (fw, fh) = (plan.fill_size.0 as i32, plan.fill_size.1 as i32);

            let after = cx.surface().snapshot();
            let (ax, ay) = (dx.abs(), dy.abs());
            for py in 0..height as i32 {
                for px in 0..width as i32 {
                    let inside = px >= x && px < x + w && py >= y && py < y + h;
                    let in_fill = px >= fx && px < fx + fw && py >= fy && py < fy + fh;
                    let here = after.pixel(px as u32, py as u32);
                    if in_fill {
                        assert!(inside);
                        assert_eq!(cx.surface().pixel(px as u32, py as u32), Some(FILL));
                        continue;
                    }
                    if !inside {
                        assert_eq!(here, before.pixel(px as u32, py as u32));
                        continue;
                    }
                    // Pixels in the destination block come from the shifted source.
                    let to_x = x + if dx > 0 { ax } else { 0 };
                    let to_y = y + if dy > 0 { ay } else { 0 };
                    if px >= to_x && px < to_x + w - ax && py >= to_y && py < to_y + h - ay {
                        let from = ((px - dx) as u32, (py - dy) as u32);
                        assert_eq!(here, before.pixel(from.0, from.1));
                    }
                }
            }
        }
    }
}
