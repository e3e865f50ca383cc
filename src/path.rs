use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::{Affine2, Vec2};
use tiny_skia::{FillRule, Paint, Pixmap, Transform};

/// A single element of a [`Path`], in device coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PathSegment {
    MoveTo(Vec2),
    LineTo(Vec2),
    QuadTo {
        control: Vec2,
        end: Vec2,
    },
    CubicTo {
        control1: Vec2,
        control2: Vec2,
        end: Vec2,
    },
    Close,
}

/// The path currently under construction on a drawing context.
///
/// Points are stored in device space: the transform in effect when a
/// point is added is baked in, so later transform changes don't
/// move geometry that was already emitted. This matches canvas semantics.
///
/// Maintains a current "pen position" which is `None` until the
/// first subpath is started.
#[derive(Debug, Clone, Default)]
pub struct Path {
    segments: Vec<PathSegment>,
    current: Option<Vec2>,
    subpath_start: Option<Vec2>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> impl Iterator<Item = PathSegment> + '_ {
        self.segments.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The pen position in device space.
    pub fn current_point(&self) -> Option<Vec2> {
        self.current
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.current = None;
        self.subpath_start = None;
    }

    /// Starts a new subpath at `point`.
    pub fn move_to(&mut self, point: Vec2) {
        self.segments.push(PathSegment::MoveTo(point));
        self.current = Some(point);
        self.subpath_start = Some(point);
    }

    /// Adds a line from the pen position to `point`.
    /// Without a pen position this behaves like `move_to`.
    pub fn line_to(&mut self, point: Vec2) {
        if self.current.is_none() {
            self.move_to(point);
            return;
        }
        self.segments.push(PathSegment::LineTo(point));
        self.current = Some(point);
    }

    pub fn quad_to(&mut self, control: Vec2, end: Vec2) {
        self.ensure_subpath(control);
        self.segments.push(PathSegment::QuadTo { control, end });
        self.current = Some(end);
    }

    pub fn cubic_to(&mut self, control1: Vec2, control2: Vec2, end: Vec2) {
        self.ensure_subpath(control1);
        self.segments.push(PathSegment::CubicTo {
            control1,
            control2,
            end,
        });
        self.current = Some(end);
    }

    /// Closes the current subpath. The pen returns to the subpath's start.
    pub fn close(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.segments.push(PathSegment::Close);
        self.current = self.subpath_start;
    }

    /// Adds a closed rectangle subpath given in user space.
    pub fn rect(&mut self, transform: Affine2, pos: Vec2, size: Vec2) {
        let map = |p: Vec2| transform.transform_point2(p);
        self.move_to(map(pos));
        self.line_to(map(pos + Vec2::new(size.x, 0.)));
        self.line_to(map(pos + size));
        self.line_to(map(pos + Vec2::new(0., size.y)));
        self.close();
        self.move_to(map(pos));
    }

    /// Adds a circular arc given in user space.
    ///
    /// A line connects the pen position to the arc's start point.
    /// Negative radii are ignored.
    pub fn arc(
        &mut self,
        transform: Affine2,
        center: Vec2,
        radius: f32,
        start_angle: f32,
        end_angle: f32,
        anticlockwise: bool,
    ) {
        if !(radius >= 0.) {
            return;
        }
        let first = transform.transform_point2(point_on_circle(center, radius, start_angle));
        self.line_to(first);

        let sweep = arc_sweep(start_angle, end_angle, anticlockwise);
        self.push_arc_segments(transform, center, radius, start_angle, sweep);
    }

    /// Adds an arc tangent to the lines `pen -> p1` and `p1 -> p2`,
    /// connected to the pen position by a straight line.
    pub fn arc_to(&mut self, transform: Affine2, p1: Vec2, p2: Vec2, radius: f32) {
        if !(radius >= 0.) {
            return;
        }
        let map = |p: Vec2| transform.transform_point2(p);
        let p0 = match (self.current, invert(transform)) {
            (Some(current), Some(inverse)) => inverse.transform_point2(current),
            (None, _) => {
                self.move_to(map(p1));
                return;
            }
            (Some(_), None) => return,
        };

        let v1 = p0 - p1;
        let v2 = p2 - p1;
        let cross = v1.perp_dot(v2);
        if p0 == p1 || p1 == p2 || radius == 0. || cross.abs() <= f32::EPSILON {
            self.line_to(map(p1));
            return;
        }

        let v1 = v1.normalize();
        let v2 = v2.normalize();
        let half_angle = v1.dot(v2).clamp(-1., 1.).acos() / 2.;
        let tangent_distance = radius / half_angle.tan();
        let tangent1 = p1 + v1 * tangent_distance;
        let tangent2 = p1 + v2 * tangent_distance;
        let center = p1 + (v1 + v2).normalize() * (radius / half_angle.sin());

        let start = angle_of(tangent1 - center);
        let mut sweep = angle_of(tangent2 - center) - start;
        if sweep > PI {
            sweep -= TAU;
        } else if sweep < -PI {
            sweep += TAU;
        }

        self.line_to(map(tangent1));
        self.push_arc_segments(transform, center, radius, start, sweep);
    }

    /// Builds a `tiny-skia` path. Returns `None` if the path
    /// contains no drawable geometry.
    pub fn to_skia(&self) -> Option<tiny_skia::Path> {
        let mut builder = tiny_skia::PathBuilder::new();
        for segment in self.segments() {
            match segment {
                PathSegment::MoveTo(p) => builder.move_to(p.x, p.y),
                PathSegment::LineTo(p) => builder.line_to(p.x, p.y),
                PathSegment::QuadTo { control, end } => {
                    builder.quad_to(control.x, control.y, end.x, end.y)
                }
                PathSegment::CubicTo {
                    control1,
                    control2,
                    end,
                } => builder.cubic_to(control1.x, control1.y, control2.x, control2.y, end.x, end.y),
                PathSegment::Close => builder.close(),
            }
        }
        builder.finish()
    }

    /// Tests whether a device-space point lies inside the path
    /// under the given fill rule.
    ///
    /// Rasterizes the path into a single pixel centered on the point.
    pub fn contains(&self, point: Vec2, fill_rule: FillRule) -> bool {
        let (path, mut sample) = match (self.to_skia(), Pixmap::new(1, 1)) {
            (Some(path), Some(sample)) => (path, sample),
            _ => return false,
        };
        let mut paint = Paint::default();
        paint.set_color(tiny_skia::Color::BLACK);
        paint.anti_alias = false;
        sample.fill_path(
            &path,
            &paint,
            fill_rule,
            Transform::from_translate(0.5 - point.x, 0.5 - point.y),
            None,
        );
        sample.pixels()[0].alpha() != 0
    }

    fn ensure_subpath(&mut self, point: Vec2) {
        if self.current.is_none() {
            self.move_to(point);
        }
    }

    /// Appends cubic approximations of an arc, at most a quarter turn each.
    fn push_arc_segments(
        &mut self,
        transform: Affine2,
        center: Vec2,
        radius: f32,
        start_angle: f32,
        sweep: f32,
    ) {
        if sweep == 0. || radius == 0. || !sweep.is_finite() {
            return;
        }
        let map = |p: Vec2| transform.transform_point2(p);
        let pieces = (sweep.abs() / FRAC_PI_2).ceil().max(1.) as usize;
        let step = sweep / pieces as f32;
        let handle = radius * 4. / 3. * (step / 4.).tan();

        let mut angle = start_angle;
        for _ in 0..pieces {
            let next = angle + step;
            let from = point_on_circle(center, radius, angle);
            let to = point_on_circle(center, radius, next);
            let control1 = from + tangent(angle) * handle;
            let control2 = to - tangent(next) * handle;
            self.cubic_to(map(control1), map(control2), map(to));
            angle = next;
        }
    }
}

/// Signed angular extent of a canvas arc.
fn arc_sweep(start: f32, end: f32, anticlockwise: bool) -> f32 {
    let delta = end - start;
    if !anticlockwise {
        if delta >= TAU {
            TAU
        } else {
            delta.rem_euclid(TAU)
        }
    } else if -delta >= TAU {
        -TAU
    } else {
        -(-delta).rem_euclid(TAU)
    }
}

fn point_on_circle(center: Vec2, radius: f32, angle: f32) -> Vec2 {
    center + Vec2::new(angle.cos(), angle.sin()) * radius
}

fn tangent(angle: f32) -> Vec2 {
    Vec2::new(-angle.sin(), angle.cos())
}

fn angle_of(v: Vec2) -> f32 {
    v.y.atan2(v.x)
}

pub(crate) fn invert(transform: Affine2) -> Option<Affine2> {
    let det = transform.matrix2.determinant();
    (det != 0. && det.is_finite()).then(|| transform.inverse())
}
