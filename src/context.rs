use std::sync::Arc;

use glam::{vec2, Affine2, Vec2};
use parking_lot::RwLock;
use tiny_skia::{
    BlendMode, ClipMask, FillRule, FilterQuality, Paint, Pattern, Pixmap, SpreadMode, Stroke,
    Transform,
};

use crate::{
    path::{invert, Path},
    text::{Font, Fonts, TextMetrics, TextPlacement},
    types::{CompositeOp, LineCap, LineJoin, TextAlign, TextBaseline},
    Color, Surface,
};

/// The style and transform state of a [`DrawingContext`].
///
/// Saved and restored as a whole by `save()` / `restore()`.
/// The current path is not part of the state.
#[derive(Debug, Clone)]
pub struct DrawingState {
    pub transform: Affine2,
    pub fill_style: Color,
    pub stroke_style: Color,
    pub line_width: f32,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f32,
    pub shadow_offset: Vec2,
    pub shadow_blur: f32,
    pub shadow_color: Color,
    pub font: Font,
    pub text_align: TextAlign,
    pub text_baseline: TextBaseline,
    pub global_alpha: f32,
    pub composite: CompositeOp,
    clip: Option<Arc<ClipMask>>,
}

impl Default for DrawingState {
    fn default() -> Self {
        Self {
            transform: Affine2::IDENTITY,
            fill_style: Color::BLACK,
            stroke_style: Color::BLACK,
            line_width: 1.,
            line_cap: LineCap::default(),
            line_join: LineJoin::default(),
            miter_limit: 10.,
            shadow_offset: Vec2::ZERO,
            shadow_blur: 0.,
            shadow_color: Color::TRANSPARENT,
            font: Font::default(),
            text_align: TextAlign::default(),
            text_baseline: TextBaseline::default(),
            global_alpha: 1.,
            composite: CompositeOp::default(),
            clip: None,
        }
    }
}

impl PartialEq for DrawingState {
    fn eq(&self, other: &Self) -> bool {
        let same_clip = match (&self.clip, &other.clip) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        same_clip
            && self.transform == other.transform
            && self.fill_style == other.fill_style
            && self.stroke_style == other.stroke_style
            && self.line_width == other.line_width
            && self.line_cap == other.line_cap
            && self.line_join == other.line_join
            && self.miter_limit == other.miter_limit
            && self.shadow_offset == other.shadow_offset
            && self.shadow_blur == other.shadow_blur
            && self.shadow_color == other.shadow_color
            && self.font == other.font
            && self.text_align == other.text_align
            && self.text_baseline == other.text_baseline
            && self.global_alpha == other.global_alpha
            && self.composite == other.composite
    }
}

impl DrawingState {
    pub fn has_clip(&self) -> bool {
        self.clip.is_some()
    }
}

/// Immediate-mode 2D drawing against one surface. Modeled after
/// the HTML5 canvas API.
///
/// Every operation takes effect on the surface right away. Invalid
/// arguments (non-finite numbers, negative widths) are ignored
/// rather than reported, as a canvas would.
pub struct DrawingContext {
    surface: Surface,
    fonts: Arc<RwLock<Fonts>>,

    state: DrawingState,
    state_stack: Vec<DrawingState>,
    path: Path,
}

/// State
impl DrawingContext {
    pub fn new(surface: Surface, fonts: Arc<RwLock<Fonts>>) -> Self {
        Self {
            surface,
            fonts,
            state: DrawingState::default(),
            state_stack: Vec::new(),
            path: Path::new(),
        }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn state(&self) -> &DrawingState {
        &self.state
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pushes the current state onto the state stack.
    pub fn save(&mut self) -> &mut Self {
        self.state_stack.push(self.state.clone());
        self
    }

    /// Pops the most recently saved state.
    ///
    /// Does nothing if the stack is empty.
    pub fn restore(&mut self) -> &mut Self {
        if let Some(state) = self.state_stack.pop() {
            self.state = state;
        }
        self
    }

    pub fn set_global_alpha(&mut self, alpha: f32) -> &mut Self {
        if (0. ..=1.).contains(&alpha) {
            self.state.global_alpha = alpha;
        }
        self
    }

    pub fn set_composite_op(&mut self, op: CompositeOp) -> &mut Self {
        self.state.composite = op;
        self
    }

    pub fn set_fill_style(&mut self, color: Color) -> &mut Self {
        self.state.fill_style = color;
        self
    }

    pub fn set_stroke_style(&mut self, color: Color) -> &mut Self {
        self.state.stroke_style = color;
        self
    }

    pub fn set_line_width(&mut self, width: f32) -> &mut Self {
        if width.is_finite() && width > 0. {
            self.state.line_width = width;
        }
        self
    }

    pub fn set_line_cap(&mut self, cap: LineCap) -> &mut Self {
        self.state.line_cap = cap;
        self
    }

    pub fn set_line_join(&mut self, join: LineJoin) -> &mut Self {
        self.state.line_join = join;
        self
    }

    pub fn set_miter_limit(&mut self, limit: f32) -> &mut Self {
        if limit.is_finite() && limit > 0. {
            self.state.miter_limit = limit;
        }
        self
    }

    pub fn set_shadow_offset_x(&mut self, x: f32) -> &mut Self {
        if x.is_finite() {
            self.state.shadow_offset.x = x;
        }
        self
    }

    pub fn set_shadow_offset_y(&mut self, y: f32) -> &mut Self {
        if y.is_finite() {
            self.state.shadow_offset.y = y;
        }
        self
    }

    /// Blur is recorded but shadows are drawn unblurred.
    pub fn set_shadow_blur(&mut self, blur: f32) -> &mut Self {
        if blur.is_finite() && blur >= 0. {
            self.state.shadow_blur = blur;
        }
        self
    }

    pub fn set_shadow_color(&mut self, color: Color) -> &mut Self {
        self.state.shadow_color = color;
        self
    }

    pub fn set_font(&mut self, font: Font) -> &mut Self {
        self.state.font = font;
        self
    }

    pub fn set_text_align(&mut self, align: TextAlign) -> &mut Self {
        self.state.text_align = align;
        self
    }

    pub fn set_text_baseline(&mut self, baseline: TextBaseline) -> &mut Self {
        self.state.text_baseline = baseline;
        self
    }
}

/// Transformations
impl DrawingContext {
    pub fn scale(&mut self, x: f32, y: f32) -> &mut Self {
        self.post_multiply(Affine2::from_scale(vec2(x, y)))
    }

    /// Rotates clockwise by `angle` radians.
    pub fn rotate(&mut self, angle: f32) -> &mut Self {
        self.post_multiply(Affine2::from_angle(angle))
    }

    pub fn translate(&mut self, x: f32, y: f32) -> &mut Self {
        self.post_multiply(Affine2::from_translation(vec2(x, y)))
    }

    /// Multiplies the current transform by the matrix
    /// `[a c e; b d f; 0 0 1]`.
    pub fn transform(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> &mut Self {
        self.post_multiply(Affine2::from_cols_array(&[a, b, c, d, e, f]))
    }

    pub fn set_transform(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> &mut Self {
        let matrix = Affine2::from_cols_array(&[a, b, c, d, e, f]);
        if matrix.is_finite() {
            self.state.transform = matrix;
        }
        self
    }

    pub fn reset_transform(&mut self) -> &mut Self {
        self.state.transform = Affine2::IDENTITY;
        self
    }

    fn post_multiply(&mut self, matrix: Affine2) -> &mut Self {
        if matrix.is_finite() {
            self.state.transform = self.state.transform * matrix;
        }
        self
    }
}

/// Paths
impl DrawingContext {
    pub fn begin_path(&mut self) -> &mut Self {
        self.path.clear();
        self
    }

    pub fn close_path(&mut self) -> &mut Self {
        self.path.close();
        self
    }

    pub fn move_to(&mut self, x: f32, y: f32) -> &mut Self {
        let p = self.map(vec2(x, y));
        self.path.move_to(p);
        self
    }

    pub fn line_to(&mut self, x: f32, y: f32) -> &mut Self {
        let p = self.map(vec2(x, y));
        self.path.line_to(p);
        self
    }

    pub fn quadratic_curve_to(&mut self, cpx: f32, cpy: f32, x: f32, y: f32) -> &mut Self {
        let (control, end) = (self.map(vec2(cpx, cpy)), self.map(vec2(x, y)));
        self.path.quad_to(control, end);
        self
    }

    pub fn bezier_curve_to(
        &mut self,
        cp1x: f32,
        cp1y: f32,
        cp2x: f32,
        cp2y: f32,
        x: f32,
        y: f32,
    ) -> &mut Self {
        let control1 = self.map(vec2(cp1x, cp1y));
        let control2 = self.map(vec2(cp2x, cp2y));
        let end = self.map(vec2(x, y));
        self.path.cubic_to(control1, control2, end);
        self
    }

    pub fn arc_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, radius: f32) -> &mut Self {
        self.path
            .arc_to(self.state.transform, vec2(x1, y1), vec2(x2, y2), radius);
        self
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) -> &mut Self {
        self.path.rect(self.state.transform, vec2(x, y), vec2(w, h));
        self
    }

    pub fn arc(
        &mut self,
        x: f32,
        y: f32,
        radius: f32,
        start_angle: f32,
        end_angle: f32,
        anticlockwise: bool,
    ) -> &mut Self {
        self.path.arc(
            self.state.transform,
            vec2(x, y),
            radius,
            start_angle,
            end_angle,
            anticlockwise,
        );
        self
    }

    /// Fills the current path with the fill style.
    pub fn fill(&mut self) -> &mut Self {
        if let Some(path) = self.path.to_skia() {
            self.fill_device_path(&path);
        }
        self
    }

    /// Strokes the current path with the stroke style.
    pub fn stroke(&mut self) -> &mut Self {
        if let Some(path) = self.path.to_skia() {
            self.stroke_device_path(path);
        }
        self
    }

    /// Intersects the clip region with the current path.
    pub fn clip(&mut self) -> &mut Self {
        let path = match self.path.to_skia() {
            Some(path) => path,
            None => return self,
        };
        let mask = match &self.state.clip {
            Some(existing) => {
                let mut mask = ClipMask::clone(existing);
                mask.intersect_path(&path, FillRule::Winding, true);
                Some(mask)
            }
            None => {
                let mut mask = ClipMask::new();
                let (width, height) = (self.surface.width(), self.surface.height());
                mask.set_path(width, height, &path, FillRule::Winding, true)
                    .map(|()| mask)
            }
        };
        if let Some(mask) = mask {
            self.state.clip = Some(Arc::new(mask));
        }
        self
    }

    /// Tests a point in device coordinates against the current path
    /// using the nonzero winding rule.
    pub fn is_point_in_path(&self, x: f32, y: f32) -> bool {
        self.path.contains(vec2(x, y), FillRule::Winding)
    }
}

/// Rectangles
impl DrawingContext {
    /// Clears a rectangle to transparent black. Ignores alpha,
    /// composite operation and shadows, but honors the clip.
    pub fn clear_rect(&mut self, x: f32, y: f32, w: f32, h: f32) -> &mut Self {
        if let Some(path) = self.rect_path(x, y, w, h) {
            let mut paint = Paint::default();
            paint.blend_mode = BlendMode::Clear;
            let clip = self.state.clip.clone();
            self.surface.write().fill_path(
                &path,
                &paint,
                FillRule::Winding,
                Transform::identity(),
                clip.as_deref(),
            );
        }
        self
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32) -> &mut Self {
        if let Some(path) = self.rect_path(x, y, w, h) {
            self.fill_device_path(&path);
        }
        self
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32) -> &mut Self {
        if let Some(path) = self.rect_path(x, y, w, h) {
            self.stroke_device_path(path);
        }
        self
    }

    /// Builds a rectangle without touching the current path.
    fn rect_path(&self, x: f32, y: f32, w: f32, h: f32) -> Option<tiny_skia::Path> {
        if ![x, y, w, h].iter().all(|v| v.is_finite()) {
            return None;
        }
        let mut path = Path::new();
        path.rect(self.state.transform, vec2(x, y), vec2(w, h));
        path.to_skia()
    }
}

/// Text
impl DrawingContext {
    pub fn fill_text(&mut self, text: &str, x: f32, y: f32, max_width: Option<f32>) -> &mut Self {
        if let Some(path) = self.text_path(text, x, y, max_width) {
            self.fill_device_path(&path);
        }
        self
    }

    pub fn stroke_text(&mut self, text: &str, x: f32, y: f32, max_width: Option<f32>) -> &mut Self {
        if let Some(path) = self.text_path(text, x, y, max_width) {
            self.stroke_device_path(path);
        }
        self
    }

    /// Measures `text` in the current font, ignoring the transform.
    pub fn measure_text(&self, text: &str) -> TextMetrics {
        self.fonts.read().measure(&self.state.font, text)
    }

    fn text_path(
        &self,
        text: &str,
        x: f32,
        y: f32,
        max_width: Option<f32>,
    ) -> Option<tiny_skia::Path> {
        if max_width.map_or(false, |w| !(w > 0.)) {
            return None;
        }
        let mut path = Path::new();
        let placement = TextPlacement {
            origin: vec2(x, y),
            align: self.state.text_align,
            baseline: self.state.text_baseline,
            max_width,
            transform: self.state.transform,
        };
        if !self
            .fonts
            .read()
            .outline(&self.state.font, text, placement, &mut path)
        {
            log::debug!("No font available to draw '{}'", text);
            return None;
        }
        path.to_skia()
    }
}

/// Images
impl DrawingContext {
    /// Draws `image` at its natural size with its top-left corner at `(dx, dy)`.
    pub fn draw_image(&mut self, image: &Pixmap, dx: f32, dy: f32) -> &mut Self {
        let (w, h) = (image.width() as f32, image.height() as f32);
        self.draw_image_region(image, (0., 0., w, h), (dx, dy, w, h))
    }

    /// Draws `image` scaled into the rectangle `(dx, dy, dw, dh)`.
    pub fn draw_image_scaled(
        &mut self,
        image: &Pixmap,
        dx: f32,
        dy: f32,
        dw: f32,
        dh: f32,
    ) -> &mut Self {
        let (w, h) = (image.width() as f32, image.height() as f32);
        self.draw_image_region(image, (0., 0., w, h), (dx, dy, dw, dh))
    }

    /// Draws the `source` region of `image` into the `dest` region,
    /// both given as `(x, y, width, height)`.
    pub fn draw_image_region(
        &mut self,
        image: &Pixmap,
        (sx, sy, sw, sh): (f32, f32, f32, f32),
        (dx, dy, dw, dh): (f32, f32, f32, f32),
    ) -> &mut Self {
        if sw == 0. || sh == 0. || ![sx, sy, sw, sh, dx, dy, dw, dh].iter().all(|v| v.is_finite())
        {
            return self;
        }
        let path = match self.rect_path(dx, dy, dw, dh) {
            Some(path) => path,
            None => return self,
        };

        // image space -> user space -> device space
        let local = Affine2::from_translation(vec2(dx, dy))
            * Affine2::from_scale(vec2(dw / sw, dh / sh))
            * Affine2::from_translation(vec2(-sx, -sy));
        let image_to_device = self.state.transform * local;
        let quality = if is_integer_translation(image_to_device) {
            FilterQuality::Nearest
        } else {
            FilterQuality::Bilinear
        };

        let paint = Paint {
            shader: Pattern::new(
                image.as_ref(),
                SpreadMode::Pad,
                quality,
                self.state.global_alpha,
                convert_transform(image_to_device),
            ),
            blend_mode: self.state.composite.blend_mode(),
            anti_alias: true,
            ..Default::default()
        };
        let clip = self.state.clip.clone();
        self.surface.write().fill_path(
            &path,
            &paint,
            FillRule::Winding,
            Transform::identity(),
            clip.as_deref(),
        );
        self
    }
}

/// Rendering helpers
impl DrawingContext {
    fn map(&self, point: Vec2) -> Vec2 {
        self.state.transform.transform_point2(point)
    }

    fn paint(&self, color: Color) -> Paint<'static> {
        let mut color = color.to_skia();
        color.apply_opacity(self.state.global_alpha);
        let mut paint = Paint::default();
        paint.set_color(color);
        paint.blend_mode = self.state.composite.blend_mode();
        paint.anti_alias = true;
        paint
    }

    /// The paint and offset for a shadow, if one would be visible.
    fn shadow(&self) -> Option<(Paint<'static>, Transform)> {
        let offset = self.state.shadow_offset;
        let visible = self.state.shadow_color.alpha() > 0
            && (offset != Vec2::ZERO || self.state.shadow_blur > 0.);
        visible.then(|| {
            (
                self.paint(self.state.shadow_color),
                Transform::from_translate(offset.x, offset.y),
            )
        })
    }

    fn fill_device_path(&mut self, path: &tiny_skia::Path) {
        let paint = self.paint(self.state.fill_style);
        let shadow = self.shadow();
        let clip = self.state.clip.clone();
        let mut pixmap = self.surface.write();
        if let Some((shadow_paint, offset)) = shadow {
            pixmap.fill_path(path, &shadow_paint, FillRule::Winding, offset, clip.as_deref());
        }
        pixmap.fill_path(
            path,
            &paint,
            FillRule::Winding,
            Transform::identity(),
            clip.as_deref(),
        );
    }

    fn stroke_device_path(&mut self, path: tiny_skia::Path) {
        // Stroke geometry lives in user space so the line width
        // scales with the transform.
        let transform = self.state.transform;
        let user_path = match invert(transform).and_then(|inv| path.transform(convert_transform(inv))) {
            Some(path) => path,
            None => return,
        };
        let stroke = Stroke {
            width: self.state.line_width,
            miter_limit: self.state.miter_limit,
            line_cap: self.state.line_cap.into(),
            line_join: self.state.line_join.into(),
            dash: None,
        };
        let paint = self.paint(self.state.stroke_style);
        let shadow = self.shadow();
        let clip = self.state.clip.clone();
        let device = convert_transform(transform);
        let mut pixmap = self.surface.write();
        if let Some((shadow_paint, offset)) = shadow {
            pixmap.stroke_path(
                &user_path,
                &shadow_paint,
                &stroke,
                offset.pre_concat(device),
                clip.as_deref(),
            );
        }
        pixmap.stroke_path(&user_path, &paint, &stroke, device, clip.as_deref());
    }
}

pub(crate) fn convert_transform(transform: Affine2) -> Transform {
    let cols = transform.to_cols_array();
    Transform::from_row(cols[0], cols[1], cols[2], cols[3], cols[4], cols[5])
}

fn is_integer_translation(transform: Affine2) -> bool {
    transform.matrix2 == glam::Mat2::IDENTITY && transform.translation == transform.translation.round()
}
