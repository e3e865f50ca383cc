use std::sync::Arc;

use parking_lot::{RwLock, RwLockWriteGuard};
use tiny_skia::Pixmap;

use crate::Color;

/// A 2D raster of pixels to draw to.
///
/// `Surface` is a handle: clones share the same pixels, which is how
/// the host that displays a target and the session that draws to it
/// observe the same raster. Dimensions are fixed at creation.
#[derive(Clone)]
pub struct Surface(Arc<RwLock<Pixmap>>);

impl Surface {
    /// Creates a transparent surface. Returns `None` if either
    /// dimension is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        Pixmap::new(width, height).map(|pixmap| Self(Arc::new(RwLock::new(pixmap))))
    }

    pub fn width(&self) -> u32 {
        self.0.read().width()
    }

    pub fn height(&self) -> u32 {
        self.0.read().height()
    }

    /// Gets the unpremultiplied color of a pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        let pixmap = self.0.read();
        pixmap.pixel(x, y).map(|p| {
            let c = p.demultiply();
            Color::rgba(c.red(), c.green(), c.blue(), c.alpha())
        })
    }

    /// Gets the pixels in row-major ARGB order.
    pub fn to_argb(&self) -> Vec<u32> {
        self.0
            .read()
            .pixels()
            .iter()
            .map(|p| {
                let c = p.demultiply();
                (c.alpha() as u32) << 24
                    | (c.red() as u32) << 16
                    | (c.green() as u32) << 8
                    | c.blue() as u32
            })
            .collect()
    }

    /// Overwrites every pixel with `color`.
    pub fn fill(&self, color: Color) {
        self.0.write().fill(color.to_skia());
    }

    /// Returns a copy of the current pixels.
    pub fn snapshot(&self) -> Pixmap {
        self.0.read().clone()
    }

    /// Replaces this surface's pixels with those of `source`, anchored
    /// at the origin. No blending takes place.
    pub fn copy_from(&self, source: &Surface) {
        if self.ptr_eq(source) {
            return;
        }
        let source = source.0.read();
        let mut target = self.0.write();
        if source.width() == target.width() && source.height() == target.height() {
            target.data_mut().copy_from_slice(source.data());
        } else {
            target.draw_pixmap(
                0,
                0,
                source.as_ref(),
                &tiny_skia::PixmapPaint {
                    blend_mode: tiny_skia::BlendMode::Source,
                    ..Default::default()
                },
                tiny_skia::Transform::identity(),
                None,
            );
        }
    }

    /// Copies a `width` x `height` block of pixels from `(src_x, src_y)`
    /// to `(dst_x, dst_y)` within this surface.
    ///
    /// The source block is read in full before anything is written, so
    /// the regions may overlap. Pixels falling outside the surface on
    /// either end are skipped.
    pub fn copy_region(
        &self,
        (src_x, src_y): (i32, i32),
        (width, height): (u32, u32),
        (dst_x, dst_y): (i32, i32),
    ) {
        let mut pixmap = self.0.write();
        let surface_width = pixmap.width() as i64;
        let surface_height = pixmap.height() as i64;
        let in_bounds = |x: i64, y: i64| x >= 0 && y >= 0 && x < surface_width && y < surface_height;

        let pixels = pixmap.pixels_mut();
        let mut moved = Vec::new();
        for row in 0..height as i64 {
            let (sy, dy) = (src_y as i64 + row, dst_y as i64 + row);
            for col in 0..width as i64 {
                let (sx, dx) = (src_x as i64 + col, dst_x as i64 + col);
                if in_bounds(sx, sy) && in_bounds(dx, dy) {
                    let from = (sy * surface_width + sx) as usize;
                    let to = (dy * surface_width + dx) as usize;
                    moved.push((to, pixels[from]));
                }
            }
        }
        for (to, pixel) in moved {
            pixels[to] = pixel;
        }
    }

    pub fn ptr_eq(&self, other: &Surface) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<Pixmap> {
        self.0.write()
    }
}
