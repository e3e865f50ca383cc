use crate::Surface;

/// The drawing target could not be acquired.
#[derive(Debug, thiserror::Error)]
#[error("surface for target '{target}' is unavailable")]
pub struct SurfaceUnavailable {
    pub target: String,
}

/// Owns the visible surface and, when double buffering, an
/// offscreen surface of the same size.
///
/// Exactly one of them is active: drawing and scrolling always
/// target [`Buffers::active`].
pub struct Buffers {
    visible: Surface,
    offscreen: Option<Surface>,
}

impl Buffers {
    /// Sets up buffering over `visible`.
    ///
    /// Returns `None` if an offscreen surface was requested
    /// but could not be allocated.
    pub fn new(visible: Surface, double_buffered: bool) -> Option<Self> {
        let offscreen = if double_buffered {
            Some(Surface::new(visible.width(), visible.height())?)
        } else {
            None
        };
        log::debug!(
            "Created {}x{} buffers (double buffered: {})",
            visible.width(),
            visible.height(),
            double_buffered
        );
        Some(Self { visible, offscreen })
    }

    /// The surface all drawing operations target.
    pub fn active(&self) -> &Surface {
        self.offscreen.as_ref().unwrap_or(&self.visible)
    }

    pub fn visible(&self) -> &Surface {
        &self.visible
    }

    pub fn offscreen(&self) -> Option<&Surface> {
        self.offscreen.as_ref()
    }

    pub fn is_double_buffered(&self) -> bool {
        self.offscreen.is_some()
    }

    /// Publishes the offscreen surface by copying it onto the visible one.
    ///
    /// Does nothing when not double buffered.
    pub fn present(&self) {
        if let Some(offscreen) = &self.offscreen {
            self.visible.copy_from(offscreen);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    #[test]
    fn single_buffered_draws_to_visible() {
        let visible = Surface::new(4, 4).unwrap();
        let buffers = Buffers::new(visible.clone(), false).unwrap();
        assert!(buffers.active().ptr_eq(&visible));
        assert!(buffers.offscreen().is_none());
    }

    #[test]
    fn present_is_noop_when_single_buffered() {
        let visible = Surface::new(4, 4).unwrap();
        visible.fill(Color::rgb(1, 2, 3));
        let buffers = Buffers::new(visible.clone(), false).unwrap();
        let before = visible.to_argb();
        for _ in 0..3 {
            buffers.present();
        }
        assert_eq!(visible.to_argb(), before);
    }

    #[test]
    fn present_publishes_offscreen() {
        let visible = Surface::new(4, 4).unwrap();
        let buffers = Buffers::new(visible.clone(), true).unwrap();
        assert!(!buffers.active().ptr_eq(&visible));
        assert_eq!(buffers.active().width(), 4);

        buffers.active().fill(Color::rgba(200, 10, 10, 100));
        assert_eq!(visible.pixel(0, 0), Some(Color::TRANSPARENT));

        buffers.present();
        assert_eq!(visible.to_argb(), buffers.active().to_argb());
    }
}
