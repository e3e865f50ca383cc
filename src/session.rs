use std::{sync::Arc, time::Duration};

use parking_lot::RwLock;

use crate::{
    buffer::{Buffers, SurfaceUnavailable},
    command::{Command, ImagePlacement, RawCommand},
    image::{FileSource, ImageEvent, ImageHandle, ImageRegistry, ImageSource},
    interpreter::{self, CommandOutput},
    scroll,
    text::{Font, Fonts, MalformedFont, TextMetrics},
    thread_pool::{BasicThreadPool, ThreadPool},
    types::{CompositeOp, LineCap, LineJoin, TextAlign, TextBaseline},
    Color, Display, DrawingContext, Surface,
};

type ImageEventCallback = Box<dyn FnMut(&ImageEvent) + Send>;

/// Builder for a [`Session`].
pub struct SessionBuilder<'a> {
    display: &'a Display,
    target: String,
    settings: Settings,
    thread_pool: Option<Arc<dyn ThreadPool>>,
    on_image_event: Option<ImageEventCallback>,
}

impl<'a> SessionBuilder<'a> {
    /// Sets whether drawing goes to an offscreen buffer that is
    /// published by [`Session::present`].
    ///
    /// The default is `true`.
    pub fn double_buffered(mut self, double_buffered: bool) -> Self {
        self.settings.double_buffered = double_buffered;
        self
    }

    /// Sets how long an image may take to load before it is
    /// reported as failed.
    ///
    /// The default is 30 seconds.
    pub fn image_load_timeout(mut self, timeout: Duration) -> Self {
        self.settings.image_load_timeout = timeout;
        self
    }

    /// Sets the number of threads used to fetch and decode images.
    /// Ignored if [`thread_pool`](Self::thread_pool) is set.
    ///
    /// The default is 1.
    pub fn image_worker_threads(mut self, threads: usize) -> Self {
        self.settings.image_worker_threads = threads;
        self
    }

    /// Sets where image bytes come from.
    ///
    /// The default reads from the filesystem.
    pub fn image_source(mut self, source: impl ImageSource) -> Self {
        self.settings.image_source = Arc::new(source);
        self
    }

    /// Runs image loads on an existing pool instead of spawning threads.
    pub fn thread_pool(mut self, pool: Arc<dyn ThreadPool>) -> Self {
        self.thread_pool = Some(pool);
        self
    }

    /// Sets the font family of the initial drawing state.
    ///
    /// The default is `sans-serif`.
    pub fn default_font_family(mut self, family: impl Into<String>) -> Self {
        self.settings.default_font_family = family.into();
        self
    }

    /// Loads the fonts installed on the system into the session.
    pub fn load_system_fonts(mut self, load: bool) -> Self {
        self.settings.load_system_fonts = load;
        self
    }

    /// Registers a callback invoked for every image event
    /// returned from [`Session::poll_images`].
    pub fn on_image_event(mut self, callback: impl FnMut(&ImageEvent) + Send + 'static) -> Self {
        self.on_image_event = Some(Box::new(callback));
        self
    }

    /// Attaches to the target surface and builds the session.
    pub fn build(self) -> Result<Session, SurfaceUnavailable> {
        let unavailable = || SurfaceUnavailable {
            target: self.target.clone(),
        };
        let visible = self.display.target(&self.target).ok_or_else(unavailable)?;
        let buffers =
            Buffers::new(visible, self.settings.double_buffered).ok_or_else(unavailable)?;

        let mut fonts = Fonts::default();
        if self.settings.load_system_fonts {
            fonts.load_system_fonts();
        }
        let fonts = Arc::new(RwLock::new(fonts));

        let mut context = DrawingContext::new(buffers.active().clone(), Arc::clone(&fonts));
        context.set_font(Font {
            families: vec![self.settings.default_font_family.clone()],
            ..Font::default()
        });

        let pool = self.thread_pool.unwrap_or_else(|| {
            Arc::new(BasicThreadPool::new(self.settings.image_worker_threads))
        });
        let images = ImageRegistry::new(
            self.target.clone(),
            Arc::clone(&self.settings.image_source),
            pool,
            self.settings.image_load_timeout,
        );

        log::debug!("Attached session to target '{}'", self.target);
        Ok(Session {
            target: self.target,
            fonts,
            images,
            attached: Some(Attached { buffers, context }),
            on_image_event: self.on_image_event,
        })
    }
}

struct Settings {
    double_buffered: bool,
    image_load_timeout: Duration,
    image_worker_threads: usize,
    image_source: Arc<dyn ImageSource>,
    default_font_family: String,
    load_system_fonts: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            double_buffered: true,
            image_load_timeout: Duration::from_secs(30),
            image_worker_threads: 1,
            image_source: Arc::new(FileSource),
            default_font_family: "sans-serif".to_owned(),
            load_system_fonts: false,
        }
    }
}

struct Attached {
    buffers: Buffers,
    context: DrawingContext,
}

/// A drawing session bound to one display target.
///
/// All drawing goes to the active surface: the offscreen buffer when
/// double buffered, otherwise the visible target. Once the session is
/// detached every drawing call becomes a no-op and queries return `None`.
pub struct Session {
    target: String,
    fonts: Arc<RwLock<Fonts>>,
    images: ImageRegistry,
    attached: Option<Attached>,
    on_image_event: Option<ImageEventCallback>,
}

macro_rules! forward {
    ($($(#[$attr:meta])* fn $name:ident($($arg:ident: $ty:ty),* $(,)?);)*) => {
        $(
            $(#[$attr])*
            pub fn $name(&mut self, $($arg: $ty),*) {
                self.with_context(|cx| {
                    cx.$name($($arg),*);
                });
            }
        )*
    };
}

impl Session {
    pub fn builder<'a>(display: &'a Display, target: impl Into<String>) -> SessionBuilder<'a> {
        SessionBuilder {
            display,
            target: target.into(),
            settings: Settings::default(),
            thread_pool: None,
            on_image_event: None,
        }
    }

    /// Creates a session with default settings.
    pub fn create(
        display: &Display,
        target: impl Into<String>,
        double_buffered: bool,
    ) -> Result<Self, SurfaceUnavailable> {
        Self::builder(display, target)
            .double_buffered(double_buffered)
            .build()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    pub fn is_double_buffered(&self) -> bool {
        self.attached
            .as_ref()
            .map_or(false, |attached| attached.buffers.is_double_buffered())
    }

    /// The surface drawing currently goes to.
    pub fn active_surface(&self) -> Option<&Surface> {
        self.attached
            .as_ref()
            .map(|attached| attached.buffers.active())
    }

    pub fn images(&self) -> &ImageRegistry {
        &self.images
    }

    /// Runs `f` against the drawing context, if attached.
    pub fn with_context<R>(&mut self, f: impl FnOnce(&mut DrawingContext) -> R) -> Option<R> {
        self.attached
            .as_mut()
            .map(|attached| f(&mut attached.context))
    }

    /// Releases the surfaces. Further drawing is ignored.
    pub fn detach(&mut self) {
        if self.attached.take().is_some() {
            log::debug!("Detached session from target '{}'", self.target);
        }
    }

    /// Publishes the offscreen buffer to the visible target.
    ///
    /// Does nothing when single buffered or detached.
    pub fn present(&mut self) {
        if let Some(attached) = &self.attached {
            attached.buffers.present();
        }
    }

    /// Runs a batch of commands. Returns one result slot per command.
    pub fn execute(&mut self, batch: impl IntoIterator<Item = Command>) -> Vec<Option<CommandOutput>> {
        match &mut self.attached {
            Some(attached) => interpreter::execute(&mut attached.context, &mut self.images, batch),
            None => batch.into_iter().map(|_| None).collect(),
        }
    }

    /// Decodes and runs a batch of wire commands. Returns one result
    /// slot per command.
    pub fn execute_raw<'a>(
        &mut self,
        batch: impl IntoIterator<Item = &'a RawCommand>,
    ) -> Vec<Option<CommandOutput>> {
        match &mut self.attached {
            Some(attached) => {
                interpreter::execute_raw(&mut attached.context, &mut self.images, batch)
            }
            None => batch.into_iter().map(|_| None).collect(),
        }
    }

    /// Applies finished image loads and reports them.
    pub fn poll_images(&mut self) -> Vec<ImageEvent> {
        let events = self.images.poll();
        if let Some(callback) = &mut self.on_image_event {
            events.iter().for_each(|event| callback(event));
        }
        events
    }

    pub fn add_font(&self, font_data: Vec<u8>) -> Result<(), MalformedFont> {
        self.fonts.write().add(font_data)
    }

    /// Starts loading an image under `name`.
    pub fn load_image(&mut self, name: &str, url: &str) -> Option<ImageHandle> {
        self.attached.as_ref()?;
        Some(self.images.load(name, url))
    }

    /// Draws a loaded image. Images that are not loaded are skipped.
    pub fn draw_image(&mut self, name: &str, placement: ImagePlacement) {
        self.execute([Command::DrawImage {
            name: name.to_owned(),
            placement,
        }]);
    }

    /// Shifts a region of the active surface. See [`scroll::scroll`].
    #[allow(clippy::too_many_arguments)]
    pub fn scroll(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        dx: f32,
        dy: f32,
        fill_style: Option<Color>,
    ) {
        self.with_context(|cx| scroll::scroll(cx, x, y, w, h, dx, dy, fill_style));
    }

    pub fn is_point_in_path(&mut self, x: f32, y: f32) -> Option<bool> {
        self.with_context(|cx| cx.is_point_in_path(x, y))
    }

    pub fn measure_text(&mut self, text: &str) -> Option<TextMetrics> {
        self.with_context(|cx| cx.measure_text(text))
    }

    pub fn fill_text(&mut self, text: &str, x: f32, y: f32, max_width: Option<f32>) {
        self.with_context(|cx| {
            cx.fill_text(text, x, y, max_width);
        });
    }

    pub fn stroke_text(&mut self, text: &str, x: f32, y: f32, max_width: Option<f32>) {
        self.with_context(|cx| {
            cx.stroke_text(text, x, y, max_width);
        });
    }

    forward! {
        fn save();
        fn restore();

        fn scale(x: f32, y: f32);
        fn rotate(angle: f32);
        fn translate(x: f32, y: f32);
        fn transform(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32);
        fn set_transform(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32);
        fn reset_transform();

        fn set_global_alpha(alpha: f32);
        fn set_composite_op(op: CompositeOp);
        fn set_fill_style(color: Color);
        fn set_stroke_style(color: Color);
        fn set_line_width(width: f32);
        fn set_line_cap(cap: LineCap);
        fn set_line_join(join: LineJoin);
        fn set_miter_limit(limit: f32);
        fn set_shadow_offset_x(x: f32);
        fn set_shadow_offset_y(y: f32);
        fn set_shadow_blur(blur: f32);
        fn set_shadow_color(color: Color);
        fn set_font(font: Font);
        fn set_text_align(align: TextAlign);
        fn set_text_baseline(baseline: TextBaseline);

        fn clear_rect(x: f32, y: f32, w: f32, h: f32);
        fn fill_rect(x: f32, y: f32, w: f32, h: f32);
        fn stroke_rect(x: f32, y: f32, w: f32, h: f32);

        fn begin_path();
        fn close_path();
        fn move_to(x: f32, y: f32);
        fn line_to(x: f32, y: f32);
        fn quadratic_curve_to(cpx: f32, cpy: f32, x: f32, y: f32);
        fn bezier_curve_to(cp1x: f32, cp1y: f32, cp2x: f32, cp2y: f32, x: f32, y: f32);
        fn arc_to(x1: f32, y1: f32, x2: f32, y2: f32, radius: f32);
        fn rect(x: f32, y: f32, w: f32, h: f32);
        fn arc(x: f32, y: f32, radius: f32, start_angle: f32, end_angle: f32, anticlockwise: bool);
        fn fill();
        fn stroke();
        fn clip();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{image::MemorySource, thread_pool::InlineThreadPool};

    fn display() -> Display {
        let mut display = Display::new();
        display.add_target("main", 8, 8).unwrap();
        display
    }

    #[test]
    fn missing_target_is_unavailable() {
        let display = display();
        let err = Session::create(&display, "nope", true).err().unwrap();
        assert_eq!(err.target, "nope");
    }

    #[test]
    fn double_buffered_drawing_is_hidden_until_present() {
        let display = display();
        let visible = display.target("main").unwrap();
        let mut session = Session::create(&display, "main", true).unwrap();
        assert!(session.is_double_buffered());

        session.set_fill_style(Color::WHITE);
        session.fill_rect(0., 0., 8., 8.);
        assert_eq!(visible.pixel(0, 0), Some(Color::TRANSPARENT));

        session.present();
        assert_eq!(visible.pixel(0, 0), Some(Color::WHITE));
    }

    #[test]
    fn single_buffered_draws_directly() {
        let display = display();
        let visible = display.target("main").unwrap();
        let mut session = Session::create(&display, "main", false).unwrap();
        session.fill_rect(0., 0., 1., 1.);
        assert_eq!(visible.pixel(0, 0), Some(Color::BLACK));
    }

    #[test]
    fn builder_sets_initial_font_family() {
        let display = display();
        let mut session = Session::builder(&display, "main")
            .default_font_family("monospace")
            .build()
            .unwrap();
        let families = session.with_context(|cx| cx.state().font.families.clone());
        assert_eq!(families, Some(vec!["monospace".to_owned()]));
    }

    #[test]
    fn detached_session_is_inert() {
        let display = display();
        let visible = display.target("main").unwrap();
        let mut session = Session::create(&display, "main", false).unwrap();
        session.detach();
        assert!(!session.is_attached());

        session.fill_rect(0., 0., 8., 8.);
        session.present();
        assert_eq!(session.is_point_in_path(1., 1.), None);
        assert_eq!(session.measure_text("x"), None);
        assert_eq!(session.load_image("a", "a.png"), None);
        let results = session.execute(vec![Command::Save, Command::IsPointInPath { x: 0., y: 0. }]);
        assert_eq!(results, vec![None, None]);
        assert!(visible.to_argb().iter().all(|&p| p == 0));
    }

    #[test]
    fn image_events_reach_callback() {
        let mut source = MemorySource::new();
        source.insert("bad.png", vec![0; 4]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_callback = Arc::clone(&seen);

        let display = display();
        let mut session = Session::builder(&display, "main")
            .image_source(source)
            .thread_pool(Arc::new(InlineThreadPool))
            .on_image_event(move |event| {
                seen_by_callback
                    .lock()
                    .unwrap()
                    .push(event.name().to_owned())
            })
            .build()
            .unwrap();

        session.load_image("bad", "bad.png");
        assert!(seen.lock().unwrap().is_empty());

        let events = session.poll_images();
        assert!(matches!(&events[..], [ImageEvent::Failed { session, .. }] if session == "main"));
        assert_eq!(*seen.lock().unwrap(), vec!["bad".to_owned()]);
    }
}
