//! Named images, loaded asynchronously.
//!
//! Callers refer to images by a logical name. `load` starts fetching
//! and decoding on the loader pool. Results are only applied when the
//! registry is polled, so a completion is never observed by the code
//! that started the load.

use std::{
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use ahash::AHashMap;
use anyhow::Context as _;
use flume::{Receiver, Sender};
use slotmap::SlotMap;
use tiny_skia::{ColorU8, Pixmap};

use crate::thread_pool::ThreadPool;

slotmap::new_key_type! {
    /// Stable identity of a named image within one registry.
    pub struct ImageHandle;
}

/// Fetches the raw bytes of an image.
pub trait ImageSource: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>>;
}

/// Reads images from the local filesystem. Accepts `file://` URLs
/// and plain paths.
#[derive(Debug, Default)]
pub struct FileSource;

impl ImageSource for FileSource {
    fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        std::fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))
    }
}

/// Serves images from memory, keyed by URL.
#[derive(Debug, Default)]
pub struct MemorySource {
    images: AHashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: Vec<u8>) -> &mut Self {
        self.images.insert(url.into(), bytes);
        self
    }
}

impl ImageSource for MemorySource {
    fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        self.images
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no image at '{}'", url))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to fetch image: {0:#}")]
    Fetch(anyhow::Error),
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("image load timed out")]
    TimedOut,
}

#[derive(Debug, Clone)]
pub enum LoadState {
    Pending,
    Loaded(Pixmap),
    Failed(Arc<LoadError>),
}

/// Reported by [`ImageRegistry::poll`] when a load settles.
#[derive(Debug, Clone)]
pub enum ImageEvent {
    Loaded {
        session: String,
        name: String,
    },
    Failed {
        session: String,
        name: String,
        error: Arc<LoadError>,
    },
}

impl ImageEvent {
    pub fn name(&self) -> &str {
        match self {
            ImageEvent::Loaded { name, .. } | ImageEvent::Failed { name, .. } => name,
        }
    }
}

struct Entry {
    name: String,
    url: String,
    generation: u64,
    started: Instant,
    state: LoadState,
}

struct Completion {
    handle: ImageHandle,
    generation: u64,
    result: Result<Pixmap, LoadError>,
}

/// The images known to one session.
///
/// Entries are created by the first load of a name and never evicted.
/// Loading a name again restarts it; only the most recent load of a
/// name can complete.
pub struct ImageRegistry {
    session: String,
    entries: SlotMap<ImageHandle, Entry>,
    by_name: AHashMap<String, ImageHandle>,
    next_generation: u64,

    source: Arc<dyn ImageSource>,
    pool: Arc<dyn ThreadPool>,
    timeout: Duration,

    completions_tx: Sender<Completion>,
    completions: Receiver<Completion>,
}

impl ImageRegistry {
    pub fn new(
        session: impl Into<String>,
        source: Arc<dyn ImageSource>,
        pool: Arc<dyn ThreadPool>,
        timeout: Duration,
    ) -> Self {
        let (completions_tx, completions) = flume::unbounded();
        Self {
            session: session.into(),
            entries: SlotMap::default(),
            by_name: AHashMap::new(),
            next_generation: 0,
            source,
            pool,
            timeout,
            completions_tx,
            completions,
        }
    }

    /// Starts loading `url` under `name`.
    pub fn load(&mut self, name: &str, url: &str) -> ImageHandle {
        self.next_generation += 1;
        let generation = self.next_generation;
        let started = Instant::now();

        let handle = match self.by_name.get(name) {
            Some(&handle) => {
                let entry = &mut self.entries[handle];
                log::debug!(
                    "Reloading image '{}' from '{}' (was '{}')",
                    name,
                    url,
                    entry.url
                );
                entry.url = url.to_owned();
                entry.generation = generation;
                entry.started = started;
                entry.state = LoadState::Pending;
                handle
            }
            None => {
                let handle = self.entries.insert(Entry {
                    name: name.to_owned(),
                    url: url.to_owned(),
                    generation,
                    started,
                    state: LoadState::Pending,
                });
                self.by_name.insert(name.to_owned(), handle);
                handle
            }
        };

        let source = Arc::clone(&self.source);
        let completions = self.completions_tx.clone();
        let url = url.to_owned();
        self.pool.spawn(Box::new(move || {
            let result = source
                .fetch(&url)
                .map_err(LoadError::Fetch)
                .and_then(|bytes| decode(&bytes));
            // The registry may be gone by now.
            let _ = completions.send(Completion {
                handle,
                generation,
                result,
            });
        }));

        handle
    }

    /// Applies finished loads and expires overdue ones.
    pub fn poll(&mut self) -> Vec<ImageEvent> {
        self.poll_at(Instant::now())
    }

    pub(crate) fn poll_at(&mut self, now: Instant) -> Vec<ImageEvent> {
        let mut events = Vec::new();

        for completion in self.completions.try_iter() {
            let entry = match self.entries.get_mut(completion.handle) {
                Some(entry) => entry,
                None => continue,
            };
            if entry.generation != completion.generation
                || !matches!(entry.state, LoadState::Pending)
            {
                log::trace!("Discarding stale load of image '{}'", entry.name);
                continue;
            }
            let state = match completion.result {
                Ok(pixmap) => LoadState::Loaded(pixmap),
                Err(e) => LoadState::Failed(Arc::new(e)),
            };
            events.push(settle(&self.session, entry, state));
        }

        for entry in self.entries.values_mut() {
            if matches!(entry.state, LoadState::Pending)
                && now.saturating_duration_since(entry.started) >= self.timeout
            {
                let state = LoadState::Failed(Arc::new(LoadError::TimedOut));
                events.push(settle(&self.session, entry, state));
            }
        }

        events
    }

    pub fn handle(&self, name: &str) -> Option<ImageHandle> {
        self.by_name.get(name).copied()
    }

    pub fn state(&self, name: &str) -> Option<&LoadState> {
        self.handle(name).map(|handle| &self.entries[handle].state)
    }

    /// Gets the pixels of a loaded image.
    pub fn get(&self, name: &str) -> Option<&Pixmap> {
        match self.state(name)? {
            LoadState::Loaded(pixmap) => Some(pixmap),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn settle(session: &str, entry: &mut Entry, state: LoadState) -> ImageEvent {
    let event = match &state {
        LoadState::Failed(error) => {
            log::warn!("Failed to load image '{}' from '{}': {}", entry.name, entry.url, error);
            ImageEvent::Failed {
                session: session.to_owned(),
                name: entry.name.clone(),
                error: Arc::clone(error),
            }
        }
        _ => ImageEvent::Loaded {
            session: session.to_owned(),
            name: entry.name.clone(),
        },
    };
    entry.state = state;
    event
}

/// Decodes encoded image bytes into premultiplied pixels.
fn decode(bytes: &[u8]) -> Result<Pixmap, LoadError> {
    let image = ::image::load_from_memory(bytes)
        .map_err(|e| LoadError::Decode(e.to_string()))?
        .to_rgba8();
    let mut pixmap = Pixmap::new(image.width(), image.height())
        .ok_or_else(|| LoadError::Decode("image has no pixels".to_owned()))?;
    for (target, source) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = source.0;
        *target = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(pixmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread_pool::{InlineThreadPool, Task};

    /// Accepts tasks and never runs them.
    struct StalledPool;

    impl ThreadPool for StalledPool {
        fn spawn(&self, _task: Task) {}
    }

    fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let image = ::image::RgbaImage::from_pixel(width, height, ::image::Rgba(rgba));
        let mut bytes = Vec::new();
        ::image::DynamicImage::ImageRgba8(image)
            .write_to(&mut bytes, ::image::ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    fn registry(source: MemorySource, pool: impl ThreadPool) -> ImageRegistry {
        ImageRegistry::new(
            "canvas",
            Arc::new(source),
            Arc::new(pool),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn load_completes_on_poll() {
        let mut source = MemorySource::new();
        source.insert("red.png", png(3, 2, [255, 0, 0, 255]));
        let mut images = registry(source, InlineThreadPool);

        images.load("red", "red.png");
        assert!(matches!(images.state("red"), Some(LoadState::Pending)));
        assert!(images.get("red").is_none());

        let events = images.poll();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ImageEvent::Loaded { session, name } if session == "canvas" && name == "red"));
        let pixmap = images.get("red").unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (3, 2));
        assert_eq!(pixmap.pixel(0, 0).unwrap().red(), 255);

        assert!(images.poll().is_empty());
    }

    #[test]
    fn latest_url_wins() {
        let mut source = MemorySource::new();
        source
            .insert("small.png", png(1, 1, [0, 0, 0, 255]))
            .insert("large.png", png(4, 4, [0, 0, 0, 255]));
        let mut images = registry(source, InlineThreadPool);

        let first = images.load("logo", "small.png");
        let second = images.load("logo", "large.png");
        assert_eq!(first, second);
        assert_eq!(images.len(), 1);

        let events = images.poll();
        assert_eq!(events.len(), 1);
        assert_eq!(images.get("logo").unwrap().width(), 4);
    }

    #[test]
    fn fetch_and_decode_failures() {
        let mut source = MemorySource::new();
        source.insert("garbage.png", vec![1, 2, 3]);
        let mut images = registry(source, InlineThreadPool);

        images.load("missing", "nowhere.png");
        images.load("garbage", "garbage.png");
        let events = images.poll();
        assert_eq!(events.len(), 2);
        for event in &events {
            assert!(matches!(event, ImageEvent::Failed { .. }));
        }
        assert!(matches!(
            images.state("missing"),
            Some(LoadState::Failed(e)) if matches!(**e, LoadError::Fetch(_))
        ));
        assert!(matches!(
            images.state("garbage"),
            Some(LoadState::Failed(e)) if matches!(**e, LoadError::Decode(_))
        ));
    }

    #[test]
    fn pending_loads_time_out() {
        let mut images = registry(MemorySource::new(), StalledPool);
        images.load("slow", "slow.png");

        assert!(images.poll_at(Instant::now()).is_empty());

        let events = images.poll_at(Instant::now() + Duration::from_secs(31));
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ImageEvent::Failed { error, .. } if matches!(**error, LoadError::TimedOut)
        ));
        assert!(images.poll_at(Instant::now() + Duration::from_secs(62)).is_empty());
    }

    #[test]
    fn file_source_reads_paths() {
        let path = std::env::temp_dir().join(format!("easel-test-{}.png", std::process::id()));
        std::fs::write(&path, png(2, 2, [0, 255, 0, 255])).unwrap();
        let url = format!("file://{}", path.display());

        let bytes = FileSource.fetch(&url).unwrap();
        assert_eq!(bytes, std::fs::read(&path).unwrap());
        assert!(FileSource.fetch("file:///definitely/not/here.png").is_err());
        std::fs::remove_file(path).unwrap();
    }
}
