use ahash::AHashMap;

use crate::Surface;

/// The host's set of visible drawing targets, addressed by ID.
///
/// Sessions look their target up here when they are created.
/// Whoever owns the `Display` presents the targets to the viewer,
/// e.g. by reading [`Surface::to_argb`] once per frame.
#[derive(Default)]
pub struct Display {
    targets: AHashMap<String, Surface>,
}

impl Display {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a target surface, replacing any target with the same ID.
    ///
    /// Returns `None` if either dimension is zero.
    pub fn add_target(&mut self, id: impl Into<String>, width: u32, height: u32) -> Option<Surface> {
        let id = id.into();
        let surface = Surface::new(width, height)?;
        if self.targets.insert(id.clone(), surface.clone()).is_some() {
            log::warn!("Replacing display target '{}'", id);
        }
        Some(surface)
    }

    pub fn target(&self, id: &str) -> Option<Surface> {
        self.targets.get(id).cloned()
    }

    pub fn remove_target(&mut self, id: &str) -> Option<Surface> {
        self.targets.remove(id)
    }

    pub fn target_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.targets.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_id() {
        let mut display = Display::new();
        let surface = display.add_target("main", 16, 8).unwrap();
        assert!(display.target("main").unwrap().ptr_eq(&surface));
        assert!(display.target("other").is_none());
        assert!(display.add_target("empty", 0, 8).is_none());

        display.remove_target("main");
        assert!(display.target("main").is_none());
    }
}
