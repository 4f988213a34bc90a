//! Per-path debouncing of modification events
//!
//! Editors and copy tools emit several modify notifications for one logical
//! write. The first event for a path is accepted and opens a window; further
//! events for that path inside the window are dropped.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// How long after an accepted event further events for the same path are ignored
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(5);

/// Extensions treated as images (compared case-insensitively)
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

/// A raw modification notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModificationEvent {
    /// Path that changed
    pub path: PathBuf,
    /// Whether the path is a directory
    pub is_directory: bool,
    /// When the notification was received
    pub observed_at: Instant,
}

impl ModificationEvent {
    pub fn new(path: impl Into<PathBuf>, is_directory: bool, observed_at: Instant) -> Self {
        Self {
            path: path.into(),
            is_directory,
            observed_at,
        }
    }

    /// File event observed now
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(path, false, Instant::now())
    }

    /// Folder whose log receives the result
    pub fn folder(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// Whether `path` has one of the recognised image extensions
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// Decides which events are new, settled image updates
///
/// The table of last-accepted instants is shared between tasks. The
/// check-and-set for a path runs under that path's map entry lock, so two
/// simultaneous events for one path cannot both be accepted.
pub struct ChangeDebouncer {
    /// Path -> instant of the last accepted event
    recent: DashMap<PathBuf, Instant>,
    window: Duration,
}

impl ChangeDebouncer {
    pub fn new() -> Self {
        Self::with_window(DEBOUNCE_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            recent: DashMap::new(),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Accept or reject an event, recording accepted ones
    pub fn accept(&self, event: &ModificationEvent) -> bool {
        if event.is_directory || !is_image_path(&event.path) {
            return false;
        }

        let now = event.observed_at;
        match self.recent.entry(event.path.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
            Entry::Occupied(mut slot) => {
                // Out-of-order instants saturate to zero and are rejected
                if now.saturating_duration_since(*slot.get()) > self.window {
                    slot.insert(now);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Drop entries whose window closed before `horizon`
    ///
    /// A removed entry behaves exactly like a stale one for any event observed
    /// at or after `horizon`. Returns the number of entries removed.
    pub fn prune(&self, horizon: Instant) -> usize {
        let before = self.recent.len();
        self.recent
            .retain(|_, accepted_at| horizon.saturating_duration_since(*accepted_at) <= self.window);
        before.saturating_sub(self.recent.len())
    }

    /// Number of tracked paths
    pub fn tracked(&self) -> usize {
        self.recent.len()
    }
}

impl Default for ChangeDebouncer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn at(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    fn event(path: &str, when: Instant) -> ModificationEvent {
        ModificationEvent::new(path, false, when)
    }

    #[test]
    fn test_first_event_is_accepted() {
        let debouncer = ChangeDebouncer::new();
        assert!(debouncer.accept(&event("data/a.png", Instant::now())));
        assert_eq!(debouncer.tracked(), 1);
    }

    #[test]
    fn test_events_inside_window_are_rejected() {
        let debouncer = ChangeDebouncer::new();
        let t0 = Instant::now();

        assert!(debouncer.accept(&event("data/a.png", t0)));
        assert!(!debouncer.accept(&event("data/a.png", at(t0, 1))));
        assert!(!debouncer.accept(&event("data/a.png", at(t0, 1_000))));
        // Exactly at the threshold is still inside the window
        assert!(!debouncer.accept(&event("data/a.png", at(t0, 5_000))));
    }

    #[test]
    fn test_events_after_window_are_accepted() {
        let debouncer = ChangeDebouncer::new();
        let t0 = Instant::now();

        assert!(debouncer.accept(&event("data/a.png", t0)));
        assert!(debouncer.accept(&event("data/a.png", at(t0, 5_001))));
        assert!(!debouncer.accept(&event("data/a.png", at(t0, 6_000))));
        assert!(debouncer.accept(&event("data/a.png", at(t0, 10_002))));
    }

    #[test]
    fn test_rejections_do_not_extend_window() {
        let debouncer = ChangeDebouncer::new();
        let t0 = Instant::now();

        assert!(debouncer.accept(&event("data/a.png", t0)));
        for millis in (500..5_000).step_by(500) {
            assert!(!debouncer.accept(&event("data/a.png", at(t0, millis))));
        }
        assert!(debouncer.accept(&event("data/a.png", at(t0, 5_100))));
    }

    #[test]
    fn test_paths_are_independent() {
        let debouncer = ChangeDebouncer::new();
        let t0 = Instant::now();

        assert!(debouncer.accept(&event("data/a.png", t0)));
        assert!(debouncer.accept(&event("data/b.png", at(t0, 10))));
        assert!(debouncer.accept(&event("data/sub/a.png", at(t0, 20))));
    }

    #[test]
    fn test_non_images_never_accepted() {
        let debouncer = ChangeDebouncer::new();
        let t0 = Instant::now();

        for (i, path) in ["notes.txt", "report.pdf", "log.txt", "png", "archive.png.zip", "noext"]
            .iter()
            .enumerate()
        {
            assert!(!debouncer.accept(&event(path, at(t0, i as u64 * 10_000))), "{}", path);
        }
        assert_eq!(debouncer.tracked(), 0);
    }

    #[test]
    fn test_extensions_are_case_insensitive() {
        let debouncer = ChangeDebouncer::new();
        let t0 = Instant::now();

        for path in ["a.PNG", "b.Jpg", "c.JPEG", "d.bmp", "e.GIF"] {
            assert!(debouncer.accept(&event(path, t0)), "{}", path);
        }
    }

    #[test]
    fn test_directories_never_accepted() {
        let debouncer = ChangeDebouncer::new();
        let dir = ModificationEvent::new("data/holiday.png", true, Instant::now());

        assert!(!debouncer.accept(&dir));
        assert_eq!(debouncer.tracked(), 0);
    }

    #[test]
    fn test_out_of_order_event_is_rejected() {
        let debouncer = ChangeDebouncer::new();
        let t0 = Instant::now();

        assert!(debouncer.accept(&event("data/a.png", at(t0, 10_000))));
        assert!(!debouncer.accept(&event("data/a.png", t0)));
    }

    #[test]
    fn test_prune_only_removes_closed_windows() {
        let debouncer = ChangeDebouncer::new();
        let t0 = Instant::now();

        debouncer.accept(&event("old.png", t0));
        debouncer.accept(&event("fresh.png", at(t0, 4_000)));

        assert_eq!(debouncer.prune(at(t0, 6_000)), 1);
        assert_eq!(debouncer.tracked(), 1);

        // Pruned path behaves as if its entry were stale
        assert!(debouncer.accept(&event("old.png", at(t0, 6_000))));
        // Kept path still debounces
        assert!(!debouncer.accept(&event("fresh.png", at(t0, 6_000))));
    }

    #[test]
    fn test_simultaneous_events_accept_once() {
        let debouncer = Arc::new(ChangeDebouncer::new());
        let t0 = Instant::now();
        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let debouncer = Arc::clone(&debouncer);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    debouncer.accept(&event("data/race.jpg", t0))
                })
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|accepted| *accepted)
            .count();
        assert_eq!(accepted, 1);
    }

    #[test]
    fn test_folder_of_event() {
        assert_eq!(ModificationEvent::file("data/sub/cat.jpg").folder(), PathBuf::from("data/sub"));
        assert_eq!(ModificationEvent::file("cat.jpg").folder(), PathBuf::from("."));
    }
}
