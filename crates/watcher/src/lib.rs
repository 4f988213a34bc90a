//! Image folder watching for Lookout
//!
//! This crate provides:
//! - Recursive watching of a root folder, forwarding image modifications
//! - Per-path debouncing with a fixed window (5 s)
//! - Dispatch of each accepted change to an analyzer and the folder's log

pub mod debounce;
pub mod dispatch;
pub mod watch;

pub use debounce::{is_image_path, ChangeDebouncer, ModificationEvent, DEBOUNCE_WINDOW, IMAGE_EXTENSIONS};
pub use dispatch::{DispatchOptions, DispatchOutcome, DispatchStats, Dispatcher, DrainReport, StatsSnapshot};
pub use watch::{is_modification, ImageWatcher};

use lookout_core::WatcherSettings;

impl From<&WatcherSettings> for DispatchOptions {
    fn from(settings: &WatcherSettings) -> Self {
        Self {
            max_in_flight: settings.max_in_flight,
            prune_interval: settings.prune_interval(),
        }
    }
}
