//! Recursive notify watcher feeding a bounded channel

use crate::debounce::{is_image_path, ModificationEvent};
use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Watches a folder tree and forwards image modifications
///
/// Notifications are delivered on notify's own thread. When the channel is
/// full that thread blocks until the dispatcher catches up, so no event is
/// dropped. Dropping the watcher stops delivery and closes the channel.
pub struct ImageWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl ImageWatcher {
    /// Start watching `root` recursively
    pub fn start(root: &Path, capacity: usize) -> Result<(Self, mpsc::Receiver<ModificationEvent>)> {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => forward(event, &tx),
                Err(err) => error!("Watch error: {:?}", err),
            },
            Config::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;

        info!(root = %root.display(), "Watching for image changes");

        Ok((
            Self {
                root: root.to_path_buf(),
                _watcher: watcher,
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Whether a notify event kind counts as a content modification
///
/// Creations, removals and renames are not modifications. Most platforms
/// follow a creation with a data modification once content is written.
pub fn is_modification(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(
            ModifyKind::Any | ModifyKind::Data(_) | ModifyKind::Metadata(_) | ModifyKind::Other
        )
    )
}

fn forward(event: Event, tx: &mpsc::Sender<ModificationEvent>) {
    if !is_modification(&event.kind) {
        return;
    }

    let observed_at = Instant::now();
    for path in event.paths {
        // Skip the dispatcher's own log writes and other non-images early
        if !is_image_path(&path) {
            continue;
        }
        let is_directory = path.is_dir();
        debug!(path = %path.display(), kind = ?event.kind, "Modification observed");

        if tx
            .blocking_send(ModificationEvent::new(path, is_directory, observed_at))
            .is_err()
        {
            warn!("Dispatcher is gone, dropping modification events");
            return;
        }
    }
}
