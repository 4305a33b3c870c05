//! File system watcher for the available directory

use super::{Notifier, Signal, SignalSender};
use crate::error::QueueError;
use notify::event::{ModifyKind, RenameMode};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info};

/// Notifier backed by OS file watching
///
/// Uses inotify on Linux, FSEvents on macOS and ReadDirectoryChangesW on
/// Windows. Watches new/ non-recursively.
pub struct WatchNotifier {
    poll_interval: Duration,
    watcher: Option<RecommendedWatcher>,
}

impl WatchNotifier {
    /// Create an unsubscribed watcher
    ///
    /// `poll_interval` only matters on platforms where `notify` falls back to
    /// its polling backend.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            watcher: None,
        }
    }
}

impl Default for WatchNotifier {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl Notifier for WatchNotifier {
    fn subscribe(&mut self, available_dir: &Path, signals: SignalSender) -> Result<(), QueueError> {
        self.unsubscribe();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    debug!("File system event: {:?}", event);
                    if is_arrival(&event.kind) {
                        let _ = signals.send(Signal::Arrival);
                    }
                }
                Err(e) => {
                    error!("File system watcher error: {}", e);
                    let _ = signals.send(Signal::Failed(e.to_string()));
                }
            },
            NotifyConfig::default().with_poll_interval(self.poll_interval),
        )
        .map_err(|e| QueueError::Notifier {
            message: format!("Failed to create file system watcher: {e}"),
        })?;

        watcher
            .watch(available_dir, RecursiveMode::NonRecursive)
            .map_err(|e| QueueError::Notifier {
                message: format!("Failed to watch {}: {e}", available_dir.display()),
            })?;

        info!("Watching {} for arrivals", available_dir.display());
        self.watcher = Some(watcher);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if self.watcher.take().is_some() {
            debug!("File system watcher stopped");
        }
    }

    fn is_active(&self) -> bool {
        self.watcher.is_some()
    }
}

/// Whether an event in new/ may mean a message became available
///
/// Removals and renames out of new/ are claims by consumers, and reads are
/// irrelevant; everything else is passed on.
fn is_arrival(kind: &EventKind) -> bool {
    match kind {
        EventKind::Remove(_) | EventKind::Access(_) => false,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => false,
        _ => true,
    }
}
