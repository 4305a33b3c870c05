//! Polling fallback for filesystems without change events
//!
//! OS watches do not fire for writes made by other hosts on NFS and similar
//! shared filesystems. This notifier scans new/ on an interval instead.

use super::{Notifier, Signal, SignalSender};
use crate::error::QueueError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Notifier that signals whenever new/ is non-empty at a poll tick
pub struct PollNotifier {
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl PollNotifier {
    /// Create an unsubscribed poller
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            task: None,
        }
    }
}

impl Notifier for PollNotifier {
    /// Requires a running tokio runtime.
    fn subscribe(&mut self, available_dir: &Path, signals: SignalSender) -> Result<(), QueueError> {
        self.unsubscribe();

        let handle = tokio::runtime::Handle::try_current().map_err(|e| QueueError::Notifier {
            message: format!("Poll notifier needs a tokio runtime: {e}"),
        })?;
        let dir = available_dir.to_path_buf();
        self.task = Some(handle.spawn(poll_loop(dir, self.interval, signals)));
        debug!(
            "Polling {} every {:?}",
            available_dir.display(),
            self.interval
        );
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for PollNotifier {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

async fn poll_loop(dir: PathBuf, interval: Duration, signals: SignalSender) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match has_visible_entries(&dir).await {
            Ok(true) => {
                if signals.send(Signal::Arrival).is_err() {
                    debug!("Signal receiver closed, poller exiting");
                    break;
                }
            }
            Ok(false) => {}
            Err(e) => warn!("Failed to poll {}: {e}", dir.display()),
        }
    }
}

async fn has_visible_entries(dir: &Path) -> std::io::Result<bool> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_name().to_string_lossy().starts_with('.') {
            return Ok(true);
        }
    }
    Ok(false)
}
