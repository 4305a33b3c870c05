//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Complete configuration file
///
/// ```toml
/// [queue]
/// path = "/var/spool/jobs"
/// persistent = true
/// notifier = "poll"
/// poll_interval_ms = 250
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Queue configuration
    #[serde(default)]
    pub queue: QueueConfig,
}

/// Queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Queue root directory (contains tmp/, new/, cur/)
    pub path: PathBuf,
    /// Subscribe to arrival notifications so blocking pops can wait
    pub persistent: bool,
    /// How arrivals are detected
    pub notifier: NotifierKind,
    /// Poll interval in milliseconds for the poll notifier and for
    /// watcher backends that fall back to polling
    pub poll_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            persistent: true,
            notifier: NotifierKind::Watch,
            poll_interval_ms: 500,
        }
    }
}

impl QueueConfig {
    /// Default configuration for the queue at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set whether the queue listens for arrivals
    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Set the arrival notifier
    pub fn with_notifier(mut self, notifier: NotifierKind) -> Self {
        self.notifier = notifier;
        self
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl From<&str> for QueueConfig {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for QueueConfig {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for QueueConfig {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<PathBuf> for QueueConfig {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

/// Arrival notifier backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    /// OS file watching (inotify, FSEvents, ReadDirectoryChangesW)
    Watch,
    /// Periodic directory scan, for network filesystems
    Poll,
}

impl FromStr for NotifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "watch" => Ok(NotifierKind::Watch),
            "poll" => Ok(NotifierKind::Poll),
            other => Err(format!("unknown notifier '{other}' (expected 'watch' or 'poll')")),
        }
    }
}
