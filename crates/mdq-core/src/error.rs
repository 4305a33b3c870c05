//! Error types for queue operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during queue operations
///
/// Claim contention is deliberately absent: losing a rename race is reported
/// as [`ClaimOutcome::Unavailable`](crate::maildir::ClaimOutcome::Unavailable)
/// and consumed inside the coordinator.
#[derive(Error, Debug)]
pub enum QueueError {
    /// File I/O error
    #[error("I/O error during {op} on {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    /// A claimed message does not contain a valid payload
    ///
    /// The message is left in `cur/` for manual inspection.
    #[error("Message {name} is not valid JSON: {source}")]
    Malformed {
        name: String,
        source: serde_json::Error,
    },

    /// Failed to encode a value before pushing it
    #[error("Failed to serialize message: {source}")]
    Serialize { source: serde_json::Error },

    /// The queue stopped listening for arrivals while a pop was waiting
    #[error("Queue is stopped")]
    Stopped,

    /// The change notifier reported a failure
    #[error("Change notifier failed: {message}")]
    Notifier { message: String },
}

impl QueueError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        QueueError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}
