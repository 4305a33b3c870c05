//! Arrival notification for the available directory
//!
//! A notifier turns "something changed in new/" into [`Signal`]s on a channel.
//! Signals carry no message identity: several arrivals may collapse into one
//! signal and a signal may fire when nothing claimable arrived. The queue only
//! uses them as a cue to retry waiting pops.

mod poll;
mod watch;

pub use poll::PollNotifier;
pub use watch::WatchNotifier;

use crate::error::QueueError;
use std::path::Path;
use tokio::sync::mpsc;

/// Signal sent from a notifier to the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// A message may have become available
    Arrival,
    /// The notification backend failed; waiting pops should be told
    Failed(String),
}

/// Sending half handed to a notifier on subscribe
pub type SignalSender = mpsc::UnboundedSender<Signal>;

/// Source of arrival signals for a queue's new/ directory
pub trait Notifier: Send {
    /// Start emitting signals for changes in `available_dir`
    fn subscribe(&mut self, available_dir: &Path, signals: SignalSender) -> Result<(), QueueError>;

    /// Stop emitting signals. Idempotent.
    fn unsubscribe(&mut self);

    /// Whether the notifier is currently subscribed
    fn is_active(&self) -> bool;
}
