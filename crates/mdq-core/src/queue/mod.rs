//! Queue coordinator
//!
//! Turns the [`Maildir`] claim protocol into push/pop semantics:
//!
//! - `tpop()` lists new/ once, tries to claim each candidate in order and
//!   returns the first one it wins as a [`Transaction`]
//! - when no candidate can be won, the pop waits in a FIFO list until an
//!   arrival signal lets the wake loop retry on its behalf
//! - `pop()` is `tpop()` followed by `commit()`
//!
//! # Example
//!
//! ```rust,no_run
//! use maildir_queue_core::Queue;
//! use serde_json::{json, Value};
//!
//! # async fn run() -> Result<(), maildir_queue_core::QueueError> {
//! let queue = Queue::open("/var/spool/jobs").await?;
//! queue.push(&json!({ "hello": "world" })).await?;
//!
//! let tx = queue.tpop::<Value>().await?;
//! println!("working on {}", tx.value());
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```

mod transaction;
mod waiters;

pub use transaction::Transaction;

use crate::config::{NotifierKind, QueueConfig};
use crate::error::QueueError;
use crate::maildir::{ClaimOutcome, ClaimedMessage, Maildir};
use crate::notifier::{Notifier, PollNotifier, Signal, SignalSender, WatchNotifier};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use waiters::WaiterList;

/// State shared between the queue handle and its wake loop
struct Shared {
    maildir: Arc<Maildir>,
    waiters: WaiterList,
    running: AtomicBool,
}

/// A filesystem-backed FIFO queue
///
/// Must be opened inside a tokio runtime; the wake loop runs as a task on it.
pub struct Queue {
    shared: Arc<Shared>,
    signals: SignalSender,
    notifier: Mutex<Box<dyn Notifier>>,
}

impl Queue {
    /// Open (creating if needed) the queue described by `config`
    ///
    /// Accepts a bare path or a full [`QueueConfig`]. The notifier backend is
    /// chosen from `config.notifier`.
    pub async fn open(config: impl Into<QueueConfig>) -> Result<Self, QueueError> {
        let config = config.into();
        let notifier: Box<dyn Notifier> = match config.notifier {
            NotifierKind::Watch => Box::new(WatchNotifier::new(config.poll_interval())),
            NotifierKind::Poll => Box::new(PollNotifier::new(config.poll_interval())),
        };
        Self::with_notifier(config, notifier).await
    }

    /// Open the queue with a caller-supplied notifier
    pub async fn with_notifier(
        config: impl Into<QueueConfig>,
        mut notifier: Box<dyn Notifier>,
    ) -> Result<Self, QueueError> {
        let config = config.into();
        let maildir = Arc::new(Maildir::new(config.path.clone()));
        maildir.create().await?;

        let (signals, signal_rx) = mpsc::unbounded_channel();
        if config.persistent {
            notifier.subscribe(maildir.available_dir(), signals.clone())?;
        }

        let shared = Arc::new(Shared {
            maildir,
            waiters: WaiterList::new(config.persistent),
            running: AtomicBool::new(config.persistent),
        });
        // Exits once every signal sender is gone
        tokio::spawn(wake_loop(Arc::clone(&shared), signal_rx));

        info!(
            "Opened queue at {} (persistent: {})",
            shared.maildir.root().display(),
            config.persistent
        );

        Ok(Self {
            shared,
            signals,
            notifier: Mutex::new(notifier),
        })
    }

    /// Underlying storage engine
    pub fn maildir(&self) -> &Arc<Maildir> {
        &self.shared.maildir
    }

    /// Serialize `value` as JSON and enqueue it
    ///
    /// Local waiters are woken by the notifier, not by this call.
    ///
    /// # Returns
    ///
    /// The unique name of the new message
    pub async fn push<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, QueueError> {
        let payload = serde_json::to_vec(value).map_err(|source| QueueError::Serialize { source })?;
        self.shared.maildir.enqueue(&payload).await
    }

    /// Pop one message and commit it
    ///
    /// Returns only after the commit succeeded. If the commit fails the error
    /// is returned and the message stays in cur/; it is not rolled back.
    pub async fn pop<T: DeserializeOwned>(&self) -> Result<T, QueueError> {
        self.tpop().await?.commit().await
    }

    /// Pop one message inside a transaction, waiting if none is available
    ///
    /// # Errors
    ///
    /// - [`QueueError::Malformed`] if the claimed payload does not decode as
    ///   `T`; the message stays in cur/
    /// - [`QueueError::Stopped`] if nothing is available and the queue is not
    ///   running, or it stops while waiting
    /// - [`QueueError::Notifier`] if the notifier fails while waiting
    /// - [`QueueError::Io`] for listing or claim failures
    pub async fn tpop<T: DeserializeOwned>(&self) -> Result<Transaction<T>, QueueError> {
        let message = match self.shared.claim_next().await? {
            Some(message) => message,
            None => self.wait_for_message().await?,
        };
        Transaction::decode(message)
    }

    /// Pop and commit one message if one can be claimed right now
    pub async fn try_pop<T: DeserializeOwned>(&self) -> Result<Option<T>, QueueError> {
        match self.try_tpop().await? {
            Some(tx) => Ok(Some(tx.commit().await?)),
            None => Ok(None),
        }
    }

    /// Claim one message if one can be claimed right now, without waiting
    pub async fn try_tpop<T: DeserializeOwned>(&self) -> Result<Option<Transaction<T>>, QueueError> {
        match self.shared.claim_next().await? {
            Some(message) => Ok(Some(Transaction::decode(message)?)),
            None => Ok(None),
        }
    }

    /// Delete every message in every lifecycle directory
    pub async fn clear(&self) -> Result<(), QueueError> {
        self.shared.maildir.purge_all().await
    }

    /// Number of available messages (claimed ones are not counted)
    pub async fn length(&self) -> Result<usize, QueueError> {
        self.shared.maildir.count().await
    }

    /// Number of pops currently waiting in this process
    pub fn waiting(&self) -> usize {
        self.shared.waiters.len()
    }

    /// Whether the queue listens for arrivals
    ///
    /// False after `stop()`, and also when the notifier has died on its own.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
            && self
                .notifier
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_active()
    }

    /// Stop listening for arrivals
    ///
    /// Every pop currently waiting fails with [`QueueError::Stopped`], and
    /// later pops fail the same way when nothing is available. Non-waiting
    /// operations keep working.
    pub fn stop(&self) {
        self.notifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unsubscribe();
        let was_running = self.shared.running.swap(false, Ordering::SeqCst);
        let failed = self.shared.waiters.close();
        if was_running {
            info!(
                "Stopped queue at {} ({failed} waiting pops failed)",
                self.shared.maildir.root().display()
            );
        }
    }

    /// Register as a waiter and wait for the wake loop to deliver
    async fn wait_for_message(&self) -> Result<ClaimedMessage, QueueError> {
        let mut delivery = self.shared.waiters.register()?;
        // A push may have landed between our listing and the registration;
        // one local re-check through the wake loop covers that window.
        let _ = self.signals.send(Signal::Arrival);
        delivery.recv().await.map_err(|_| QueueError::Stopped)?
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("root", &self.shared.maildir.root())
            .field("running", &self.is_running())
            .field("waiting", &self.waiting())
            .finish()
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        self.notifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unsubscribe();
        // The wake loop is left to drain rather than aborted: cancelling a
        // pass between a claim and its hand-off would strand the message.
        self.shared.waiters.close();
    }
}

impl Shared {
    /// List once and claim the first candidate that can be won
    ///
    /// Lost races move on to the next candidate in the same listing; there is
    /// no re-listing. Unreadable messages are skipped and stay in cur/.
    async fn claim_next(&self) -> Result<Option<ClaimedMessage>, QueueError> {
        let candidates = self.maildir.list_available().await?;

        for name in candidates {
            match self.maildir.claim(&name).await? {
                ClaimOutcome::Claimed => {}
                ClaimOutcome::Unavailable => {
                    debug!("Lost claim on {name}, trying next candidate");
                    continue;
                }
            }

            match self.maildir.read_claimed(&name).await {
                Ok(message) => return Ok(Some(message)),
                Err(e) => warn!("Skipping claimed message {name}: {e}"),
            }
        }

        Ok(None)
    }

    /// Hand messages to waiters, oldest first, until one finds nothing
    async fn serve_waiters(&self) {
        while let Some(waiter) = self.waiters.take_head() {
            match self.claim_next().await {
                Ok(Some(message)) => {
                    if let Err(Ok(message)) = waiter.send(Ok(message)) {
                        // The pop was dropped while we were claiming for it
                        let name = message.claim.name().to_string();
                        debug!("Waiter gone, rolling back {name}");
                        if let Err(e) = message.claim.rollback().await {
                            warn!("Failed to roll back {name} for a dropped waiter: {e}");
                        }
                    }
                }
                Ok(None) => {
                    self.waiters.return_head(waiter);
                    break;
                }
                Err(e) => {
                    let _ = waiter.send(Err(e));
                    break;
                }
            }
        }
    }
}

/// Consume notifier signals and retry waiting pops
///
/// Signals that pile up while a pass runs are coalesced into the next pass.
async fn wake_loop(shared: Arc<Shared>, mut signals: mpsc::UnboundedReceiver<Signal>) {
    while let Some(signal) = signals.recv().await {
        let mut failure = match signal {
            Signal::Failed(message) => Some(message),
            Signal::Arrival => None,
        };
        while let Ok(next) = signals.try_recv() {
            if let Signal::Failed(message) = next {
                failure = Some(message);
            }
        }

        if let Some(message) = failure {
            let failed = shared.waiters.fail_pending(|| QueueError::Notifier {
                message: message.clone(),
            });
            warn!("Notifier failed ({message}); {failed} waiting pops failed");
            continue;
        }

        if shared.waiters.is_empty() {
            continue;
        }
        debug!("Arrival signal, serving {} waiters", shared.waiters.len());
        shared.serve_waiters().await;
    }
}
