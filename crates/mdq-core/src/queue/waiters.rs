//! FIFO list of pops waiting for a message

use crate::error::QueueError;
use crate::maildir::{Claim, ClaimedMessage};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, warn};

pub(crate) type Delivery = Result<ClaimedMessage, QueueError>;
pub(crate) type Waiter = oneshot::Sender<Delivery>;

/// Receiving side of one registered pop
///
/// If dropped while a message sits undelivered in the channel, the message
/// is rolled back so the abandoned pop never keeps it in cur/.
pub(crate) struct PendingDelivery {
    rx: oneshot::Receiver<Delivery>,
}

impl PendingDelivery {
    /// Wait for the wake loop to deliver
    pub(crate) async fn recv(&mut self) -> Result<Delivery, oneshot::error::RecvError> {
        (&mut self.rx).await
    }
}

impl Drop for PendingDelivery {
    fn drop(&mut self) {
        self.rx.close();
        if let Ok(Ok(message)) = self.rx.try_recv() {
            release(message.claim);
        }
    }
}

/// Roll back a claim nobody will receive
fn release(claim: Claim) {
    let name = claim.name().to_string();
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            debug!("Pop abandoned, rolling back {name}");
            handle.spawn(async move {
                if let Err(e) = claim.rollback().await {
                    warn!("Failed to roll back {name} for an abandoned pop: {e}");
                }
            });
        }
        Err(_) => warn!("No runtime to roll back {name}; it stays in cur/"),
    }
}

struct State {
    waiters: VecDeque<Waiter>,
    closed: bool,
}

/// Waiting pops in registration order
///
/// Once closed, registration fails with [`QueueError::Stopped`] so no pop can
/// slip in after `stop()` and wait forever.
pub(crate) struct WaiterList {
    state: Mutex<State>,
}

impl WaiterList {
    pub(crate) fn new(open: bool) -> Self {
        Self {
            state: Mutex::new(State {
                waiters: VecDeque::new(),
                closed: !open,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a waiter at the tail
    pub(crate) fn register(&self) -> Result<PendingDelivery, QueueError> {
        let mut state = self.lock();
        if state.closed {
            return Err(QueueError::Stopped);
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.push_back(tx);
        Ok(PendingDelivery { rx })
    }

    /// Remove the longest-waiting live waiter
    ///
    /// Waiters whose pop was dropped are discarded on the way.
    pub(crate) fn take_head(&self) -> Option<Waiter> {
        let mut state = self.lock();
        while let Some(waiter) = state.waiters.pop_front() {
            if !waiter.is_closed() {
                return Some(waiter);
            }
        }
        None
    }

    /// Put a waiter back at the head after a wake found nothing
    pub(crate) fn return_head(&self, waiter: Waiter) {
        let mut state = self.lock();
        if state.closed {
            drop(state);
            let _ = waiter.send(Err(QueueError::Stopped));
        } else {
            state.waiters.push_front(waiter);
        }
    }

    /// Fail every waiter and refuse new registrations
    pub(crate) fn close(&self) -> usize {
        let drained: Vec<Waiter> = {
            let mut state = self.lock();
            state.closed = true;
            state.waiters.drain(..).collect()
        };
        let count = drained.len();
        for waiter in drained {
            let _ = waiter.send(Err(QueueError::Stopped));
        }
        count
    }

    /// Fail every current waiter, keeping the list open
    pub(crate) fn fail_pending(&self, make_error: impl Fn() -> QueueError) -> usize {
        let drained: Vec<Waiter> = self.lock().waiters.drain(..).collect();
        let count = drained.len();
        for waiter in drained {
            let _ = waiter.send(Err(make_error()));
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().waiters.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
