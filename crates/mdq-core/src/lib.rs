//! Core library for maildir-queue
//!
//! A durable FIFO queue shared by any number of producer and consumer
//! processes through a directory tree, with no broker and no lock files.
//! Atomic rename is the only coordination primitive:
//!
//! - [`Maildir`]: the storage engine (tmp/ → new/ → cur/ lifecycle)
//! - [`Queue`]: transactional and blocking pop on top of it
//! - [`Notifier`](notifier::Notifier): "something arrived" signals that wake
//!   waiting pops
//!
//! The on-disk layout is the classic maildir one, so existing queue
//! directories interoperate.

pub mod config;
pub mod error;
pub mod logging;
pub mod maildir;
pub mod notifier;
pub mod queue;

pub use config::{NotifierKind, QueueConfig};
pub use error::QueueError;
pub use maildir::{Claim, ClaimOutcome, ClaimedMessage, Maildir};
pub use queue::{Queue, Transaction};
