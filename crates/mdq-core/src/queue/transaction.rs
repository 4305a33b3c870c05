//! Deferred resolution of a popped message

use crate::error::QueueError;
use crate::maildir::{Claim, ClaimedMessage};
use serde::de::DeserializeOwned;

/// A decoded message held in cur/ until committed or rolled back
///
/// Dropping a transaction without resolving it leaves the message in cur/,
/// invisible to `length()` until restored.
#[derive(Debug)]
#[must_use = "an unresolved transaction keeps the message claimed"]
pub struct Transaction<T> {
    value: T,
    claim: Claim,
}

impl<T: DeserializeOwned> Transaction<T> {
    /// Decode a claimed payload
    ///
    /// On failure the claim is released without rollback: the message stays
    /// in cur/ because its content, not the delivery, is at fault.
    pub(crate) fn decode(message: ClaimedMessage) -> Result<Self, QueueError> {
        let ClaimedMessage { payload, claim } = message;
        match serde_json::from_slice(&payload) {
            Ok(value) => Ok(Self { value, claim }),
            Err(source) => Err(QueueError::Malformed {
                name: claim.name().to_string(),
                source,
            }),
        }
    }
}

impl<T> Transaction<T> {
    /// The decoded message
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Unique name of the message file
    pub fn name(&self) -> &str {
        self.claim.name()
    }

    /// Delete the message and hand back its value
    pub async fn commit(self) -> Result<T, QueueError> {
        let Transaction { value, claim } = self;
        claim.commit().await?;
        Ok(value)
    }

    /// Return the message to the queue
    pub async fn rollback(self) -> Result<(), QueueError> {
        self.claim.rollback().await
    }

    /// Split into the value and the raw claim handle
    pub fn into_parts(self) -> (T, Claim) {
        (self.value, self.claim)
    }
}
