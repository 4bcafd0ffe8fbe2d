//! # Queue client contract.
//!
//! Everything the dispatcher needs from a message queue provider:
//! long-poll receive and delete-by-receipt-handle. Implementations own the
//! wire protocol, credentials, and endpoint configuration.
//!
//! ## Rules
//! - `receive` is a long poll: it may block up to `wait` before returning
//!   an empty batch.
//! - `receipt_handle` is unique per *delivery* (the provider may reuse
//!   message ids across redeliveries); all dispatcher bookkeeping is keyed
//!   on it.
//! - A failed `delete` is not fatal: the provider's visibility timeout
//!   redelivers the message.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::QueueError;

/// One raw message as returned by the provider, before domain conversion.
#[derive(Clone, Debug)]
pub struct ReceivedMessage {
    /// Provider message id. May repeat across redeliveries.
    pub message_id: String,
    /// Opaque acknowledgement token, unique per delivery.
    pub receipt_handle: String,
    /// Raw body text.
    pub body: String,
    /// `SentTimestamp` attribute if the provider supplied one
    /// (base-10 epoch milliseconds).
    pub sent_timestamp: Option<String>,
}

/// Provider-side operations required by an input dispatcher.
#[async_trait]
pub trait QueueClient: Send + Sync + 'static {
    /// Receives up to `max` messages, long-polling up to `wait`.
    async fn receive(
        &self,
        max: i64,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Deletes (acknowledges) one delivery by its receipt handle.
    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;
}
