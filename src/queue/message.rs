//! # Domain message.
//!
//! [`Message`] is what reactors see: the (possibly unwrapped) body plus the
//! identity used for acknowledgement. It carries a back-reference to the
//! queue client so the dispatcher can delete it without knowing which
//! provider it came from.
//!
//! ## Envelope unwrap
//! Fan-out publish systems commonly wrap the payload in a JSON envelope with
//! a top-level `Message` string field. If the body parses that way, the
//! inner string replaces the body: embedded `\"` sequences are unescaped and
//! one pair of surrounding quotes is stripped. Anything else — invalid JSON,
//! no `Message` field, non-string `Message` — leaves the body untouched, so
//! the unwrap is idempotent: an already-unwrapped payload no longer parses
//! as an envelope.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use crate::error::QueueError;
use crate::queue::client::{QueueClient, ReceivedMessage};

/// One in-flight delivery, shared across every reactor that accepted it.
pub struct Message {
    queue: Arc<dyn QueueClient>,
    message_id: String,
    receipt_handle: String,
    body: Bytes,
    sent_timestamp: i64,
}

impl Message {
    /// Builds the domain message from a raw delivery: parses the sent
    /// timestamp and applies the envelope unwrap.
    pub fn from_received(queue: Arc<dyn QueueClient>, raw: ReceivedMessage) -> Arc<Self> {
        let sent_timestamp = raw
            .sent_timestamp
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0);

        let body = match unwrap_envelope(&raw.body) {
            Some(inner) => Bytes::from(inner),
            None => Bytes::from(raw.body),
        };

        Arc::new(Self {
            queue,
            message_id: raw.message_id,
            receipt_handle: raw.receipt_handle,
            body,
            sent_timestamp,
        })
    }

    /// Payload after envelope unwrap.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Provider message id (informational; may repeat across redeliveries).
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Delivery identity used for all bookkeeping and acknowledgement.
    pub fn receipt_handle(&self) -> &str {
        &self.receipt_handle
    }

    /// Epoch milliseconds the provider stamped at send time, 0 if unknown.
    pub fn sent_timestamp(&self) -> i64 {
        self.sent_timestamp
    }

    /// Acknowledges (deletes) this delivery at the provider.
    pub async fn ack(&self) -> Result<(), QueueError> {
        self.queue.delete(&self.receipt_handle).await
    }

    /// Parses the body as JSON, if it is JSON.
    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Body as UTF-8 text (lossy).
    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("message_id", &self.message_id)
            .field("receipt_handle", &self.receipt_handle)
            .field("sent_timestamp", &self.sent_timestamp)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Returns the unwrapped inner payload, or `None` if the body is not an
/// envelope.
fn unwrap_envelope(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    let inner = parsed.as_object()?.get("Message")?.as_str()?;

    // Double-encoded payloads keep escaped quotes inside the inner string;
    // unescape them, then strip the single surrounding pair if present.
    let unescaped = inner.replace("\\\"", "\"");
    let mut s = unescaped.as_str();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s = &s[1..s.len() - 1];
    }
    Some(s.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    struct NullQueue {
        deleted: Mutex<Vec<String>>,
    }

    impl NullQueue {
        fn arc() -> Arc<Self> {
            Arc::new(Self {
                deleted: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl QueueClient for NullQueue {
        async fn receive(
            &self,
            _max: i64,
            _wait: Duration,
        ) -> Result<Vec<ReceivedMessage>, QueueError> {
            Ok(Vec::new())
        }

        async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
            self.deleted.lock().unwrap().push(receipt_handle.to_string());
            Ok(())
        }
    }

    fn raw(body: &str) -> ReceivedMessage {
        ReceivedMessage {
            message_id: "m1".into(),
            receipt_handle: "h1".into(),
            body: body.into(),
            sent_timestamp: Some("1700000000000".into()),
        }
    }

    #[test]
    fn plain_body_passes_through() {
        let m = Message::from_received(NullQueue::arc(), raw("hello"));
        assert_eq!(&m.body()[..], b"hello");
        assert_eq!(m.sent_timestamp(), 1_700_000_000_000);
    }

    #[test]
    fn envelope_is_unwrapped_and_unquoted() {
        let m = Message::from_received(
            NullQueue::arc(),
            raw(r#"{"Message":"\"payload\""}"#),
        );
        assert_eq!(&m.body()[..], b"payload");
    }

    #[test]
    fn envelope_with_escaped_json_payload() {
        let m = Message::from_received(
            NullQueue::arc(),
            raw(r#"{"Message":"{\"kind\":\"resize\"}"}"#),
        );
        assert_eq!(&m.body()[..], br#"{"kind":"resize"}"#);
        assert!(m.body_json().is_some());
    }

    #[test]
    fn unwrap_is_idempotent() {
        let once = unwrap_envelope(r#"{"Message":"\"payload\""}"#).unwrap();
        assert_eq!(once, "payload");
        assert!(unwrap_envelope(&once).is_none());
    }

    #[test]
    fn non_envelope_json_is_untouched() {
        let m = Message::from_received(NullQueue::arc(), raw(r#"{"kind":"resize"}"#));
        assert_eq!(&m.body()[..], br#"{"kind":"resize"}"#);
    }

    #[test]
    fn bad_timestamp_parses_to_zero() {
        let mut r = raw("x");
        r.sent_timestamp = Some("not-a-number".into());
        let m = Message::from_received(NullQueue::arc(), r);
        assert_eq!(m.sent_timestamp(), 0);
    }

    #[tokio::test]
    async fn ack_deletes_by_receipt_handle() {
        let q = NullQueue::arc();
        let m = Message::from_received(q.clone(), raw("hello"));
        m.ack().await.unwrap();
        assert_eq!(q.deleted.lock().unwrap().as_slice(), ["h1"]);
    }
}
