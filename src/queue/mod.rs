//! # Queue input: client contract and domain message.
//!
//! The dispatcher does not speak any provider protocol. It consumes a
//! [`QueueClient`] — receive a batch, delete by receipt handle — and turns
//! each raw [`ReceivedMessage`] into a domain [`Message`] (envelope
//! unwrapped, timestamp parsed, back-reference for acknowledgement).
//!
//! Internal modules:
//! - [`client`]  the `QueueClient` trait and the raw wire shape
//! - [`message`] the domain message and envelope unwrap

mod client;
mod message;

pub use client::{QueueClient, ReceivedMessage};
pub use message::Message;
