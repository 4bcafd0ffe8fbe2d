//! # Structured execution logging.
//!
//! Every command execution produces a stream of JSON records, one per
//! output line, enriched with execution metadata (host, reactor id,
//! execution id, pid, status). Records flow through a [`LogStream`] sink
//! that the embedding application provides.
//!
//! ```text
//! process stdout/stderr ──► ReactorLog::write ──► one record per '\n'
//!                           ReactorLog::start ──► CMD record
//!                           ReactorLog::done  ──► END record (Elapse, Error)
//!                                   │
//!                                   ▼
//!                           LogStream::send(bytes)   (non-blocking)
//! ```
//!
//! Internal modules:
//! - [`record`] the per-execution record builder and its object pool
//! - [`stream`] the `LogStream` trait and built-in sinks

mod record;
mod stream;

pub use record::{LogPool, ReactorLog, Status};
pub use stream::{LogStream, MemoryStream, StdoutStream, StreamWorker};
