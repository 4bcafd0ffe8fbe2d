//! # reactvisor
//!
//! **Reactvisor** is a message-driven command executor. It consumes
//! messages from an external queue, matches each one against user-declared
//! *reactors* ("run command C when a message satisfies predicate P"),
//! executes the matching commands under per-reactor concurrency bounds,
//! streams their output as structured per-line log records, and deletes
//! the source message only after every matching reactor succeeded.
//!
//! ## Features
//!
//! | Area            | Description                                                          | Key types / traits                       |
//! |-----------------|----------------------------------------------------------------------|------------------------------------------|
//! | **Queue input** | Bring-your-own provider: receive a batch, delete by receipt handle.  | [`QueueClient`], [`ReceivedMessage`]     |
//! | **Dispatch**    | Fan-out with pending refcounts and a runtime-adjustable budget.      | [`InputDispatcher`], [`DynamicSemaphore`]|
//! | **Reactors**    | Predicate + command pairs, bounded concurrency, arg templating.      | [`ReactorConfig`], [`MatchRule`]         |
//! | **Exec logs**   | One JSON record per output line with a CMD/RUN/END status machine.   | [`LogStream`], [`ReactorLog`]            |
//! | **Health**      | OR-across-reactors freshness probe over HTTP.                        | [`HealthView`], [`Config::health_addr`]  |
//! | **Lifecycle**   | Signal-driven graceful shutdown with drain and grace caps.           | [`Supervisor`], [`RuntimeError`]         |
//!
//! ## Delivery semantics
//!
//! At-least-once: a message is deleted **iff** every reactor that accepted
//! it completed without error. Any failure leaves the message to the
//! provider's visibility timeout, so commands should be idempotent.
//!
//! ```no_run
//! use std::sync::Arc;
//! use reactvisor::{Config, InputConfig, ReactorConfig, StdoutStream, Supervisor};
//!
//! # async fn demo(queue: Arc<dyn reactvisor::QueueClient>) -> Result<(), Box<dyn std::error::Error>> {
//! let mut sup = Supervisor::new(Config::default(), Arc::new(StdoutStream));
//!
//! let input = sup.add_input("jobs", queue, InputConfig::default());
//! sup.add_reactor(input, ReactorConfig {
//!     label: "resize".into(),
//!     command: "convert-image".into(),
//!     args: vec!["$.bucket".into(), "$.key".into()],
//!     concurrent: 4,
//!     conditions: serde_json::from_str(r#"[{"path": "kind", "equals": "resize"}]"#)?,
//! })?;
//!
//! // Serves until SIGINT/SIGTERM/SIGQUIT, then drains and stops.
//! sup.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ---

mod config;
mod core;
mod dispatch;
mod error;
mod health;
mod logs;
mod queue;
mod reactors;

// ---- Public re-exports ----

pub use config::{Config, InputConfig, ReactorConfig};
pub use core::{InputId, Supervisor};
pub use dispatch::{DynamicSemaphore, InputDispatcher};
pub use error::{ExecError, QueueError, RuntimeError};
pub use health::{HealthServer, HealthView};
pub use logs::{LogPool, LogStream, MemoryStream, ReactorLog, Status, StdoutStream, StreamWorker};
pub use queue::{Message, QueueClient, ReceivedMessage};
pub use reactors::{CommandSpec, Completion, MatchRule, Reactor, ReactorWorker};
