//! # Reactors: predicate + command pairs.
//!
//! A reactor is a user declaration: "run this command for every message
//! that satisfies these conditions, at most N at a time". The dispatcher
//! asks the reactor whether a message matches; the worker executes the
//! command and reports the outcome back.
//!
//! ```text
//! InputDispatcher ──match_conditions──► Reactor (declaration + liveness)
//!        │                                  ▲
//!        └──inbox (bounded, cap = N)──► ReactorWorker
//!                                           │ per message:
//!                                           ├─ expand args, spawn process
//!                                           ├─ pipe output → ReactorLog
//!                                           └─ report done(msg, ok)
//! ```
//!
//! Internal modules:
//! - [`condition`] JSON-path match rules
//! - [`command`]   command spec, placeholder expansion, process spawn
//! - [`reactor`]   declaration + runtime state (ids, liveness stamps)
//! - [`worker`]    the per-reactor run loop

mod command;
mod condition;
mod reactor;
mod worker;

pub use command::CommandSpec;
pub use condition::MatchRule;
pub use reactor::Reactor;
pub use worker::{Completion, ReactorWorker};
