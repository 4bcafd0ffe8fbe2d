//! # Runtime core: wiring and lifecycle.
//!
//! The [`Supervisor`] is the only public entry point here. It owns the
//! runtime pieces and drives them through one start/stop cycle:
//!
//! ```text
//! Application code
//!   └─ Supervisor::new(cfg, sink)
//!        ├─ add_input(queue, input_cfg)      (one dispatcher per queue)
//!        ├─ add_reactor(input, reactor_cfg)  (reactor + inbox + worker seed)
//!        └─ run()
//!             ├─ spawn log stream worker
//!             ├─ spawn reactor workers
//!             ├─ spawn dispatcher receive loops
//!             ├─ start health endpoint (optional)
//!             ├─ wait for OS termination signal
//!             └─ graceful shutdown:
//!                  stop dispatchers → await drain
//!                  → close reactor inboxes → await workers (grace cap)
//!                  → stop health endpoint → close log stream
//! ```
//!
//! ## Rules
//! - Registration is single-shot: inputs and reactors are declared before
//!   `run()`; the hand-off budget still moves if a dispatcher is asked to
//!   deregister at runtime.
//! - Shutdown ordering matters: dispatchers drain *before* inboxes close,
//!   so accepted messages reach their reactors; workers finish in-flight
//!   processes; the grace period bounds the whole wait.
//!
//! Internal modules:
//! - [`supervisor`] wiring + graceful shutdown
//! - [`shutdown`]   OS signal handling

mod shutdown;
mod supervisor;

pub use supervisor::{InputId, Supervisor};
