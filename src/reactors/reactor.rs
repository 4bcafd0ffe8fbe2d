//! # Reactor: declaration plus runtime state.
//!
//! The declaration comes from [`ReactorConfig`]; the runtime side is a
//! monotonic execution counter and two liveness stamps the health view
//! reads without blocking the worker.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::ReactorConfig;
use crate::error::RuntimeError;
use crate::queue::Message;
use crate::reactors::command::CommandSpec;
use crate::reactors::condition::{self, MatchRule};

/// One declared reactor with its runtime counters.
///
/// Shared (`Arc`) between the dispatcher (matching), the worker
/// (execution) and the health view (liveness reads).
#[derive(Debug)]
pub struct Reactor {
    rid: u64,
    label: String,
    command: CommandSpec,
    concurrent: usize,
    conditions: Vec<MatchRule>,
    /// Per-reactor execution id, monotonic.
    tid: AtomicU64,
    /// Epoch seconds of the newest successful execution, 0 = never.
    last_success: AtomicI64,
    /// Epoch seconds of the newest failed execution, 0 = never.
    last_error: AtomicI64,
}

impl Reactor {
    /// Validates the declaration and builds the runtime state.
    pub fn new(rid: u64, cfg: ReactorConfig) -> Result<Arc<Self>, RuntimeError> {
        if cfg.concurrent < 1 {
            return Err(RuntimeError::InvalidConcurrency {
                label: cfg.label,
                concurrent: cfg.concurrent,
            });
        }
        Ok(Arc::new(Self {
            rid,
            label: cfg.label,
            command: CommandSpec::new(cfg.command, cfg.args),
            concurrent: cfg.concurrent,
            conditions: cfg.conditions,
            tid: AtomicU64::new(0),
            last_success: AtomicI64::new(0),
            last_error: AtomicI64::new(0),
        }))
    }

    pub fn rid(&self) -> u64 {
        self.rid
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn concurrent(&self) -> usize {
        self.concurrent
    }

    pub fn command(&self) -> &CommandSpec {
        &self.command
    }

    /// Pure predicate: does this reactor accept the message?
    pub fn match_conditions(&self, msg: &Message) -> bool {
        condition::matches(&self.conditions, msg.body_json().as_ref())
    }

    /// Assigns the next execution id.
    pub(crate) fn next_tid(&self) -> u64 {
        self.tid.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn mark_success(&self) {
        self.last_success.store(epoch_now(), Ordering::Relaxed);
    }

    pub(crate) fn mark_error(&self) {
        self.last_error.store(epoch_now(), Ordering::Relaxed);
    }

    /// Epoch seconds of the newest success; 0 = never.
    pub fn last_success_epoch(&self) -> i64 {
        self.last_success.load(Ordering::Relaxed)
    }

    /// Epoch seconds of the newest failure; 0 = never.
    pub fn last_error_epoch(&self) -> i64 {
        self.last_error.load(Ordering::Relaxed)
    }

    /// True once any execution (success or failure) has been recorded.
    pub fn has_executed(&self) -> bool {
        self.last_success_epoch() != 0 || self.last_error_epoch() != 0
    }
}

fn epoch_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(label: &str, concurrent: usize) -> ReactorConfig {
        ReactorConfig {
            label: label.into(),
            command: "true".into(),
            args: Vec::new(),
            concurrent,
            conditions: Vec::new(),
        }
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = Reactor::new(1, cfg("bad", 0)).unwrap_err();
        assert_eq!(err.as_label(), "runtime_invalid_concurrency");
    }

    #[test]
    fn tids_are_monotonic_from_one() {
        let r = Reactor::new(1, cfg("r", 1)).unwrap();
        assert_eq!(r.next_tid(), 1);
        assert_eq!(r.next_tid(), 2);
        assert_eq!(r.next_tid(), 3);
    }

    #[test]
    fn liveness_stamps_start_at_never() {
        let r = Reactor::new(1, cfg("r", 1)).unwrap();
        assert!(!r.has_executed());
        r.mark_success();
        assert!(r.has_executed());
        assert!(r.last_success_epoch() > 0);
        assert_eq!(r.last_error_epoch(), 0);
    }
}
