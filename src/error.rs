//! # Error types used by the reactvisor runtime.
//!
//! Three enums, one per failure domain:
//!
//! - [`RuntimeError`] errors raised by the orchestration runtime itself.
//! - [`ExecError`] errors raised by individual command executions.
//! - [`QueueError`] errors reported by a [`QueueClient`](crate::QueueClient)
//!   implementation.
//!
//! Queue and execution errors are *local* by design: the dispatcher logs and
//! retries receive failures, and a failed execution only surfaces through the
//! END log record and the message's redelivery. `RuntimeError` is the only
//! kind that escapes [`Supervisor::run`](crate::Supervisor::run).

use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the reactvisor runtime.
///
/// These represent failures in the orchestration system itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some reactors still had running executions.
    #[error("shutdown grace {grace:?} exceeded; still running: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Labels of reactors whose workers did not finish in time.
        stuck: Vec<String>,
    },
    /// Attempted to register a reactor label that already exists on this input.
    #[error("reactor '{label}' already registered on this input")]
    ReactorExists {
        /// The duplicate reactor label.
        label: String,
    },
    /// A reactor was declared with an invalid concurrency (must be >= 1).
    #[error("reactor '{label}' declares concurrent={concurrent}; minimum is 1")]
    InvalidConcurrency { label: String, concurrent: usize },
    /// The health endpoint failed to bind or serve.
    #[error("health endpoint error: {reason}")]
    Health { reason: String },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::ReactorExists { .. } => "runtime_reactor_exists",
            RuntimeError::InvalidConcurrency { .. } => "runtime_invalid_concurrency",
            RuntimeError::Health { .. } => "runtime_health",
        }
    }
}

/// # Errors produced by one command execution.
///
/// Whatever variant occurs, the worker reports the execution as failed:
/// the END record carries the message and the source message is not
/// acknowledged.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ExecError {
    /// The process could not be spawned at all.
    #[error("spawn failed: {reason}")]
    Spawn { reason: String },

    /// The process ran and exited with a non-zero status code.
    #[error("exit status {code}")]
    NonZeroExit { code: i32 },

    /// The process was terminated by a signal (no exit code).
    #[error("killed by signal")]
    Killed,

    /// Reading the process output pipes failed mid-run.
    #[error("output pipe error: {reason}")]
    Pipe { reason: String },
}

impl ExecError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecError::Spawn { .. } => "exec_spawn",
            ExecError::NonZeroExit { .. } => "exec_nonzero_exit",
            ExecError::Killed => "exec_killed",
            ExecError::Pipe { .. } => "exec_pipe",
        }
    }
}

/// # Errors reported by a queue client.
///
/// Receive errors trigger a logged backoff-and-retry in the dispatcher;
/// delete errors are logged and dropped (the provider's visibility timeout
/// redelivers the message).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum QueueError {
    /// A receive (long poll) call failed.
    #[error("receive failed: {reason}")]
    Receive { reason: String },
    /// A delete (acknowledge) call failed.
    #[error("delete failed: {reason}")]
    Delete { reason: String },
}

impl QueueError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            QueueError::Receive { .. } => "queue_receive",
            QueueError::Delete { .. } => "queue_delete",
        }
    }
}
