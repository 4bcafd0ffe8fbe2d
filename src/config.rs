//! # Runtime configuration.
//!
//! Three layers of settings, all serde-deserializable so an embedding
//! application can load them straight from its own config file:
//!
//! 1. [`Config`] global runtime knobs passed to [`Supervisor::new`](crate::Supervisor::new)
//! 2. [`InputConfig`] per-input receive parameters
//! 3. [`ReactorConfig`] per-reactor declaration (label, command, concurrency, conditions)
//!
//! ## Sentinel values
//! - `Config::hostname = None` → detected once at startup (`hostname -s`, fallback `"unknown"`)
//! - `Config::health_addr = None` → no health endpoint
//! - `ReactorConfig::concurrent` defaults to 1 and must be >= 1

use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use crate::reactors::MatchRule;

/// Global configuration for the supervisor runtime.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum time to wait for reactor workers to finish after shutdown
    /// is requested. Exceeding it returns
    /// [`RuntimeError::GraceExceeded`](crate::RuntimeError::GraceExceeded)
    /// with the labels of the reactors still running.
    pub grace: Duration,

    /// Cap on the post-shutdown wait for in-flight messages to drain from
    /// an input's pending table. A warning is logged when the cap is hit.
    pub drain_timeout: Duration,

    /// Interval between pending-table polls while draining.
    pub drain_poll: Duration,

    /// Sleep between retries after a failed queue receive call.
    pub receive_backoff: Duration,

    /// Capacity of the log stream queue. Records published while the queue
    /// is full are dropped with a warning.
    pub stream_capacity: usize,

    /// Bind address of the `/ping` health endpoint. `None` disables it.
    pub health_addr: Option<SocketAddr>,

    /// Hostname stamped on every log record. `None` → detected at startup.
    pub hostname: Option<String>,
}

impl Default for Config {
    /// Defaults:
    ///
    /// - `grace = 60s`
    /// - `drain_timeout = 120s`, `drain_poll = 1s`
    /// - `receive_backoff = 15s`
    /// - `stream_capacity = 1024`
    /// - no health endpoint, hostname auto-detected
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            drain_timeout: Duration::from_secs(120),
            drain_poll: Duration::from_secs(1),
            receive_backoff: Duration::from_secs(15),
            stream_capacity: 1024,
            health_addr: None,
            hostname: None,
        }
    }
}

impl Config {
    /// Returns the stream queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn stream_capacity_clamped(&self) -> usize {
        self.stream_capacity.max(1)
    }
}

/// Receive parameters for one queue input.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Maximum number of messages requested per receive call.
    pub max_messages: i64,
    /// Long-poll wait passed to the queue client.
    pub wait_time: Duration,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_messages: 10,
            wait_time: Duration::from_secs(20),
        }
    }
}

/// Declaration of one reactor: which messages it accepts and what it runs.
#[derive(Clone, Debug, Deserialize)]
pub struct ReactorConfig {
    /// Stable human-readable label. Unique per input; stamped on log records.
    pub label: String,
    /// Program to execute.
    pub command: String,
    /// Arguments. May contain `$msg` / `$.path` placeholders expanded
    /// against the message body at execution time.
    #[serde(default)]
    pub args: Vec<String>,
    /// Maximum concurrent executions of this reactor's command.
    #[serde(default = "default_concurrent")]
    pub concurrent: usize,
    /// Match rules over the parsed message body. Empty → accept everything.
    #[serde(default)]
    pub conditions: Vec<MatchRule>,
}

fn default_concurrent() -> usize {
    1
}
