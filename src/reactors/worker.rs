//! # ReactorWorker: the per-reactor run loop.
//!
//! Consumes messages from the reactor's inbox and executes the configured
//! command for each, at most `concurrent` at a time.
//!
//! ```text
//! inbox.recv()
//!   ├─► acquire per-reactor permit (cap = concurrent)
//!   └─► spawn execution task:
//!         ├─ acquire ReactorLog (rid, fresh tid, host, label)
//!         ├─ expand args, spawn process
//!         │     └─ spawn failure → log.done(err), report failure
//!         ├─ log.start(pid, cmdline)
//!         ├─ pump stdout & stderr → log.write
//!         ├─ wait exit (non-zero / signal → error)
//!         ├─ log.done(..), stamp last_success / last_error
//!         └─ completion.done(msg, ok)
//! ```
//!
//! ## Rules
//! - The permit is held for the whole execution, so at most `concurrent`
//!   processes of this reactor run simultaneously.
//! - Both pipes feed one shared log; each pipe's bytes arrive in order,
//!   interleaving across pipes is unspecified.
//! - The END record is emitted only after both pipes are drained.
//! - Shutdown: the loop ends when the inbox closes; in-flight processes
//!   run to completion and are awaited before the worker returns. The
//!   supervisor's grace period bounds the total wait.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::ExecError;
use crate::logs::{LogPool, LogStream, ReactorLog};
use crate::queue::Message;
use crate::reactors::reactor::Reactor;

/// Receives execution outcomes; implemented by the input dispatcher.
#[async_trait]
pub trait Completion: Send + Sync + 'static {
    /// One reactor finished with `msg`; `ok` is false on spawn failure,
    /// non-zero exit, or signal kill.
    async fn done(&self, msg: &Arc<Message>, ok: bool);
}

/// Per-reactor run loop. Owns the inbox receiver.
pub struct ReactorWorker {
    reactor: Arc<Reactor>,
    inbox: mpsc::Receiver<Arc<Message>>,
    completion: Arc<dyn Completion>,
    pool: Arc<LogPool>,
    stream: Option<Arc<dyn LogStream>>,
    hostname: String,
}

impl ReactorWorker {
    pub fn new(
        reactor: Arc<Reactor>,
        inbox: mpsc::Receiver<Arc<Message>>,
        completion: Arc<dyn Completion>,
        pool: Arc<LogPool>,
        stream: Option<Arc<dyn LogStream>>,
        hostname: String,
    ) -> Self {
        Self {
            reactor,
            inbox,
            completion,
            pool,
            stream,
            hostname,
        }
    }

    /// Runs until the inbox closes, then drains in-flight executions.
    pub async fn run(mut self) {
        let gate = Arc::new(Semaphore::new(self.reactor.concurrent()));
        let mut running = JoinSet::new();

        while let Some(msg) = self.inbox.recv().await {
            let Ok(permit) = gate.clone().acquire_owned().await else {
                break;
            };

            let exec = Execution {
                reactor: Arc::clone(&self.reactor),
                completion: Arc::clone(&self.completion),
                pool: Arc::clone(&self.pool),
                stream: self.stream.clone(),
                hostname: self.hostname.clone(),
            };
            running.spawn(async move {
                exec.run(msg).await;
                drop(permit);
            });

            // Reap whatever already finished; keeps the set small.
            while running.try_join_next().is_some() {}
        }

        debug!(reactor = self.reactor.label(), "inbox closed, draining executions");
        while running.join_next().await.is_some() {}
    }
}

/// Everything one execution task needs, cloned out of the worker.
struct Execution {
    reactor: Arc<Reactor>,
    completion: Arc<dyn Completion>,
    pool: Arc<LogPool>,
    stream: Option<Arc<dyn LogStream>>,
    hostname: String,
}

impl Execution {
    async fn run(self, msg: Arc<Message>) {
        let tid = self.reactor.next_tid();
        let log = ReactorLog::new(
            Arc::clone(&self.pool),
            self.stream.clone(),
            &self.hostname,
            self.reactor.label(),
            self.reactor.rid(),
            tid,
        );

        let ok = self.execute(&msg, &log).await;
        if ok {
            self.reactor.mark_success();
        } else {
            self.reactor.mark_error();
        }
        self.completion.done(&msg, ok).await;
    }

    async fn execute(&self, msg: &Message, log: &Arc<ReactorLog>) -> bool {
        let command = self.reactor.command();
        let args = command.expand_args(msg);

        let mut spawned = match command.spawn(&args) {
            Ok(s) => s,
            Err(e) => {
                log.done(Some(&e));
                return false;
            }
        };
        log.start(spawned.pid, &command.cmdline(&args));

        let stdout = spawned.child.stdout.take();
        let stderr = spawned.child.stderr.take();
        let out_pump = spawn_pump(stdout, Arc::clone(log));
        let err_pump = spawn_pump(stderr, Arc::clone(log));

        let status = spawned.child.wait().await;
        let _ = tokio::join!(out_pump, err_pump);

        match status {
            Ok(s) if s.success() => {
                log.done(None);
                true
            }
            Ok(s) => {
                let err = match s.code() {
                    Some(code) => ExecError::NonZeroExit { code },
                    None => ExecError::Killed,
                };
                log.done(Some(&err));
                false
            }
            Err(e) => {
                log.done(Some(&ExecError::Pipe {
                    reason: e.to_string(),
                }));
                false
            }
        }
    }
}

/// Forwards one pipe into the log, chunk by chunk, until EOF.
fn spawn_pump<R>(reader: Option<R>, log: Arc<ReactorLog>) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut reader) = reader else { return };
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => log.write(&buf[..n]),
            }
        }
    })
}
