//! # Supervisor: owns the runtime and drives one start/stop cycle.
//!
//! Construction collects inputs (queue subscriptions) and reactors;
//! [`Supervisor::run`] wires everything together, serves until a
//! termination signal, then shuts the pipeline down back-to-front.
//!
//! ## Shutdown timeline
//! ```text
//! signal → dispatchers stop polling, drain pendings (cap: drain_timeout)
//!        → reactor inboxes close (registry entries dropped)
//!        → workers finish in-flight processes (cap: grace)
//!        │     └─ overrun → RuntimeError::GraceExceeded { stuck labels }
//!        → health endpoint stops
//!        → log stream closes (writer drains its queue)
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Config, InputConfig, ReactorConfig};
use crate::core::shutdown;
use crate::dispatch::InputDispatcher;
use crate::error::RuntimeError;
use crate::health::{HealthServer, HealthView};
use crate::logs::{LogPool, LogStream, StreamWorker};
use crate::queue::{Message, QueueClient};
use crate::reactors::{Completion, Reactor, ReactorWorker};

/// Handle to one registered input, returned by [`Supervisor::add_input`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputId(usize);

/// A reactor waiting for `run()` to build its worker.
struct WorkerSeed {
    input: usize,
    reactor: Arc<Reactor>,
    inbox: mpsc::Receiver<Arc<Message>>,
}

/// Wires queue inputs to reactors and supervises the whole pipeline.
pub struct Supervisor {
    cfg: Config,
    sink: Arc<dyn LogStream>,
    inputs: Vec<Arc<InputDispatcher>>,
    labels: Vec<HashSet<String>>,
    seeds: Vec<WorkerSeed>,
    reactors: Vec<Arc<Reactor>>,
    next_rid: u64,
}

impl Supervisor {
    /// Creates a supervisor that forwards log records into `sink`.
    pub fn new(cfg: Config, sink: Arc<dyn LogStream>) -> Self {
        Self {
            cfg,
            sink,
            inputs: Vec::new(),
            labels: Vec::new(),
            seeds: Vec::new(),
            reactors: Vec::new(),
            next_rid: 0,
        }
    }

    /// Declares one queue subscription.
    pub fn add_input(
        &mut self,
        name: impl Into<String>,
        queue: Arc<dyn QueueClient>,
        input_cfg: InputConfig,
    ) -> InputId {
        let dispatcher = InputDispatcher::new(name, queue, self.cfg.clone(), input_cfg);
        self.inputs.push(dispatcher);
        self.labels.push(HashSet::new());
        InputId(self.inputs.len() - 1)
    }

    /// Declares one reactor on `input`. The reactor is registered with the
    /// input's dispatcher immediately; its worker starts in [`run`](Self::run).
    pub fn add_reactor(
        &mut self,
        input: InputId,
        cfg: ReactorConfig,
    ) -> Result<(), RuntimeError> {
        let InputId(idx) = input;
        self.next_rid += 1;
        let reactor = Reactor::new(self.next_rid, cfg)?;
        if !self.labels[idx].insert(reactor.label().to_string()) {
            return Err(RuntimeError::ReactorExists {
                label: reactor.label().to_string(),
            });
        }
        let (tx, rx) = mpsc::channel(reactor.concurrent());

        self.inputs[idx].register(Arc::clone(&reactor), tx);
        self.reactors.push(Arc::clone(&reactor));
        self.seeds.push(WorkerSeed {
            input: idx,
            reactor,
            inbox: rx,
        });
        Ok(())
    }

    /// Runs until an OS termination signal, then shuts down gracefully.
    pub async fn run(self) -> Result<(), RuntimeError> {
        let token = CancellationToken::new();
        let signal_token = token.clone();
        tokio::spawn(async move {
            match shutdown::wait_for_termination().await {
                Ok(()) => info!("termination signal received"),
                Err(e) => warn!(error = %e, "signal listener failed; shutting down"),
            }
            signal_token.cancel();
        });
        self.run_until(token).await
    }

    /// Runs until `stop` is cancelled. Exposed for embeddings that manage
    /// their own shutdown condition.
    pub async fn run_until(mut self, stop: CancellationToken) -> Result<(), RuntimeError> {
        let hostname = resolve_hostname(&self.cfg);
        let stream = StreamWorker::spawn(
            Arc::clone(&self.sink),
            self.cfg.stream_capacity_clamped(),
        );
        let pool = LogPool::new();

        let mut worker_handles: Vec<(String, JoinHandle<()>)> = Vec::new();
        let seeds = std::mem::take(&mut self.seeds);
        for seed in seeds {
            let completion: Arc<dyn Completion> =
                Arc::clone(&self.inputs[seed.input]) as Arc<dyn Completion>;
            let label = seed.reactor.label().to_string();
            let worker = ReactorWorker::new(
                seed.reactor,
                seed.inbox,
                completion,
                Arc::clone(&pool),
                Some(Arc::clone(&stream) as Arc<dyn LogStream>),
                hostname.clone(),
            );
            worker_handles.push((label, tokio::spawn(worker.run())));
        }

        let input_handles: Vec<JoinHandle<()>> =
            self.inputs.iter().map(|d| Arc::clone(d).spawn()).collect();

        let health = match self.cfg.health_addr {
            Some(addr) => Some(HealthServer::start(
                addr,
                HealthView::new(self.reactors.clone()),
            )?),
            None => None,
        };

        info!(
            inputs = self.inputs.len(),
            reactors = self.reactors.len(),
            "runtime started"
        );
        stop.cancelled().await;

        // Stop polling; each loop drains its pendings before exiting.
        for dispatcher in &self.inputs {
            dispatcher.stop();
        }
        for handle in input_handles {
            let _ = handle.await;
        }

        // Close inboxes; workers finish in-flight processes.
        for dispatcher in &self.inputs {
            dispatcher.close_reactors();
        }
        let result = wait_workers(self.cfg.grace, &mut worker_handles).await;

        if let Some(health) = health {
            health.stop().await;
        }
        stream.shutdown().await;
        info!("runtime stopped");
        result
    }
}

/// Awaits every worker up to `grace`; overrun reports the stuck labels.
async fn wait_workers(
    grace: std::time::Duration,
    handles: &mut [(String, JoinHandle<()>)],
) -> Result<(), RuntimeError> {
    let all = join_all(handles.iter_mut().map(|(_, h)| h));
    match timeout(grace, all).await {
        Ok(_) => Ok(()),
        Err(_) => {
            let stuck: Vec<String> = handles
                .iter()
                .filter(|(_, h)| !h.is_finished())
                .map(|(label, _)| label.clone())
                .collect();
            warn!(?stuck, "grace period exceeded");
            Err(RuntimeError::GraceExceeded { grace, stuck })
        }
    }
}

/// Config override first, then `hostname -s`, then `"unknown"`.
fn resolve_hostname(cfg: &Config) -> String {
    if let Some(h) = &cfg.hostname {
        return h.clone();
    }
    std::process::Command::new("hostname")
        .arg("-s")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
