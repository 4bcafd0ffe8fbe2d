//! # InputDispatcher: receive loop, fan-out, pending tracking, ack.
//!
//! One dispatcher owns one queue subscription and decides the fate of
//! every delivery it receives:
//!
//! ```text
//! receive loop (one task)
//!   └─ deliver(raw):
//!        ├─ build Message (envelope unwrap)
//!        ├─ snapshot reactors; for each match:
//!        │    ├─ pendings[rh] += 1
//!        │    ├─ acquire hand-off permit (dynamic budget)
//!        │    └─ spawn: inbox.send(msg) → release permit
//!        │         └─ inbox closed → done(msg, false)
//!        └─ zero matches → delete immediately
//!
//! done(msg, ok)  (called by workers)
//!   ├─ pendings[rh] -= 1;  !ok → errored.insert(rh)
//!   └─ count hits 0 → forget rh; delete iff never errored
//! ```
//!
//! ## Rules
//! - `ReceiptHandle` is the identity for all bookkeeping. A duplicate
//!   receive of an in-flight handle just bumps the refcount, so
//!   redeliveries before ack are safe.
//! - The pendings lock is never held across an await or a queue call;
//!   deletes run in their own task.
//! - Receive errors back off and retry; they never mark messages errored
//!   (nothing was delivered).
//! - Delete errors are logged and dropped — the provider's visibility
//!   timeout redelivers.
//! - The hand-off budget equals the sum of reactor concurrency
//!   (floored at 1), recomputed on every register/deregister. A full
//!   reactor inbox therefore stalls at most its own share of hand-off
//!   tasks, not the receive loop.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Config, InputConfig};
use crate::dispatch::semaphore::DynamicSemaphore;
use crate::queue::{Message, QueueClient, ReceivedMessage};
use crate::reactors::{Completion, Reactor};

/// A registered reactor: the shared declaration plus its inbox sender.
/// Dropping the entry closes the inbox once in-flight hand-offs finish.
struct ReactorEntry {
    reactor: Arc<Reactor>,
    tx: mpsc::Sender<Arc<Message>>,
}

/// Refcounts and error marks for in-flight deliveries.
#[derive(Default)]
struct AckState {
    pendings: HashMap<String, usize>,
    errored: HashSet<String>,
}

/// Fan-out and acknowledgement engine for one queue subscription.
pub struct InputDispatcher {
    name: String,
    queue: Arc<dyn QueueClient>,
    cfg: Config,
    input: InputConfig,
    reactors: DashMap<u64, ReactorEntry>,
    state: Mutex<AckState>,
    handoff: Arc<DynamicSemaphore>,
    exit: CancellationToken,
}

impl InputDispatcher {
    pub fn new(
        name: impl Into<String>,
        queue: Arc<dyn QueueClient>,
        cfg: Config,
        input: InputConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            queue,
            cfg,
            input,
            reactors: DashMap::new(),
            state: Mutex::new(AckState::default()),
            handoff: DynamicSemaphore::new(1),
            exit: CancellationToken::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a reactor and recomputes the hand-off budget.
    pub fn register(&self, reactor: Arc<Reactor>, tx: mpsc::Sender<Arc<Message>>) {
        self.reactors
            .insert(reactor.rid(), ReactorEntry { reactor, tx });
        self.update_concurrency();
    }

    /// Removes a reactor (closing its inbox) and recomputes the budget.
    pub fn deregister(&self, rid: u64) {
        self.reactors.remove(&rid);
        self.update_concurrency();
    }

    /// Recomputes the hand-off limit: the sum of reactor concurrency,
    /// floored at 1. The only place the limit changes.
    fn update_concurrency(&self) {
        let total: usize = self
            .reactors
            .iter()
            .map(|e| e.reactor.concurrent())
            .sum();
        let limit = total.max(1);
        self.handoff.set_limit(limit);
        info!(input = %self.name, total, limit, "hand-off concurrency updated");
    }

    /// Current hand-off limit (visible for tests and diagnostics).
    pub fn handoff_limit(&self) -> usize {
        self.handoff.limit()
    }

    /// Number of deliveries still awaiting outcomes.
    pub fn pending_count(&self) -> usize {
        self.state.lock().unwrap().pendings.len()
    }

    /// Requests shutdown: the receive loop stops polling and drains.
    pub fn stop(&self) {
        self.exit.cancel();
    }

    /// Drops every reactor entry, closing all inboxes.
    pub fn close_reactors(&self) {
        self.reactors.clear();
    }

    /// Spawns the receive loop. The returned handle completes after the
    /// post-shutdown drain.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self: Arc<Self>) {
        info!(input = %self.name, "input started");
        loop {
            if self.exit.is_cancelled() {
                self.drain().await;
                break;
            }

            match self
                .queue
                .receive(self.input.max_messages, self.input.wait_time)
                .await
            {
                Ok(batch) => {
                    for raw in batch {
                        Arc::clone(&self).deliver(raw).await;
                    }
                }
                Err(e) => {
                    error!(input = %self.name, error = %e, "receive failed, backing off");
                    tokio::select! {
                        _ = tokio::time::sleep(self.cfg.receive_backoff) => {}
                        _ = self.exit.cancelled() => {}
                    }
                }
            }
        }
        info!(input = %self.name, "input stopped");
    }

    /// Fans one raw delivery out to every matching reactor.
    pub async fn deliver(self: Arc<Self>, raw: ReceivedMessage) {
        let msg = Message::from_received(Arc::clone(&self.queue), raw);

        let snapshot: Vec<(Arc<Reactor>, mpsc::Sender<Arc<Message>>)> = self
            .reactors
            .iter()
            .map(|e| (Arc::clone(&e.reactor), e.tx.clone()))
            .collect();

        let mut matched = 0usize;
        for (reactor, tx) in snapshot {
            if !reactor.match_conditions(&msg) {
                continue;
            }
            matched += 1;
            self.add_pending(msg.receipt_handle());

            // The permit caps how many hand-offs can sit waiting on full
            // inboxes; a slow reactor stalls its own share, not the loop.
            let Ok(permit) = self.handoff.acquire().await else {
                self.done(&msg, false).await;
                continue;
            };

            let me = Arc::clone(&self);
            let m = Arc::clone(&msg);
            tokio::spawn(async move {
                if tx.send(Arc::clone(&m)).await.is_err() {
                    // Inbox closed under us: the reactor is gone.
                    // Settle the reference as a failed completion.
                    me.done(&m, false).await;
                }
                drop(permit);
            });
        }

        if matched == 0 {
            debug!(input = %self.name, id = msg.message_id(), "no reactor matched, deleting");
            if let Err(e) = msg.ack().await {
                warn!(input = %self.name, error = %e, "delete failed; message will redeliver");
            }
        }
    }

    fn add_pending(&self, receipt_handle: &str) {
        let mut st = self.state.lock().unwrap();
        *st.pendings.entry(receipt_handle.to_string()).or_insert(0) += 1;
    }

    /// Settles one reactor's outcome for a delivery; fires the delete when
    /// the last reference drains clean.
    pub async fn done(&self, msg: &Arc<Message>, ok: bool) {
        let delete = {
            let mut st = self.state.lock().unwrap();
            let rh = msg.receipt_handle();
            let Some(count_ref) = st.pendings.get_mut(rh) else {
                // Unknown handle: never delivered by us, ignore.
                return;
            };
            *count_ref = count_ref.saturating_sub(1);
            let count = *count_ref;
            if !ok {
                st.errored.insert(rh.to_string());
            }
            if count == 0 {
                st.pendings.remove(rh);
                let had_error = st.errored.remove(rh);
                !had_error
            } else {
                false
            }
        };

        if delete {
            let m = Arc::clone(msg);
            let name = self.name.clone();
            tokio::spawn(async move {
                if let Err(e) = m.ack().await {
                    warn!(input = %name, error = %e, "delete failed; message will redeliver");
                }
            });
        }
    }

    /// Waits for in-flight deliveries to settle, polling once per
    /// `drain_poll` up to `drain_timeout`.
    async fn drain(&self) {
        let mut waited = std::time::Duration::ZERO;
        loop {
            let pending = self.pending_count();
            if pending == 0 {
                return;
            }
            if waited >= self.cfg.drain_timeout {
                warn!(input = %self.name, pending, "drain timeout; abandoning wait");
                return;
            }
            tokio::time::sleep(self.cfg.drain_poll).await;
            waited += self.cfg.drain_poll;
        }
    }
}

#[async_trait]
impl Completion for InputDispatcher {
    async fn done(&self, msg: &Arc<Message>, ok: bool) {
        InputDispatcher::done(self, msg, ok).await
    }
}
