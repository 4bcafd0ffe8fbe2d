//! # Log stream sinks.
//!
//! [`LogStream`] is the write-only seam between record emission and
//! whatever aggregates the records (a file, a shipper, a socket). `send`
//! must not block: workers emit from inside the record mutex.
//!
//! [`StreamWorker`] is the production decoupler: a bounded queue plus a
//! dedicated writer task driving an inner sink, so a slow sink costs
//! dropped records (with a warning), never a stalled worker.
//!
//! ```text
//! ReactorLog ──try_send──► [bounded queue] ──► writer task ──► inner sink
//!                          (full → drop + warn)    └─ panics caught
//! ```

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// Write-only sink for serialized log records, one JSON object per call.
pub trait LogStream: Send + Sync + 'static {
    /// Accepts one serialized record. Must not block.
    fn send(&self, record: Bytes);
}

/// Writes each record as one line on stdout.
pub struct StdoutStream;

impl LogStream for StdoutStream {
    fn send(&self, record: Bytes) {
        use std::io::Write;
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        let _ = out.write_all(&record);
        let _ = out.write_all(b"\n");
    }
}

/// Collects records in memory. Meant for tests and assertions.
pub struct MemoryStream {
    records: Mutex<Vec<Bytes>>,
}

impl MemoryStream {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
        })
    }

    /// Snapshot of everything received so far.
    pub fn records(&self) -> Vec<Bytes> {
        self.records.lock().unwrap().clone()
    }
}

impl LogStream for MemoryStream {
    fn send(&self, record: Bytes) {
        self.records.lock().unwrap().push(record);
    }
}

/// Bounded fan-in in front of a possibly-slow sink.
///
/// `send` is a `try_send`: when the queue is full or the writer task is
/// gone, the record is dropped and a warning logged. Panics raised by the
/// inner sink are caught inside the writer task so one bad record cannot
/// kill the stream.
pub struct StreamWorker {
    tx: Mutex<Option<mpsc::Sender<Bytes>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StreamWorker {
    /// Spawns the writer task over `inner` with the given queue capacity.
    pub fn spawn(inner: Arc<dyn LogStream>, capacity: usize) -> Arc<Self> {
        let (tx, mut rx) = mpsc::channel::<Bytes>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                let sink = Arc::clone(&inner);
                let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
                    sink.send(record)
                }));
                if res.is_err() {
                    warn!("log sink panicked; record dropped");
                }
            }
        });

        Arc::new(Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Closes the queue and waits for the writer to drain what it holds.
    /// Records sent after shutdown are dropped with a warning.
    pub async fn shutdown(&self) {
        drop(self.tx.lock().unwrap().take());
        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl LogStream for StreamWorker {
    fn send(&self, record: Bytes) {
        let guard = self.tx.lock().unwrap();
        let Some(tx) = guard.as_ref() else {
            warn!("log stream closed; record dropped");
            return;
        };
        match tx.try_send(record) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("log stream queue full; record dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("log stream closed; record dropped");
            }
        }
    }
}
