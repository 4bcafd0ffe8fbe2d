//! # Per-execution log record builder.
//!
//! [`ReactorLog`] turns the raw byte stream of one command execution into
//! JSON records, one per newline-terminated line, and drives the record
//! status machine:
//!
//! ```text
//! (pre-start) ──start()──► CMD ──(first emit)──► RUN ──done()──► END
//! ```
//!
//! ## Rules
//! - Bytes written before `start` are staged: commands can emit spawn-phase
//!   errors before the worker has a pid. The stage flushes on the first
//!   write after `start`, or on `done` if `start` was never called.
//! - Writes are a byte stream, not a line stream: partial lines accumulate,
//!   multiple lines per write emit multiple records.
//! - A trailing fragment with no terminating newline is *not* emitted as
//!   its own record; it rides along as the END record's `Output`.
//! - `Line` is emitted on every record, including line 0. Every other
//!   field is elided when zero/empty.
//! - One log belongs to one execution. The pipe readers and the worker
//!   race across `write`/`start`/`done`, so all state sits behind a mutex.
//!
//! Record state is pooled: executions are high-churn and the buffers are
//! worth recycling. [`LogPool::release`] clears every field before the
//! state is reused — a surviving field would leak one execution's metadata
//! into the next.

use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::Serialize;
use tracing::error;

use crate::error::ExecError;
use crate::logs::stream::LogStream;

/// Record status as it appears on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Status {
    /// First record of an execution; `Output` is the command line.
    #[serde(rename = "CMD")]
    Cmd,
    /// Ordinary output line.
    #[serde(rename = "RUN")]
    Run,
    /// Final record; carries `Elapse` and, on failure, `Error`.
    #[serde(rename = "END")]
    End,
}

/// Serialized shape of one record. Field order matches the wire format.
#[derive(Serialize)]
struct RecordWire<'a> {
    #[serde(rename = "Host", skip_serializing_if = "str::is_empty")]
    host: &'a str,
    #[serde(rename = "Label", skip_serializing_if = "str::is_empty")]
    label: &'a str,
    #[serde(rename = "Pid", skip_serializing_if = "is_zero_u32")]
    pid: u32,
    #[serde(rename = "RID", skip_serializing_if = "is_zero_u64")]
    rid: u64,
    #[serde(rename = "TID", skip_serializing_if = "is_zero_u64")]
    tid: u64,
    // Never elided: line 0 must appear.
    #[serde(rename = "Line")]
    line: u64,
    #[serde(rename = "Output", skip_serializing_if = "str::is_empty")]
    output: &'a str,
    #[serde(rename = "Status", skip_serializing_if = "Option::is_none")]
    status: Option<Status>,
    #[serde(rename = "Error", skip_serializing_if = "str::is_empty")]
    error: &'a str,
    #[serde(rename = "Elapse", skip_serializing_if = "is_zero_f64")]
    elapse: f64,
    #[serde(rename = "Timestamp", skip_serializing_if = "is_zero_i64")]
    timestamp: i64,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}
fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}
fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}
fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

/// Mutable record state, recycled through [`LogPool`].
#[derive(Default)]
struct RecordState {
    host: String,
    label: String,
    pid: u32,
    rid: u64,
    tid: u64,
    line: u64,
    status: Option<Status>,
    error: String,
    elapse: f64,
    timestamp: i64,
    initialized: bool,
    /// Line accumulator: bytes since the last emitted newline.
    acc: Vec<u8>,
    /// Pre-start staging buffer.
    stage: Vec<u8>,
    /// Monotonic start, for `Elapse`.
    started: Option<Instant>,
}

impl RecordState {
    fn clear(&mut self) {
        self.host.clear();
        self.label.clear();
        self.pid = 0;
        self.rid = 0;
        self.tid = 0;
        self.line = 0;
        self.status = None;
        self.error.clear();
        self.elapse = 0.0;
        self.timestamp = 0;
        self.initialized = false;
        self.acc.clear();
        self.stage.clear();
        self.started = None;
    }
}

/// Free-list of record states.
pub struct LogPool {
    free: Mutex<Vec<RecordState>>,
}

impl LogPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            free: Mutex::new(Vec::new()),
        })
    }

    fn acquire(&self) -> RecordState {
        self.free.lock().unwrap().pop().unwrap_or_default()
    }

    fn release(&self, mut state: RecordState) {
        state.clear();
        self.free.lock().unwrap().push(state);
    }

    #[cfg(test)]
    fn free_len(&self) -> usize {
        self.free.lock().unwrap().len()
    }
}

/// Log for exactly one command execution.
///
/// Created by the worker right before spawning the process; the process's
/// output pipes call [`write`](Self::write), the worker calls
/// [`start`](Self::start) and [`done`](Self::done). After `done` the state
/// returns to the pool and further calls are no-ops.
pub struct ReactorLog {
    stream: Option<Arc<dyn LogStream>>,
    pool: Arc<LogPool>,
    state: Mutex<Option<RecordState>>,
}

impl ReactorLog {
    /// Acquires a log bound to `stream` with the given execution identity.
    pub fn new(
        pool: Arc<LogPool>,
        stream: Option<Arc<dyn LogStream>>,
        host: &str,
        label: &str,
        rid: u64,
        tid: u64,
    ) -> Arc<Self> {
        let mut st = pool.acquire();
        st.host.push_str(host);
        st.label.push_str(label);
        st.rid = rid;
        st.tid = tid;
        st.started = Some(Instant::now());
        st.timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        Arc::new(Self {
            stream,
            pool,
            state: Mutex::new(Some(st)),
        })
    }

    /// Appends raw process output.
    ///
    /// Before `start`: bytes are staged. After: the stage flushes first,
    /// then each `\n` in the new bytes emits one record.
    pub fn write(&self, b: &[u8]) {
        let mut guard = self.state.lock().unwrap();
        let Some(st) = guard.as_mut() else { return };

        if !st.initialized {
            st.stage.extend_from_slice(b);
            return;
        }
        if !st.stage.is_empty() {
            let staged = std::mem::take(&mut st.stage);
            self.scan(st, &staged);
        }
        self.scan(st, b);
    }

    /// Marks the execution started: emits the CMD record carrying the
    /// command line, then switches to RUN.
    pub fn start(&self, pid: u32, cmdline: &str) {
        let mut guard = self.state.lock().unwrap();
        let Some(st) = guard.as_mut() else { return };

        st.pid = pid;
        st.initialized = true;
        st.status = Some(Status::Cmd);
        st.acc.extend_from_slice(cmdline.as_bytes());
        self.emit(st);
        st.status = Some(Status::Run);
    }

    /// Emits the END record (with `Elapse` and, on failure, `Error`) and
    /// returns the record state to the pool.
    pub fn done(&self, err: Option<&ExecError>) {
        let mut guard = self.state.lock().unwrap();
        let Some(mut st) = guard.take() else { return };

        if !st.initialized {
            // Never started: flush whatever the spawn phase produced.
            let staged = std::mem::take(&mut st.stage);
            self.scan(&mut st, &staged);
        }

        st.status = Some(Status::End);
        if let Some(e) = err {
            st.error = e.to_string();
        }
        st.elapse = st
            .started
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.emit(&mut st);

        self.pool.release(st);
    }

    /// Splits `b` on newlines: each `\n` emits the accumulator as a record.
    fn scan(&self, st: &mut RecordState, b: &[u8]) {
        for &byte in b {
            if byte == b'\n' {
                self.emit(st);
            } else {
                st.acc.push(byte);
            }
        }
    }

    /// Snapshots the accumulator into `Output`, serializes, sends, and
    /// advances the line counter. The line counter advances even with no
    /// stream attached, so record numbering stays stable.
    fn emit(&self, st: &mut RecordState) {
        let acc = std::mem::take(&mut st.acc);
        let output = String::from_utf8_lossy(&acc);
        let wire = RecordWire {
            host: &st.host,
            label: &st.label,
            pid: st.pid,
            rid: st.rid,
            tid: st.tid,
            line: st.line,
            output: output.as_ref(),
            status: st.status,
            error: &st.error,
            elapse: st.elapse,
            timestamp: st.timestamp,
        };
        match serde_json::to_vec(&wire) {
            Ok(buf) => {
                if let Some(stream) = &self.stream {
                    stream.send(Bytes::from(buf));
                }
            }
            Err(e) => error!(error = %e, "log record serialization failed, record dropped"),
        }
        st.line += 1;
    }
}
