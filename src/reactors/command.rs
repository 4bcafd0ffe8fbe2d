//! # Command spec: what a reactor executes.
//!
//! Holds the program and argument template, expands placeholders against
//! the message at execution time, and spawns the process with piped
//! stdout/stderr. The spawner inherits the parent environment and never
//! expands the program name itself.
//!
//! ## Placeholders
//! Whole-argument only:
//! - `$msg`   → the full (unwrapped) message body
//! - `$.a.b`  → the value at that JSON path in the body; strings are
//!   inserted unquoted, other values JSON-encoded, unresolvable paths
//!   expand to the empty string.

use std::process::Stdio;

use serde_json::Value;
use tokio::process::{Child, Command};

use crate::error::ExecError;
use crate::queue::Message;
use crate::reactors::condition::lookup;

/// Program + argument template of one reactor.
#[derive(Clone, Debug)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
}

/// A successfully spawned process.
#[derive(Debug)]
pub struct SpawnedChild {
    pub child: Child,
    pub pid: u32,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Resolves the argument template against a message.
    pub fn expand_args(&self, msg: &Message) -> Vec<String> {
        let body_json = msg.body_json();
        self.args
            .iter()
            .map(|arg| expand_one(arg, msg, body_json.as_ref()))
            .collect()
    }

    /// Human-readable command line for the CMD log record.
    pub fn cmdline(&self, args: &[String]) -> String {
        if args.is_empty() {
            return self.program.clone();
        }
        let mut s = self.program.clone();
        for a in args {
            s.push(' ');
            s.push_str(a);
        }
        s
    }

    /// Spawns the process: stdin null, stdout/stderr piped, parent
    /// environment inherited.
    pub fn spawn(&self, args: &[String]) -> Result<SpawnedChild, ExecError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        let child = cmd.spawn().map_err(|e| ExecError::Spawn {
            reason: e.to_string(),
        })?;
        let pid = child.id().ok_or_else(|| ExecError::Spawn {
            reason: "no process id after spawn".to_string(),
        })?;

        Ok(SpawnedChild { child, pid })
    }
}

fn expand_one(arg: &str, msg: &Message, body_json: Option<&Value>) -> String {
    if arg == "$msg" {
        return msg.body_text().into_owned();
    }
    if let Some(path) = arg.strip_prefix("$.") {
        let Some(found) = body_json.and_then(|b| lookup(b, path)) else {
            return String::new();
        };
        return match found {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    }
    arg.to_string()
}
