//! End-to-end pipeline scenarios: an in-memory queue feeds a supervisor
//! with real command executions, and the structured log stream plus the
//! queue's delete log are the observable outcomes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use reactvisor::{
    Config, InputConfig, MatchRule, MemoryStream, QueueClient, QueueError, ReactorConfig,
    ReceivedMessage, Supervisor,
};

/// Queue double: hands out pre-loaded messages once, then idles; records
/// every delete.
struct InMemoryQueue {
    ready: Mutex<VecDeque<ReceivedMessage>>,
    deleted: Mutex<Vec<String>>,
}

impl InMemoryQueue {
    fn with_messages(messages: Vec<ReceivedMessage>) -> Arc<Self> {
        Arc::new(Self {
            ready: Mutex::new(messages.into()),
            deleted: Mutex::new(Vec::new()),
        })
    }

    fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueClient for InMemoryQueue {
    async fn receive(
        &self,
        max: i64,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let batch: Vec<ReceivedMessage> = {
            let mut ready = self.ready.lock().unwrap();
            let take = (max.max(0) as usize).min(ready.len());
            ready.drain(..take).collect()
        };
        if batch.is_empty() {
            tokio::time::sleep(wait).await;
        }
        Ok(batch)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.deleted.lock().unwrap().push(receipt_handle.to_string());
        Ok(())
    }
}

fn message(rh: &str, body: &str) -> ReceivedMessage {
    ReceivedMessage {
        message_id: format!("id-{rh}"),
        receipt_handle: rh.into(),
        body: body.into(),
        sent_timestamp: Some("1700000000000".into()),
    }
}

fn test_config() -> Config {
    Config {
        grace: Duration::from_secs(10),
        drain_timeout: Duration::from_secs(5),
        drain_poll: Duration::from_millis(10),
        receive_backoff: Duration::from_millis(50),
        stream_capacity: 256,
        health_addr: None,
        hostname: Some("pipeline-test".into()),
    }
}

fn fast_input() -> InputConfig {
    InputConfig {
        max_messages: 10,
        wait_time: Duration::from_millis(10),
    }
}

fn sh(label: &str, script: &str, conditions: Vec<MatchRule>) -> ReactorConfig {
    ReactorConfig {
        label: label.into(),
        command: "sh".into(),
        args: vec!["-c".into(), script.into()],
        concurrent: 1,
        conditions,
    }
}

fn decoded(stream: &MemoryStream) -> Vec<Value> {
    stream
        .records()
        .iter()
        .map(|b| serde_json::from_slice(b).unwrap())
        .collect()
}

/// Polls until `cond` holds or the deadline passes.
async fn wait_for(cond: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn single_match_success_logs_and_deletes() {
    let _ = tracing_subscriber::fmt::try_init();
    let queue = InMemoryQueue::with_messages(vec![message("h1", "hello")]);
    let stream = MemoryStream::arc();

    let mut sup = Supervisor::new(test_config(), stream.clone());
    let input = sup.add_input("jobs", queue.clone(), fast_input());
    sup.add_reactor(input, sh("echoer", "echo line1; echo line2", Vec::new()))
        .unwrap();

    let stop = CancellationToken::new();
    let runner = tokio::spawn(sup.run_until(stop.clone()));

    wait_for(|| queue.deleted() == vec!["h1".to_string()]).await;
    stop.cancel();
    runner.await.unwrap().unwrap();

    let recs = decoded(&stream);
    let statuses: Vec<&str> = recs
        .iter()
        .map(|r| r["Status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["CMD", "RUN", "RUN", "END"]);
    assert_eq!(recs[1]["Output"], "line1");
    assert_eq!(recs[2]["Output"], "line2");
    assert!(recs[3].get("Error").is_none());

    // All records of one execution share identity and count up from 0.
    for (i, r) in recs.iter().enumerate() {
        assert_eq!(r["Line"].as_u64().unwrap(), i as u64);
        assert_eq!(r["RID"], recs[0]["RID"]);
        assert_eq!(r["TID"], recs[0]["TID"]);
        assert_eq!(r["Host"], "pipeline-test");
        assert_eq!(r["Label"], "echoer");
    }
}

#[tokio::test]
async fn one_failing_reactor_prevents_the_delete() {
    let queue = InMemoryQueue::with_messages(vec![message("h1", "hello")]);
    let stream = MemoryStream::arc();

    let mut sup = Supervisor::new(test_config(), stream.clone());
    let input = sup.add_input("jobs", queue.clone(), fast_input());
    sup.add_reactor(input, sh("ok", "exit 0", Vec::new())).unwrap();
    sup.add_reactor(input, sh("bad", "exit 1", Vec::new())).unwrap();

    let stop = CancellationToken::new();
    let runner = tokio::spawn(sup.run_until(stop.clone()));

    // Both reactors must report END before we stop.
    wait_for(|| {
        decoded(&stream)
            .iter()
            .filter(|r| r["Status"] == "END")
            .count()
            == 2
    })
    .await;
    stop.cancel();
    runner.await.unwrap().unwrap();

    let ends: Vec<Value> = decoded(&stream)
        .into_iter()
        .filter(|r| r["Status"] == "END")
        .collect();
    let errored = ends.iter().filter(|r| r.get("Error").is_some()).count();
    assert_eq!(errored, 1);
    assert!(
        queue.deleted().is_empty(),
        "a failed reactor must leave the message for redelivery"
    );
}

#[tokio::test]
async fn unmatched_message_deletes_without_executions() {
    let queue = InMemoryQueue::with_messages(vec![message("h1", r#"{"kind":"other"}"#)]);
    let stream = MemoryStream::arc();

    let mut sup = Supervisor::new(test_config(), stream.clone());
    let input = sup.add_input("jobs", queue.clone(), fast_input());
    sup.add_reactor(
        input,
        sh(
            "resize-only",
            "echo should-not-run",
            vec![MatchRule {
                path: "kind".into(),
                equals: Value::String("resize".into()),
            }],
        ),
    )
    .unwrap();

    let stop = CancellationToken::new();
    let runner = tokio::spawn(sup.run_until(stop.clone()));

    wait_for(|| queue.deleted() == vec!["h1".to_string()]).await;
    stop.cancel();
    runner.await.unwrap().unwrap();

    assert_eq!(queue.deleted().len(), 1, "deleted exactly once");
    assert!(
        stream.records().is_empty(),
        "no reactor ran, no records expected"
    );
}

#[tokio::test]
async fn envelope_payload_reaches_the_command() {
    let queue =
        InMemoryQueue::with_messages(vec![message("h1", r#"{"Message":"\"payload\""}"#)]);
    let stream = MemoryStream::arc();

    let mut sup = Supervisor::new(test_config(), stream.clone());
    let input = sup.add_input("jobs", queue.clone(), fast_input());
    sup.add_reactor(
        input,
        ReactorConfig {
            label: "print".into(),
            command: "echo".into(),
            args: vec!["$msg".into()],
            concurrent: 1,
            conditions: Vec::new(),
        },
    )
    .unwrap();

    let stop = CancellationToken::new();
    let runner = tokio::spawn(sup.run_until(stop.clone()));

    wait_for(|| queue.deleted() == vec!["h1".to_string()]).await;
    stop.cancel();
    runner.await.unwrap().unwrap();

    let recs = decoded(&stream);
    assert!(
        recs.iter()
            .any(|r| r["Status"] == "RUN" && r["Output"] == "payload"),
        "worker must observe the unwrapped payload: {recs:?}"
    );
}

#[tokio::test]
async fn shutdown_drains_in_flight_messages() {
    let queue = InMemoryQueue::with_messages(vec![
        message("h1", "a"),
        message("h2", "b"),
        message("h3", "c"),
    ]);
    let stream = MemoryStream::arc();

    let mut sup = Supervisor::new(test_config(), stream.clone());
    let input = sup.add_input("jobs", queue.clone(), fast_input());
    sup.add_reactor(input, sh("slow", "sleep 0.2", Vec::new())).unwrap();

    let stop = CancellationToken::new();
    let runner = tokio::spawn(sup.run_until(stop.clone()));

    // Ask for shutdown while executions are still in flight.
    tokio::time::sleep(Duration::from_millis(80)).await;
    stop.cancel();
    runner.await.unwrap().unwrap();

    // Every received message settled: three successes, three deletes.
    let mut deleted = queue.deleted();
    deleted.sort();
    assert_eq!(deleted, vec!["h1", "h2", "h3"]);
    let ends = decoded(&stream)
        .iter()
        .filter(|r| r["Status"] == "END")
        .count();
    assert_eq!(ends, 3);
}
