//! Tests for publishing record streams as server-sent events
//!
//! These tests run a StreamPublisher against in-memory channels and verify:
//! 1. Framing of success, error and heartbeat events
//! 2. Exactly one error event on failure, then close
//! 3. Client disconnection ends the stream quietly and stops the producer

use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::timeout;

use githistory::ServiceError;
use githistory::services::Record;
use githistory::transport::sse_stream::{Frame, StreamOutcome, StreamPublisher};

const LONG_HEARTBEAT: Duration = Duration::from_secs(3600);
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Parsed form of one event frame.
#[derive(Debug, Clone, PartialEq)]
struct Event {
    name: String,
    data: Option<Value>,
}

fn parse(frame: Frame) -> Event {
    let bytes = frame.unwrap();
    let text = std::str::from_utf8(&bytes).unwrap();
    assert!(text.ends_with("\n\n"), "Frame must end with a blank line: {:?}", text);

    let mut lines = text.trim_end_matches('\n').lines();
    let name = lines
        .next()
        .and_then(|l| l.strip_prefix("event: "))
        .expect("Frame must start with an event line")
        .to_string();
    let data = lines
        .next()
        .map(|l| serde_json::from_str(l.strip_prefix("data: ").unwrap()).unwrap());
    assert!(lines.next().is_none(), "Unexpected extra line in {:?}", text);
    Event { name, data }
}

async fn collect(mut frames: mpsc::Receiver<Frame>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(frame) = timeout(TEST_TIMEOUT, frames.recv()).await.unwrap() {
        events.push(parse(frame));
    }
    events
}

fn issue(id: usize) -> Record {
    Record::Issue(json!({ "id": format!("I_{}", id) }))
}

#[tokio::test]
async fn test_completed_stream_has_no_error_event() {
    let (records_tx, records_rx) = mpsc::channel(16);
    let (frames_tx, frames_rx) = mpsc::channel(16);

    for id in 0..3 {
        records_tx.send(Ok(issue(id))).await.unwrap();
    }
    drop(records_tx);

    let summary = StreamPublisher::new(frames_tx, LONG_HEARTBEAT)
        .run(records_rx)
        .await;
    assert_eq!(summary.outcome, StreamOutcome::Completed);
    assert_eq!(summary.records_sent, 3);

    let events = collect(frames_rx).await;
    assert_eq!(events[0].name, "heartbeat");
    assert_eq!(events[0].data, None);

    let successes: Vec<&Event> = events.iter().filter(|e| e.name == "success").collect();
    assert_eq!(successes.len(), 3);
    assert_eq!(successes[0].data, Some(json!({ "id": "I_0" })));
    assert!(events.iter().all(|e| e.name != "error"));
}

#[tokio::test]
async fn test_failure_emits_one_error_event_and_closes() {
    let (records_tx, records_rx) = mpsc::channel(16);
    let (frames_tx, frames_rx) = mpsc::channel(16);

    records_tx.send(Ok(issue(1))).await.unwrap();
    records_tx
        .send(Err(ServiceError::UserNotFound {
            login: "ghost".to_string(),
        }))
        .await
        .unwrap();

    let summary = StreamPublisher::new(frames_tx, LONG_HEARTBEAT)
        .run(records_rx)
        .await;
    assert_eq!(summary.outcome, StreamOutcome::Failed);
    assert_eq!(summary.records_sent, 1);

    // The publisher stopped listening to the producer
    assert!(records_tx.is_closed());

    let events = collect(frames_rx).await;
    let names: Vec<&str> = events.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["heartbeat", "success", "error"]);

    let payload = events[2].data.clone().unwrap();
    assert_eq!(payload["statusCode"], 404);
    assert_eq!(payload["name"], "NotGithubUser");
    assert_eq!(
        payload["message"],
        "Could not find user with the login of 'ghost'"
    );
}

#[tokio::test]
async fn test_internal_failure_details_are_not_sent() {
    let (records_tx, records_rx) = mpsc::channel(16);
    let (frames_tx, frames_rx) = mpsc::channel(16);

    records_tx
        .send(Err(ServiceError::Internal("secret upstream detail".to_string())))
        .await
        .unwrap();

    StreamPublisher::new(frames_tx, LONG_HEARTBEAT)
        .run(records_rx)
        .await;

    let events = collect(frames_rx).await;
    let error = events.iter().find(|e| e.name == "error").unwrap();
    assert_eq!(
        error.data,
        Some(json!({
            "statusCode": 500,
            "name": "InternalServerError",
            "message": "An unexpected error occurred"
        }))
    );
}

#[tokio::test]
async fn test_array_records_are_unrolled() {
    let (records_tx, records_rx) = mpsc::channel(16);
    let (frames_tx, frames_rx) = mpsc::channel(16);

    records_tx
        .send(Ok(Record::IssueComment(json!([
            { "id": "C_1" },
            { "id": "C_2" },
            { "id": "C_3" }
        ]))))
        .await
        .unwrap();
    drop(records_tx);

    let summary = StreamPublisher::new(frames_tx, LONG_HEARTBEAT)
        .run(records_rx)
        .await;
    assert_eq!(summary.records_sent, 3);

    let data: Vec<Value> = collect(frames_rx)
        .await
        .into_iter()
        .filter(|e| e.name == "success")
        .filter_map(|e| e.data)
        .collect();
    assert_eq!(
        data,
        vec![json!({ "id": "C_1" }), json!({ "id": "C_2" }), json!({ "id": "C_3" })]
    );
}

#[tokio::test]
async fn test_heartbeats_repeat_while_idle() {
    let (records_tx, records_rx) = mpsc::channel(16);
    let (frames_tx, mut frames_rx) = mpsc::channel(16);

    let publisher = tokio::spawn(
        StreamPublisher::new(frames_tx, Duration::from_millis(20)).run(records_rx),
    );

    for _ in 0..3 {
        let frame = timeout(TEST_TIMEOUT, frames_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(parse(frame).name, "heartbeat");
    }

    drop(records_tx);
    let summary = timeout(TEST_TIMEOUT, publisher).await.unwrap().unwrap();
    assert_eq!(summary.outcome, StreamOutcome::Completed);
    assert!(summary.heartbeats_sent >= 3);
}

/// A client leaving after 2 of 10 records closes the stream without an error
/// event, stops heartbeats and releases the producer.
#[tokio::test]
async fn test_client_disconnect_mid_stream() {
    let (records_tx, records_rx) = mpsc::channel(16);
    let (frames_tx, mut frames_rx) = mpsc::channel(1);

    for id in 0..10 {
        records_tx.send(Ok(issue(id))).await.unwrap();
    }

    let publisher = tokio::spawn(StreamPublisher::new(frames_tx, LONG_HEARTBEAT).run(records_rx));

    let mut received = Vec::new();
    while received.iter().filter(|e: &&Event| e.name == "success").count() < 2 {
        let frame = timeout(TEST_TIMEOUT, frames_rx.recv())
            .await
            .unwrap()
            .expect("stream closed early");
        received.push(parse(frame));
    }
    drop(frames_rx);

    let summary = timeout(TEST_TIMEOUT, publisher).await.unwrap().unwrap();
    assert_eq!(summary.outcome, StreamOutcome::Disconnected);
    assert!(summary.records_sent < 10);
    assert_eq!(summary.heartbeats_sent, 1);

    assert!(received.iter().all(|e| e.name != "error"));
    assert!(records_tx.is_closed(), "Producer side should observe the close");
}
