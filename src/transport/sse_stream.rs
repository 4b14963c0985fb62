//! Server-sent event publishing
//!
//! A [`StreamPublisher`] owns the write side of one client connection. It
//! forwards records from a producer as `success` events, reports a producer
//! failure as a single `error` event, and keeps the connection alive with
//! `heartbeat` events. Records, ticks and the connection-close signal are
//! handled in one loop, so frames are never written concurrently.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Bytes;
use serde_json::Value;
use strum::Display;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{ErrorBody, ServiceError};
use crate::services::RecordReceiver;

/// Number of encoded frames buffered between the publisher and the response body.
pub const FRAME_BUFFER: usize = 8;

pub const SUCCESS_EVENT: &str = "success";
pub const ERROR_EVENT: &str = "error";
pub const HEARTBEAT_EVENT: &str = "heartbeat";

/// One encoded event as consumed by the response body.
pub type Frame = Result<Bytes, Infallible>;

/// Frame sink for a single connection.
pub type FrameSender = mpsc::Sender<Frame>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PublisherState {
    Initialized,
    Open,
    Closed,
}

/// How a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StreamOutcome {
    /// The producer finished without error.
    Completed,
    /// The producer failed and an error event was written.
    Failed,
    /// The client went away first. Not an error.
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub outcome: StreamOutcome,
    pub records_sent: usize,
    pub heartbeats_sent: usize,
}

fn frame(event: &str, data: Option<&str>) -> Bytes {
    match data {
        Some(data) => Bytes::from(format!("event: {}\ndata: {}\n\n", event, data)),
        None => Bytes::from(format!("event: {}\n\n", event)),
    }
}

pub fn success_frame(record: &Value) -> Bytes {
    frame(SUCCESS_EVENT, Some(&record.to_string()))
}

pub fn error_frame(body: &ErrorBody) -> Bytes {
    let data = serde_json::to_string(body).unwrap_or_else(|_| {
        r#"{"statusCode":500,"name":"InternalServerError","message":"An unexpected error occurred"}"#
            .to_string()
    });
    frame(ERROR_EVENT, Some(&data))
}

pub fn heartbeat_frame() -> Bytes {
    frame(HEARTBEAT_EVENT, None)
}

/// Client-visible payload for a failed stream. Details of internal failures
/// are logged here and never sent.
fn error_body(e: &ServiceError) -> ErrorBody {
    let body = e.to_body();
    if body.status_code >= 500 {
        error!("Stream failed: {}", e);
    } else {
        warn!("Stream failed: {}", e);
    }
    body
}

/// Signals that the client connection is gone.
struct Disconnected;

pub struct StreamPublisher {
    sink: FrameSender,
    heartbeat_interval: Duration,
    state: PublisherState,
    records_sent: usize,
    heartbeats_sent: usize,
}

impl StreamPublisher {
    pub fn new(sink: FrameSender, heartbeat_interval: Duration) -> Self {
        Self {
            sink,
            heartbeat_interval,
            state: PublisherState::Initialized,
            records_sent: 0,
            heartbeats_sent: 0,
        }
    }

    pub fn state(&self) -> PublisherState {
        self.state
    }

    fn transition(&mut self, next: PublisherState) {
        debug!("Stream state {} -> {}", self.state, next);
        self.state = next;
    }

    async fn write(&self, bytes: Bytes) -> Result<(), Disconnected> {
        self.sink.send(Ok(bytes)).await.map_err(|_| Disconnected)
    }

    async fn heartbeat(&mut self) -> Result<(), Disconnected> {
        self.write(heartbeat_frame()).await?;
        self.heartbeats_sent += 1;
        Ok(())
    }

    /// Writes one success event per record, unrolling arrays.
    async fn publish(&mut self, record: Value) -> Result<(), Disconnected> {
        match record {
            Value::Array(items) => {
                for item in items {
                    self.write(success_frame(&item)).await?;
                    self.records_sent += 1;
                }
            }
            single => {
                self.write(success_frame(&single)).await?;
                self.records_sent += 1;
            }
        }
        Ok(())
    }

    fn finish(&mut self, outcome: StreamOutcome) -> StreamSummary {
        self.transition(PublisherState::Closed);
        if outcome == StreamOutcome::Disconnected {
            warn!("Client disconnected after {} record(s)", self.records_sent);
        }
        info!(
            "Stream closed: {} ({} record(s), {} heartbeat(s))",
            outcome, self.records_sent, self.heartbeats_sent
        );
        StreamSummary {
            outcome,
            records_sent: self.records_sent,
            heartbeats_sent: self.heartbeats_sent,
        }
    }

    /// Drives the stream until the producer finishes, fails, or the client leaves.
    ///
    /// Dropping `records` on return tells the producer to stop.
    pub async fn run(mut self, mut records: RecordReceiver) -> StreamSummary {
        self.transition(PublisherState::Open);
        if self.heartbeat().await.is_err() {
            return self.finish(StreamOutcome::Disconnected);
        }

        let mut ticker = time::interval_at(
            Instant::now() + self.heartbeat_interval,
            self.heartbeat_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let sink = self.sink.clone();
            tokio::select! {
                biased;

                _ = sink.closed() => {
                    return self.finish(StreamOutcome::Disconnected);
                }

                next = records.recv() => match next {
                    None => return self.finish(StreamOutcome::Completed),
                    Some(Ok(record)) => {
                        let written = match record.to_json() {
                            Ok(value) => self.publish(value).await,
                            Err(e) => {
                                let failure = ServiceError::Internal(format!(
                                    "Failed to serialize {} record: {}",
                                    record.kind(),
                                    e
                                ));
                                return self.fail(&failure).await;
                            }
                        };
                        if written.is_err() {
                            return self.finish(StreamOutcome::Disconnected);
                        }
                    }
                    Some(Err(e)) => return self.fail(&e).await,
                },

                _ = ticker.tick() => {
                    if self.heartbeat().await.is_err() {
                        return self.finish(StreamOutcome::Disconnected);
                    }
                }
            }
        }
    }

    async fn fail(&mut self, e: &ServiceError) -> StreamSummary {
        let body = error_body(e);
        if self.write(error_frame(&body)).await.is_err() {
            return self.finish(StreamOutcome::Disconnected);
        }
        self.finish(StreamOutcome::Failed)
    }
}
