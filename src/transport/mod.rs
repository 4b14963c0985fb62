pub mod http_server;
pub mod sse_stream;

pub use http_server::{AppState, HttpServerApp, router};
pub use sse_stream::{StreamOutcome, StreamPublisher, StreamSummary};
