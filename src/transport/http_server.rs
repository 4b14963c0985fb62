//! HTTP surface
//!
//! Single entities are served as JSON. Date-ranged collections are served as
//! server-sent event streams: each request spawns the service's producer and
//! a [`StreamPublisher`] that pumps its records into the response body.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, error, info, info_span};
use url::Url;
use uuid::Uuid;

use super::sse_stream::{FRAME_BUFFER, StreamPublisher};
use crate::config::Config;
use crate::error::{ErrorBody, ServiceError};
use crate::github::{GithubClient, GraphqlTransport};
use crate::history::DateWindows;
use crate::services::{self, RecordReceiver};

static LOGIN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9-]{1,39}$").expect("login pattern is valid"));

/// Shared state of the router. Holds nothing request-scoped.
#[derive(Clone)]
pub struct AppState {
    pub transport: Arc<dyn GraphqlTransport>,
    pub heartbeat_interval: Duration,
}

impl AppState {
    pub fn new(transport: Arc<dyn GraphqlTransport>, heartbeat_interval: Duration) -> Self {
        Self {
            transport,
            heartbeat_interval,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let body = self.to_body();
        if body.status_code >= 500 {
            error!("Request failed: {}", self);
        }
        error_response(body)
    }
}

fn error_response(body: ErrorBody) -> Response {
    let status = StatusCode::from_u16(body.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}

fn validate_login(login: &str) -> Result<(), ServiceError> {
    if LOGIN_PATTERN.is_match(login) {
        Ok(())
    } else {
        Err(ServiceError::InvalidInput(format!(
            "login '{}' must be 1 to 39 letters, digits or hyphens",
            login
        )))
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn parse_date(field: &str, raw: &str) -> Result<DateTime<Utc>, ServiceError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!("{} '{}' must be an ISO 8601 date", field, raw))
        })
}

fn validate_range(
    login: &str,
    from_date: &str,
    to_date: &str,
) -> Result<DateWindows, ServiceError> {
    validate_login(login)?;
    let from = parse_date("fromDate", from_date)?;
    let to = parse_date("toDate", to_date)?;
    Ok(DateWindows::between(from, to))
}

fn event_stream_response(frames: mpsc::Receiver<super::sse_stream::Frame>) -> Response {
    let mut response = Body::from_stream(ReceiverStream::new(frames)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}

/// Starts a producer and its publisher inside a request span and returns the
/// streaming response.
fn open_stream<F>(state: &AppState, resource: &'static str, start: F) -> Response
where
    F: FnOnce(Arc<dyn GraphqlTransport>) -> RecordReceiver,
{
    let request_id = Uuid::new_v4();
    let span = info_span!("stream", %request_id, resource);
    let records = span.in_scope(|| {
        info!("Opening stream");
        start(state.transport.clone())
    });

    let (frames_tx, frames_rx) = mpsc::channel(FRAME_BUFFER);
    let publisher = StreamPublisher::new(frames_tx, state.heartbeat_interval);
    tokio::spawn(
        async move {
            publisher.run(records).await;
        }
        .instrument(span),
    );

    event_stream_response(frames_rx)
}

async fn user_info(State(state): State<AppState>, Path(login): Path<String>) -> Response {
    if let Err(e) = validate_login(&login) {
        return e.into_response();
    }
    match services::fetch_user_info(state.transport.as_ref(), &login).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn repository_info(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
) -> Response {
    match services::fetch_repository_info(state.transport.as_ref(), &owner, &name).await {
        Ok(repository) => Json(repository).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn commits(
    State(state): State<AppState>,
    Path((login, owner, name, from_date, to_date)): Path<(String, String, String, String, String)>,
) -> Response {
    let range = match validate_range(&login, &from_date, &to_date) {
        Ok(range) => range,
        Err(e) => return e.into_response(),
    };
    open_stream(&state, "commits", |transport| {
        services::stream_commits(transport, login, owner, name, range, true)
    })
}

type RangedStart = fn(Arc<dyn GraphqlTransport>, String, DateWindows) -> RecordReceiver;

/// Handler body shared by every `/api/user/{login}/.../from/{fromDate}/to/{toDate}` route.
fn ranged(
    state: &AppState,
    resource: &'static str,
    (login, from_date, to_date): (String, String, String),
    start: RangedStart,
) -> Response {
    let range = match validate_range(&login, &from_date, &to_date) {
        Ok(range) => range,
        Err(e) => return e.into_response(),
    };
    open_stream(state, resource, |transport| start(transport, login, range))
}

async fn issues(State(state): State<AppState>, Path(params): Path<(String, String, String)>) -> Response {
    ranged(&state, "issues", params, services::stream_issues)
}

async fn pull_requests(
    State(state): State<AppState>,
    Path(params): Path<(String, String, String)>,
) -> Response {
    ranged(&state, "pull_requests", params, services::stream_pull_requests)
}

async fn pull_request_reviews(
    State(state): State<AppState>,
    Path(params): Path<(String, String, String)>,
) -> Response {
    ranged(
        &state,
        "pull_request_reviews",
        params,
        services::stream_pull_request_reviews,
    )
}

async fn issue_comments(
    State(state): State<AppState>,
    Path(params): Path<(String, String, String)>,
) -> Response {
    ranged(&state, "issue_comments", params, services::stream_issue_comments)
}

async fn commit_comments(
    State(state): State<AppState>,
    Path(params): Path<(String, String, String)>,
) -> Response {
    ranged(&state, "commit_comments", params, services::stream_commit_comments)
}

async fn repositories_contributed_to(
    State(state): State<AppState>,
    Path(params): Path<(String, String, String)>,
) -> Response {
    ranged(
        &state,
        "repositories_contributed_to",
        params,
        services::stream_repositories_contributed_to,
    )
}

async fn repositories_committed_to(
    State(state): State<AppState>,
    Path(params): Path<(String, String, String)>,
) -> Response {
    ranged(
        &state,
        "repositories_committed_to",
        params,
        services::stream_repositories_committed_to,
    )
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/user/{login}", get(user_info))
        .route("/api/repository/{owner}/{name}", get(repository_info))
        .route(
            "/api/user/{login}/contributions/commits/{owner}/{name}/from/{from_date}/to/{to_date}",
            get(commits),
        )
        .route(
            "/api/user/{login}/contributions/issues/from/{from_date}/to/{to_date}",
            get(issues),
        )
        .route(
            "/api/user/{login}/contributions/pull-requests/from/{from_date}/to/{to_date}",
            get(pull_requests),
        )
        .route(
            "/api/user/{login}/contributions/pull-request-reviews/from/{from_date}/to/{to_date}",
            get(pull_request_reviews),
        )
        .route(
            "/api/user/{login}/contributions/issue-comments/from/{from_date}/to/{to_date}",
            get(issue_comments),
        )
        .route(
            "/api/user/{login}/contributions/commit-comments/from/{from_date}/to/{to_date}",
            get(commit_comments),
        )
        .route(
            "/api/user/{login}/repositories/contributed-to/from/{from_date}/to/{to_date}",
            get(repositories_contributed_to),
        )
        .route(
            "/api/user/{login}/repositories/committed-to/from/{from_date}/to/{to_date}",
            get(repositories_committed_to),
        )
        .with_state(state)
}

pub struct HttpServerApp {
    config: Config,
}

impl HttpServerApp {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    pub async fn serve(self) -> Result<()> {
        let graphql_url = Url::parse(&self.config.graphql_url)?;
        let rest_base_url = Url::parse(&self.config.rest_base_url)?;
        let client = GithubClient::with_endpoints(
            self.config.github_token.clone(),
            graphql_url,
            rest_base_url,
        )
        .map_err(anyhow::Error::msg)?;

        let state = AppState::new(Arc::new(client), self.config.heartbeat_interval);
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        info!("Listening on {}", listener.local_addr()?);

        axum::serve(listener, router(state))
            .with_graceful_shutdown(async {
                // Wait for Ctrl+C signal to gracefully shutdown
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
            })
            .await?;

        info!("Server stopped");
        Ok(())
    }
}
