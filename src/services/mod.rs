//! History services
//!
//! One function per resource. Single entities are returned directly; date
//! ranged collections are produced on a spawned task and delivered through a
//! bounded channel, one [`Record`] at a time, so a caller can forward results
//! while later windows and pages are still being fetched.
//!
//! Every function takes its transport explicitly and keeps no state between
//! calls: windows, cursors and de-duplication sets live only as long as the
//! operation that created them.

pub mod records;

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, warn};

use crate::error::{Resource, Result, ServiceError, translate};
use crate::github::{GraphqlTransport, queries, variables};
use crate::history::nodes::get;
use crate::history::{
    DateWindows, EntityDeduplicator, WindowMode, WindowedQuery, backward_pages_in_window,
};
pub use records::{CommitWithFiles, Record};

/// Capacity of the channel between a producer task and its consumer.
pub const RECORD_CHANNEL_CAPACITY: usize = 16;

/// Number of commit file lists fetched at the same time.
pub const COMMIT_FILES_CONCURRENCY: usize = 8;

/// Timestamp field comments are filtered on.
pub const COMMENT_TIMESTAMP_FIELD: &str = "publishedAt";

/// Contribution lists that make up "repositories contributed to".
pub const CONTRIBUTED_TO_FIELDS: [&str; 4] = [
    "commitContributionsByRepository",
    "issueContributionsByRepository",
    "pullRequestContributionsByRepository",
    "pullRequestReviewContributionsByRepository",
];

/// Contribution lists that make up "repositories committed to".
pub const COMMITTED_TO_FIELDS: [&str; 1] = ["commitContributionsByRepository"];

/// Receiving end of a streaming operation. Finite and not restartable.
pub type RecordReceiver = mpsc::Receiver<Result<Record>>;

/// Producer-side handle used to hand records to the consumer.
#[derive(Debug, Clone)]
pub struct Emitter {
    tx: mpsc::Sender<Result<Record>>,
}

impl Emitter {
    /// Sends one record, waiting for channel capacity.
    ///
    /// Returns `false` once the consumer has gone away; the producer should
    /// then stop without reporting an error.
    pub async fn emit(&self, record: Record) -> bool {
        self.tx.send(Ok(record)).await.is_ok()
    }

    /// Whether the consumer has gone away. Checked before each upstream call
    /// so a producer whose windows or pages yield nothing still stops.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Runs `producer` on its own task and returns the receiving end of its records.
///
/// An error returned by the producer is delivered as the final item.
pub fn spawn_producer<F, Fut>(producer: F) -> RecordReceiver
where
    F: FnOnce(Emitter) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(RECORD_CHANNEL_CAPACITY);
    let task = producer(Emitter { tx: tx.clone() });

    tokio::spawn(
        async move {
            match task.await {
                Ok(()) => debug!("Producer finished"),
                Err(e) => {
                    warn!("Producer failed: {}", e);
                    if tx.send(Err(e)).await.is_err() {
                        debug!("Consumer closed before the error could be delivered");
                    }
                }
            }
        }
        .in_current_span(),
    );

    rx
}

/// Fetches a user's profile.
///
/// # Errors
///
/// - [`ServiceError::UserNotFound`] when GitHub has no such login
/// - [`ServiceError::Transport`] for any other upstream failure
pub async fn fetch_user_info(transport: &dyn GraphqlTransport, login: &str) -> Result<Value> {
    let vars = variables([("login", json!(login))]);
    let mut response = transport
        .execute(queries::USER_INFO, &vars)
        .await
        .map_err(|e| translate(e, Resource::User { login }))?;

    match response.get_mut("user").map(Value::take) {
        Some(Value::Null) | None => Err(ServiceError::Internal("User info not found".to_string())),
        Some(user) => Ok(user),
    }
}

/// Fetches one repository's details.
///
/// # Errors
///
/// - [`ServiceError::RepositoryNotFound`] carrying the attempted `owner/name`
/// - [`ServiceError::Transport`] for any other upstream failure
pub async fn fetch_repository_info(
    transport: &dyn GraphqlTransport,
    owner: &str,
    name: &str,
) -> Result<Value> {
    let vars = variables([("owner", json!(owner)), ("name", json!(name))]);
    let mut response = transport
        .execute(queries::REPOSITORY_INFO, &vars)
        .await
        .map_err(|e| translate(e, Resource::Repository { owner, name }))?;

    match response.get_mut("repository").map(Value::take) {
        Some(Value::Null) | None => Err(ServiceError::RepositoryNotFound {
            owner: owner.to_string(),
            name: name.to_string(),
        }),
        Some(repository) => Ok(repository),
    }
}

/// Streams a user's commits to one repository's default branch within `range`.
///
/// The author is resolved to its node id first, so an unknown login fails with
/// [`ServiceError::UserNotFound`] before any commit is fetched. File lists are
/// fetched concurrently for the whole history and attached to each commit.
pub fn stream_commits(
    transport: Arc<dyn GraphqlTransport>,
    login: String,
    owner: String,
    name: String,
    range: DateWindows,
    with_files: bool,
) -> RecordReceiver {
    spawn_producer(move |emitter| async move {
        if emitter.is_closed() {
            return Ok(());
        }
        let transport = transport.as_ref();
        let user = fetch_user_info(transport, &login).await?;
        let author_id = user
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::Internal("User info carries no id".to_string()))?
            .to_string();

        let Some(window) = range.whole() else {
            return Ok(());
        };

        let vars = variables([
            ("owner", json!(owner)),
            ("name", json!(name)),
            ("authorId", json!(author_id)),
        ]);
        let mut query = WindowedQuery::new(transport, queries::COMMITS, vars, WindowMode::Paginated)
            .for_resource(Resource::Repository {
                owner: &owner,
                name: &name,
            });
        if emitter.is_closed() {
            return Ok(());
        }
        let nodes = query.run_nodes(&window).await?;
        info!("Found {} commit(s) in {}/{}", nodes.len(), owner, name);
        if emitter.is_closed() {
            return Ok(());
        }

        let commits = attach_commit_files(transport, &owner, &name, nodes, with_files).await?;
        for commit in commits {
            if !emitter.emit(Record::Commit(commit)).await {
                break;
            }
        }
        Ok(())
    })
}

async fn attach_commit_files(
    transport: &dyn GraphqlTransport,
    owner: &str,
    name: &str,
    nodes: Vec<Value>,
    with_files: bool,
) -> Result<Vec<CommitWithFiles>> {
    let commits: Vec<Map<String, Value>> = nodes
        .into_iter()
        .filter_map(|node| match node {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect();

    if !with_files {
        return Ok(commits
            .into_iter()
            .map(|commit| CommitWithFiles { commit, files: None })
            .collect());
    }

    stream::iter(commits)
        .map(|commit| async move {
            let oid = commit
                .get("oid")
                .and_then(Value::as_str)
                .ok_or_else(|| ServiceError::Internal("Commit node carries no oid".to_string()))?;
            let files = transport
                .commit_files(owner, name, oid)
                .await
                .map_err(|e| translate(e, Resource::Repository { owner, name }))?;
            Ok::<_, ServiceError>(CommitWithFiles {
                commit,
                files: Some(files),
            })
        })
        .buffered(COMMIT_FILES_CONCURRENCY)
        .try_collect()
        .await
}

/// Runs a paginated contributions query over monthly windows and emits the
/// entity found under `entity_field` of every node, once per entity id.
async fn emit_windowed_contributions(
    transport: &dyn GraphqlTransport,
    document: &str,
    login: &str,
    range: DateWindows,
    entity_field: &str,
    wrap: fn(Value) -> Record,
    emitter: &Emitter,
) -> Result<()> {
    let vars = variables([("login", json!(login))]);
    let mut query = WindowedQuery::new(transport, document, vars, WindowMode::Paginated)
        .for_resource(Resource::User { login });
    let mut seen = EntityDeduplicator::new();

    for window in range.monthly() {
        if emitter.is_closed() {
            debug!("Consumer closed, skipping remaining windows");
            return Ok(());
        }
        let nodes = query.run_nodes(&window).await?;
        let entities = nodes
            .into_iter()
            .filter_map(|mut node| node.get_mut(entity_field).map(Value::take))
            .filter(|entity| !entity.is_null())
            .collect();

        for entity in seen.retain_unseen(entities, &["id"]) {
            if !emitter.emit(wrap(entity)).await {
                debug!("Consumer closed, stopping after current window");
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Streams the issues a user opened within `range`.
pub fn stream_issues(
    transport: Arc<dyn GraphqlTransport>,
    login: String,
    range: DateWindows,
) -> RecordReceiver {
    spawn_producer(move |emitter| async move {
        emit_windowed_contributions(
            transport.as_ref(),
            queries::ISSUES,
            &login,
            range,
            "issue",
            Record::Issue,
            &emitter,
        )
        .await
    })
}

/// Streams the pull requests a user opened within `range`.
pub fn stream_pull_requests(
    transport: Arc<dyn GraphqlTransport>,
    login: String,
    range: DateWindows,
) -> RecordReceiver {
    spawn_producer(move |emitter| async move {
        emit_windowed_contributions(
            transport.as_ref(),
            queries::PULL_REQUESTS,
            &login,
            range,
            "pullRequest",
            Record::PullRequest,
            &emitter,
        )
        .await
    })
}

/// Streams the pull request reviews a user submitted within `range`.
pub fn stream_pull_request_reviews(
    transport: Arc<dyn GraphqlTransport>,
    login: String,
    range: DateWindows,
) -> RecordReceiver {
    spawn_producer(move |emitter| async move {
        emit_windowed_contributions(
            transport.as_ref(),
            queries::PULL_REQUEST_REVIEWS,
            &login,
            range,
            "pullRequestReview",
            Record::PullRequestReview,
            &emitter,
        )
        .await
    })
}

async fn emit_comments_in_range(
    transport: &dyn GraphqlTransport,
    document: &str,
    login: &str,
    range: DateWindows,
    wrap: fn(Value) -> Record,
    emitter: &Emitter,
) -> Result<()> {
    let Some(window) = range.whole() else {
        return Ok(());
    };

    let vars = variables([("login", json!(login))]);
    let mut pages = pin!(backward_pages_in_window(
        transport,
        document,
        vars,
        window,
        COMMENT_TIMESTAMP_FIELD,
        Resource::User { login },
    ));

    while !emitter.is_closed() {
        let Some(page) = pages.next().await else {
            break;
        };
        for comment in page? {
            if !emitter.emit(wrap(comment)).await {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Streams a user's issue comments published within `range`, newest first.
pub fn stream_issue_comments(
    transport: Arc<dyn GraphqlTransport>,
    login: String,
    range: DateWindows,
) -> RecordReceiver {
    spawn_producer(move |emitter| async move {
        emit_comments_in_range(
            transport.as_ref(),
            queries::ISSUE_COMMENTS,
            &login,
            range,
            Record::IssueComment,
            &emitter,
        )
        .await
    })
}

/// Streams a user's commit comments published within `range`, newest first.
pub fn stream_commit_comments(
    transport: Arc<dyn GraphqlTransport>,
    login: String,
    range: DateWindows,
) -> RecordReceiver {
    spawn_producer(move |emitter| async move {
        emit_comments_in_range(
            transport.as_ref(),
            queries::COMMIT_COMMENTS,
            &login,
            range,
            Record::CommitComment,
            &emitter,
        )
        .await
    })
}

/// Collects `nameWithOwner` of every repository listed under `fields`.
fn names_with_owner(response: &Value, fields: &[&str]) -> Result<Vec<String>> {
    let collection = get(response, &["user", "contributionsCollection"])
        .filter(|c| c.is_object())
        .ok_or_else(|| {
            ServiceError::Internal("Response carries no contributionsCollection".to_string())
        })?;

    Ok(fields
        .iter()
        .filter_map(|field| collection.get(*field).and_then(Value::as_array))
        .flatten()
        .filter_map(|entry| get(entry, &["repository", "nameWithOwner"]).and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

fn split_name_with_owner(name_with_owner: &str) -> Result<(&str, &str)> {
    match name_with_owner.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Ok((owner, name)),
        _ => Err(ServiceError::Internal(format!(
            "Malformed nameWithOwner '{}'",
            name_with_owner
        ))),
    }
}

/// Emits the details of every distinct repository listed under `fields`,
/// walking monthly windows most recent first.
async fn emit_repositories(
    transport: &dyn GraphqlTransport,
    document: &str,
    fields: &[&str],
    login: &str,
    range: DateWindows,
    emitter: &Emitter,
) -> Result<()> {
    let vars = variables([("login", json!(login))]);
    let mut query = WindowedQuery::new(transport, document, vars, WindowMode::SingleShot)
        .for_resource(Resource::User { login });
    let mut seen = EntityDeduplicator::new();

    for window in range.monthly() {
        if emitter.is_closed() {
            debug!("Consumer closed, skipping remaining windows");
            return Ok(());
        }
        let response = query.run(&window).await?;
        for name_with_owner in names_with_owner(&response, fields)? {
            if !seen.first_seen(&name_with_owner) {
                continue;
            }
            if emitter.is_closed() {
                return Ok(());
            }
            let (owner, name) = split_name_with_owner(&name_with_owner)?;
            let repository = fetch_repository_info(transport, owner, name).await?;
            if !emitter.emit(Record::Repository(repository)).await {
                return Ok(());
            }
        }
    }
    info!("Emitted {} distinct repositories for {}", seen.len(), login);
    Ok(())
}

/// Streams every repository a user committed to, opened issues or pull
/// requests in, or reviewed in, within `range`. Each repository once.
pub fn stream_repositories_contributed_to(
    transport: Arc<dyn GraphqlTransport>,
    login: String,
    range: DateWindows,
) -> RecordReceiver {
    spawn_producer(move |emitter| async move {
        emit_repositories(
            transport.as_ref(),
            queries::REPOSITORIES_CONTRIBUTED_TO,
            &CONTRIBUTED_TO_FIELDS,
            &login,
            range,
            &emitter,
        )
        .await
    })
}

/// Streams every repository a user committed to within `range`. Each repository once.
pub fn stream_repositories_committed_to(
    transport: Arc<dyn GraphqlTransport>,
    login: String,
    range: DateWindows,
) -> RecordReceiver {
    spawn_producer(move |emitter| async move {
        emit_repositories(
            transport.as_ref(),
            queries::REPOSITORIES_COMMITTED_TO,
            &COMMITTED_TO_FIELDS,
            &login,
            range,
            &emitter,
        )
        .await
    })
}
