//! GitHub API transport
//!
//! This module defines the seam between the history pipeline and the remote
//! platform. Everything above it talks to a [`GraphqlTransport`], which exposes
//! a single-query primitive plus the REST call needed for commit file lists.
//! Auto-pagination and page iteration are built on top of the single-query
//! primitive in [`pagination`], so test doubles only need to script responses.

pub mod client;
pub mod pagination;
pub mod queries;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use client::GithubClient;
pub use pagination::{PageDirection, page_iterator, paginate};

/// GraphQL variables sent alongside a query document.
pub type Variables = Map<String, Value>;

/// Error type discriminator GitHub uses for unresolvable entities.
pub const NOT_FOUND_ERROR_TYPE: &str = "NOT_FOUND";

/// One entry of the `errors` array of a GraphQL response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlErrorEntry {
    /// Machine readable discriminator (e.g. `NOT_FOUND`). Not every error carries one.
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,

    /// Human readable message
    #[serde(default)]
    pub message: String,

    /// Path of the field that failed to resolve
    #[serde(default)]
    pub path: Vec<Value>,
}

impl GraphqlErrorEntry {
    pub fn is_not_found(&self) -> bool {
        self.error_type.as_deref() == Some(NOT_FOUND_ERROR_TYPE)
    }
}

/// Failures surfaced by the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("GraphQL query errors: {}", join_messages(.0))]
    GraphQl(Vec<GraphqlErrorEntry>),

    #[error("GraphQL request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("GitHub REST API error: {0}")]
    Api(#[from] octocrab::Error),

    #[error("Malformed GitHub response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Returns the structured upstream error list, when the failure carries one.
    pub fn graphql_errors(&self) -> Option<&[GraphqlErrorEntry]> {
        match self {
            TransportError::GraphQl(errors) => Some(errors),
            _ => None,
        }
    }
}

fn join_messages(errors: &[GraphqlErrorEntry]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Single-call access to the platform.
///
/// Implementations own authentication, and retry/backoff if they do any.
#[async_trait]
pub trait GraphqlTransport: Send + Sync {
    /// Executes one GraphQL query and returns the `data` member of the response.
    async fn execute(&self, document: &str, variables: &Variables)
    -> Result<Value, TransportError>;

    /// Fetches the changed-file list of a single commit.
    async fn commit_files(
        &self,
        owner: &str,
        name: &str,
        oid: &str,
    ) -> Result<Vec<Value>, TransportError>;
}

/// Builds a variable map from `(name, value)` pairs.
pub fn variables<I, K>(pairs: I) -> Variables
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_graphql_error_entry_parses_type() {
        let entry: GraphqlErrorEntry = serde_json::from_value(json!({
            "type": "NOT_FOUND",
            "path": ["repository"],
            "message": "Could not resolve to a Repository with the name 'a/b'."
        }))
        .unwrap();

        assert!(entry.is_not_found());
        assert_eq!(entry.path, vec![json!("repository")]);
    }

    #[test]
    fn test_graphql_error_entry_without_type() {
        let entry: GraphqlErrorEntry =
            serde_json::from_value(json!({ "message": "Something went wrong" })).unwrap();
        assert!(!entry.is_not_found());
    }

    #[test]
    fn test_transport_error_display_joins_messages() {
        let err = TransportError::GraphQl(vec![
            GraphqlErrorEntry {
                error_type: None,
                message: "first".to_string(),
                path: vec![],
            },
            GraphqlErrorEntry {
                error_type: None,
                message: "second".to_string(),
                path: vec![],
            },
        ]);
        assert_eq!(err.to_string(), "GraphQL query errors: first, second");
    }
}
