//! Production GitHub transport
//!
//! GraphQL queries are posted with reqwest; the REST commit endpoint goes
//! through octocrab, configured with the same token.

use async_trait::async_trait;
use octocrab::Octocrab;
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use super::{GraphqlErrorEntry, GraphqlTransport, TransportError, Variables};

/// Default GitHub GraphQL endpoint
pub const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// Default GitHub REST API base
pub const DEFAULT_REST_BASE_URL: &str = "https://api.github.com";

const USER_AGENT: &str = "githistory/0.1.0 (https://github.com/tacogips/githistory)";

/// GitHub client backing the [`GraphqlTransport`] trait.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    rest: Octocrab,
    graphql_url: Url,
    github_token: Option<String>,
}

impl GithubClient {
    /// Creates a client against the public GitHub endpoints.
    pub fn new(github_token: Option<String>) -> Result<Self, String> {
        let graphql_url = Url::parse(DEFAULT_GRAPHQL_URL)
            .map_err(|e| format!("Invalid GraphQL URL: {}", e))?;
        let rest_base_url = Url::parse(DEFAULT_REST_BASE_URL)
            .map_err(|e| format!("Invalid REST base URL: {}", e))?;
        Self::with_endpoints(github_token, graphql_url, rest_base_url)
    }

    /// Creates a client against custom endpoints (GitHub Enterprise, test servers).
    pub fn with_endpoints(
        github_token: Option<String>,
        graphql_url: Url,
        rest_base_url: Url,
    ) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        let mut builder = Octocrab::builder()
            .base_uri(rest_base_url.as_str())
            .map_err(|e| format!("Invalid REST base URL: {}", e))?;
        if let Some(token) = &github_token {
            builder = builder.personal_token(token.clone());
        }
        let rest = builder
            .build()
            .map_err(|e| format!("Failed to create octocrab client: {}", e))?;

        Ok(Self {
            http,
            rest,
            graphql_url,
            github_token,
        })
    }

    /// Splits a GraphQL response body into its `data` member or its error list.
    fn into_data(mut body: Value) -> Result<Value, TransportError> {
        if let Some(errors) = body.get("errors").filter(|e| !e.is_null()) {
            let entries: Vec<GraphqlErrorEntry> = serde_json::from_value(errors.clone())
                .map_err(|e| TransportError::Malformed(format!("Invalid errors array: {}", e)))?;
            if !entries.is_empty() {
                return Err(TransportError::GraphQl(entries));
            }
        }

        match body.get_mut("data").map(Value::take) {
            Some(Value::Null) | None => Err(TransportError::Malformed(
                "Missing data in GraphQL response".to_string(),
            )),
            Some(data) => Ok(data),
        }
    }
}

#[async_trait]
impl GraphqlTransport for GithubClient {
    async fn execute(
        &self,
        document: &str,
        variables: &Variables,
    ) -> Result<Value, TransportError> {
        let payload = json!({
            "query": document,
            "variables": variables,
        });

        let mut request = self.http.post(self.graphql_url.clone()).json(&payload);
        if let Some(token) = &self.github_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("GraphQL request failed with status {}", status);
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        Self::into_data(body)
    }

    async fn commit_files(
        &self,
        owner: &str,
        name: &str,
        oid: &str,
    ) -> Result<Vec<Value>, TransportError> {
        let route = format!("/repos/{}/{}/commits/{}", owner, name, oid);
        debug!("Fetching commit files from {}", route);

        let commit: Value = self.rest.get(route, None::<&()>).await?;

        match commit.get("files") {
            Some(Value::Array(files)) => Ok(files.clone()),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(TransportError::Malformed(format!(
                "Unexpected commit files value: {}",
                other
            ))),
        }
    }
}
