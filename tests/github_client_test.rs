//! Tests for the GitHub client against a local mock server
//!
//! These tests verify that the client:
//! 1. Posts GraphQL documents with variables and the bearer token
//! 2. Surfaces GraphQL error lists as structured transport errors
//! 3. Reads commit file lists from the REST API

use mockito::{Matcher, Server};
use serde_json::json;
use url::Url;

use githistory::ServiceError;
use githistory::github::{GithubClient, GraphqlTransport, TransportError, queries, variables};
use githistory::services;

fn client_for(server: &Server) -> GithubClient {
    let graphql_url = Url::parse(&format!("{}/graphql", server.url())).unwrap();
    let rest_base_url = Url::parse(&server.url()).unwrap();
    GithubClient::with_endpoints(Some("test-token".to_string()), graphql_url, rest_base_url)
        .expect("Failed to create GithubClient")
}

#[tokio::test]
async fn test_execute_posts_query_and_variables() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/graphql")
        .match_header("authorization", "Bearer test-token")
        .match_body(Matcher::PartialJson(json!({
            "variables": { "login": "octocat" }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data":{"user":{"id":"U_1","login":"octocat"}}}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let data = client
        .execute(queries::USER_INFO, &variables([("login", json!("octocat"))]))
        .await
        .unwrap();

    assert_eq!(data, json!({ "user": { "id": "U_1", "login": "octocat" } }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_execute_surfaces_graphql_errors() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/graphql")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "data": { "repository": null },
                "errors": [{
                    "type": "NOT_FOUND",
                    "path": ["repository"],
                    "message": "Could not resolve to a Repository with the name 'octo/missing'."
                }]
            }"#,
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .execute(queries::REPOSITORY_INFO, &variables([("owner", json!("octo"))]))
        .await
        .unwrap_err();

    let entries = err.graphql_errors().expect("expected a GraphQL error list");
    assert_eq!(entries.len(), 1);
    assert!(entries[0].is_not_found());
}

/// A nonexistent repository rejects with the attempted owner/name.
#[tokio::test]
async fn test_repository_not_found_end_to_end() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/graphql")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"data":{"repository":null},"errors":[{"type":"NOT_FOUND","path":["repository"],"message":"not found"}]}"#,
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let err = services::fetch_repository_info(&client, "octo", "missing")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::RepositoryNotFound { ref owner, ref name } if owner == "octo" && name == "missing"
    ));
}

#[tokio::test]
async fn test_execute_reports_http_status() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/graphql")
        .with_status(401)
        .with_body(r#"{"message":"Bad credentials"}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .execute(queries::USER_INFO, &variables([("login", json!("octocat"))]))
        .await
        .unwrap_err();

    match err {
        TransportError::Status { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("Bad credentials"));
        }
        other => panic!("Expected Status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_execute_rejects_missing_data() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/graphql")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data":null}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .execute(queries::USER_INFO, &variables([("login", json!("octocat"))]))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Malformed(_)));
}

#[tokio::test]
async fn test_commit_files_reads_rest_commit() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/repos/octo/repo/commits/abc123")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "sha": "abc123",
                "files": [
                    { "filename": "src/lib.rs", "additions": 3, "deletions": 1 },
                    { "filename": "README.md", "additions": 1, "deletions": 0 }
                ]
            }"#,
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let files = client.commit_files("octo", "repo", "abc123").await.unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["filename"], "src/lib.rs");
    mock.assert_async().await;
}
