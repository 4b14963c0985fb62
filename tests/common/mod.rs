//! In-memory GitHub transport for integration tests
//!
//! Responses are produced by a closure over the query document and variables,
//! and every call is recorded so tests can assert on what was requested.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use githistory::github::{
    GraphqlErrorEntry, GraphqlTransport, NOT_FOUND_ERROR_TYPE, TransportError, Variables,
};

type Responder = dyn Fn(&str, &Variables) -> Result<Value, TransportError> + Send + Sync;
type FilesResponder = dyn Fn(&str, &str, &str) -> Result<Vec<Value>, TransportError> + Send + Sync;

#[derive(Debug, Clone)]
pub struct Call {
    pub document: String,
    pub variables: Variables,
}

impl Call {
    pub fn var(&self, name: &str) -> Option<&str> {
        self.variables.get(name).and_then(Value::as_str)
    }
}

pub struct FakeTransport {
    responder: Box<Responder>,
    files: Box<FilesResponder>,
    calls: Mutex<Vec<Call>>,
    file_calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &Variables) -> Result<Value, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            files: Box::new(|_, _, _| Ok(Vec::new())),
            calls: Mutex::new(Vec::new()),
            file_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_files<F>(mut self, files: F) -> Self
    where
        F: Fn(&str, &str, &str) -> Result<Vec<Value>, TransportError> + Send + Sync + 'static,
    {
        self.files = Box::new(files);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls whose document is exactly `document`.
    pub fn calls_to(&self, document: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.document == document)
            .collect()
    }

    pub fn file_calls(&self) -> Vec<String> {
        self.file_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GraphqlTransport for FakeTransport {
    async fn execute(
        &self,
        document: &str,
        variables: &Variables,
    ) -> Result<Value, TransportError> {
        self.calls.lock().unwrap().push(Call {
            document: document.to_string(),
            variables: variables.clone(),
        });
        (self.responder)(document, variables)
    }

    async fn commit_files(
        &self,
        owner: &str,
        name: &str,
        oid: &str,
    ) -> Result<Vec<Value>, TransportError> {
        self.file_calls.lock().unwrap().push(oid.to_string());
        (self.files)(owner, name, oid)
    }
}

/// Upstream error list with a single NOT_FOUND entry.
pub fn not_found(field: &str) -> TransportError {
    TransportError::GraphQl(vec![GraphqlErrorEntry {
        error_type: Some(NOT_FOUND_ERROR_TYPE.to_string()),
        message: format!("Could not resolve to a node for '{}'.", field),
        path: vec![json!(field)],
    }])
}

/// A forward-paginated connection page.
pub fn forward_page(nodes: Vec<Value>, end_cursor: Option<&str>) -> Value {
    json!({
        "totalCount": nodes.len(),
        "pageInfo": {
            "endCursor": end_cursor,
            "hasNextPage": end_cursor.is_some(),
        },
        "nodes": nodes,
    })
}

/// A backward-paginated connection page.
pub fn backward_page(nodes: Vec<Value>, start_cursor: Option<&str>) -> Value {
    json!({
        "totalCount": nodes.len(),
        "pageInfo": {
            "startCursor": start_cursor,
            "hasPreviousPage": start_cursor.is_some(),
        },
        "nodes": nodes,
    })
}

/// Wraps a connection the way the contributions queries nest it.
pub fn contributions(field: &str, connection: Value) -> Value {
    let mut collection = serde_json::Map::new();
    collection.insert(field.to_string(), connection);
    json!({
        "user": {
            "login": "octocat",
            "contributionsCollection": collection
        }
    })
}

pub fn user_info(login: &str) -> Value {
    json!({ "user": { "id": format!("U_{}", login), "login": login, "name": "Mona" } })
}

pub fn repository_info(owner: &str, name: &str) -> Value {
    json!({
        "repository": {
            "owner": { "login": owner },
            "name": name,
            "nameWithOwner": format!("{}/{}", owner, name),
            "id": format!("R_{}_{}", owner, name),
        }
    })
}

/// Drains a record receiver, splitting successes from the terminal error.
pub async fn drain(
    mut records: githistory::services::RecordReceiver,
) -> (Vec<Value>, Option<githistory::ServiceError>) {
    let mut values = Vec::new();
    while let Some(next) = records.recv().await {
        match next {
            Ok(record) => values.push(record.to_json().unwrap()),
            Err(e) => return (values, Some(e)),
        }
    }
    (values, None)
}
