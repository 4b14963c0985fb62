//! Domain errors and their translation from transport failures
//!
//! Transport failures are inspected once, at the point where the resource
//! being fetched is known, and turned into the closed set of kinds in
//! [`ServiceError`]. [`ErrorBody`] is the structured payload a caller sees,
//! whether in a JSON error response or in a stream's `error` event.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::github::TransportError;

const GENERIC_MESSAGE: &str = "An unexpected error occurred";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Could not find user with the login of '{login}'")]
    UserNotFound { login: String },

    #[error("Could not find repository with the name '{owner}/{name}'")]
    RepositoryNotFound { owner: String, name: String },

    #[error("No nodes property found in response. Response-Data: {response}")]
    MissingNodes { response: Value },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// The resource a transport call was fetching, used to name NOT_FOUND failures.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    User { login: &'a str },
    Repository { owner: &'a str, name: &'a str },
    Other,
}

/// Maps a transport failure to a domain error.
///
/// A structured upstream error list containing a `NOT_FOUND` entry becomes
/// the not-found error for `resource`. Everything else passes through as
/// [`ServiceError::Transport`].
pub fn translate(error: TransportError, resource: Resource<'_>) -> ServiceError {
    let not_found = error
        .graphql_errors()
        .is_some_and(|entries| entries.iter().any(|e| e.is_not_found()));

    match (not_found, resource) {
        (true, Resource::User { login }) => ServiceError::UserNotFound {
            login: login.to_string(),
        },
        (true, Resource::Repository { owner, name }) => ServiceError::RepositoryNotFound {
            owner: owner.to_string(),
            name: name.to_string(),
        },
        _ => ServiceError::Transport(error),
    }
}

/// Repository coordinates carried by a not-found payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

/// Structured error payload sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryRef>,
}

impl ErrorBody {
    fn new(status_code: u16, name: &str, message: impl Into<String>) -> Self {
        Self {
            status_code,
            name: name.to_string(),
            message: message.into(),
            login: None,
            repository: None,
        }
    }

    pub fn internal() -> Self {
        Self::new(500, "InternalServerError", GENERIC_MESSAGE)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(400, "RequestParamsValidationError", message)
    }
}

impl ServiceError {
    /// HTTP status associated with this error kind.
    pub fn status_code(&self) -> u16 {
        self.to_body().status_code
    }

    /// Builds the client-visible payload. Internal and transport failures are
    /// reported with a fixed message only.
    pub fn to_body(&self) -> ErrorBody {
        match self {
            ServiceError::InvalidInput(message) => ErrorBody::validation(message.clone()),
            ServiceError::UserNotFound { login } => ErrorBody {
                login: Some(login.clone()),
                ..ErrorBody::new(404, "NotGithubUser", self.to_string())
            },
            ServiceError::RepositoryNotFound { owner, name } => ErrorBody {
                repository: Some(RepositoryRef {
                    owner: owner.clone(),
                    name: name.clone(),
                }),
                ..ErrorBody::new(404, "RepositoryNotFound", self.to_string())
            },
            ServiceError::MissingNodes { .. }
            | ServiceError::Transport(_)
            | ServiceError::Internal(_) => ErrorBody::internal(),
        }
    }
}
