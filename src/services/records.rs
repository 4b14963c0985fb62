//! Records handed to callers and streamed to clients
//!
//! Payloads are kept as the JSON objects GitHub returns; the enum only tags
//! what kind of entity a payload is. Serialization is untagged, so the wire
//! form of a record is the entity itself.

use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    User(Value),
    Repository(Value),
    Commit(CommitWithFiles),
    Issue(Value),
    PullRequest(Value),
    PullRequestReview(Value),
    IssueComment(Value),
    CommitComment(Value),
}

impl Record {
    /// Short kind name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Record::User(_) => "user",
            Record::Repository(_) => "repository",
            Record::Commit(_) => "commit",
            Record::Issue(_) => "issue",
            Record::PullRequest(_) => "pull_request",
            Record::PullRequestReview(_) => "pull_request_review",
            Record::IssueComment(_) => "issue_comment",
            Record::CommitComment(_) => "commit_comment",
        }
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// A commit node together with its changed files.
///
/// `files` is `None` when files were not requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitWithFiles {
    #[serde(flatten)]
    pub commit: Map<String, Value>,
    pub files: Option<Vec<Value>>,
}

impl CommitWithFiles {
    pub fn oid(&self) -> Option<&str> {
        self.commit.get("oid").and_then(Value::as_str)
    }
}
