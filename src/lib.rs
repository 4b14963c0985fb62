//! GitHub history service
//!
//! Fetches a user's activity on GitHub (commits, issues, pull requests,
//! reviews, comments and the repositories they contributed to) over long
//! date ranges, and streams it to clients as server-sent events.
//!
//! ## How a request is served
//!
//! GitHub's GraphQL `contributionsCollection` accepts ranges of at most one
//! year and every connection is paginated. A ranged request is therefore:
//!
//! 1. split into calendar-aligned windows, most recent first ([`history::date_windows`])
//! 2. run once per window, following page cursors where needed ([`history::windowed`])
//! 3. reduced to the `nodes` of each response wherever they sit ([`history::nodes`])
//! 4. de-duplicated across windows ([`history::dedup`])
//!
//! Comment collections cannot be bounded server-side; they are paged backward
//! and cut off once a page predates the range ([`history::cutoff`]).
//!
//! Results are produced on a background task and written to the client as
//! they arrive by a [`transport::StreamPublisher`], interleaved with heartbeats.
//!
//! ## Authentication
//!
//! A GitHub token is read from `--github-token` or the `GITHUB_TOKEN`
//! environment variable. Unauthenticated access works for the REST commit
//! endpoint only; GitHub's GraphQL API requires a token.
//!
//! ```bash
//! export GITHUB_TOKEN=your_github_token
//! githistory serve --address 0.0.0.0:5000
//! ```
//!
//! ## Using the services directly
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use githistory::github::GithubClient;
//! use githistory::history::DateWindows;
//! use githistory::services;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(GithubClient::new(std::env::var("GITHUB_TOKEN").ok())?);
//! let range = DateWindows::between(
//!     "2023-01-01T00:00:00Z".parse()?,
//!     "2023-12-31T00:00:00Z".parse()?,
//! );
//! let mut issues = services::stream_issues(client, "octocat".to_string(), range);
//! while let Some(issue) = issues.recv().await {
//!     println!("{}", issue?.to_json()?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod github;
pub mod history;
pub mod services;
pub mod transport;

pub use config::Config;
pub use error::{ErrorBody, ServiceError};
