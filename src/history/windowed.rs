//! Executing a query once per date window
//!
//! The runner owns the variable set of one logical fetch. For each window it
//! writes `fromDate`/`toDate` and issues the query, either once or following
//! the connection cursor until it is exhausted.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tracing::debug;

use super::date_windows::DateWindow;
use super::nodes::query_nodes;
use crate::error::{Resource, ServiceError, translate};
use crate::github::{GraphqlTransport, Variables, paginate};

pub const FROM_DATE_VARIABLE: &str = "fromDate";
pub const TO_DATE_VARIABLE: &str = "toDate";

/// Whether a windowed query follows the connection cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    /// One request per window.
    SingleShot,
    /// Follow `pageInfo` until exhaustion, concatenating every page's nodes.
    Paginated,
}

/// Formats an instant the way GitHub's `DateTime`/`GitTimestamp` scalars expect.
pub fn format_timestamp(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub struct WindowedQuery<'a> {
    transport: &'a dyn GraphqlTransport,
    document: &'a str,
    variables: Variables,
    mode: WindowMode,
    resource: Resource<'a>,
}

impl<'a> WindowedQuery<'a> {
    pub fn new(
        transport: &'a dyn GraphqlTransport,
        document: &'a str,
        variables: Variables,
        mode: WindowMode,
    ) -> Self {
        Self {
            transport,
            document,
            variables,
            mode,
            resource: Resource::Other,
        }
    }

    /// Names the entity whose NOT_FOUND errors should be translated.
    pub fn for_resource(mut self, resource: Resource<'a>) -> Self {
        self.resource = resource;
        self
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Runs the query for `window` and returns the raw (possibly concatenated) response.
    ///
    /// An inverted window is a caller error and fails before any request is made.
    pub async fn run(&mut self, window: &DateWindow) -> Result<Value, ServiceError> {
        if window.from > window.to {
            return Err(ServiceError::InvalidInput(format!(
                "fromDate {} is greater than toDate {}",
                format_timestamp(&window.from),
                format_timestamp(&window.to)
            )));
        }

        self.variables.insert(
            FROM_DATE_VARIABLE.to_string(),
            Value::String(format_timestamp(&window.from)),
        );
        self.variables.insert(
            TO_DATE_VARIABLE.to_string(),
            Value::String(format_timestamp(&window.to)),
        );

        debug!(
            "Querying window {} .. {} ({:?})",
            format_timestamp(&window.from),
            format_timestamp(&window.to),
            self.mode
        );

        let response = match self.mode {
            WindowMode::SingleShot => self.transport.execute(self.document, &self.variables).await,
            WindowMode::Paginated => paginate(self.transport, self.document, &self.variables).await,
        };
        response.map_err(|e| translate(e, self.resource))
    }

    /// Runs the query for `window` and extracts its `nodes` collection.
    pub async fn run_nodes(&mut self, window: &DateWindow) -> Result<Vec<Value>, ServiceError> {
        let response = self.run(window).await?;
        query_nodes(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp_keeps_millis() {
        let instant = DateTime::parse_from_rfc3339("2023-01-01T23:59:59.999Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(&instant), "2023-01-01T23:59:59.999Z");
    }
}
