//! Backward cursor pagination with an early stop
//!
//! Globally paginated collections (a user's issue and commit comments) cannot
//! be bounded by date on the server side. They are walked newest page first;
//! each page is filtered to the requested window and handed to the caller as
//! soon as it arrives. Once a page reaches back past the start of the window,
//! no further page is requested.

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;
use tracing::debug;

use super::date_windows::DateWindow;
use super::nodes::query_nodes;
use crate::error::{Resource, ServiceError, translate};
use crate::github::{GraphqlTransport, PageDirection, Variables, page_iterator};

/// Reads `field` of `item` as an RFC 3339 timestamp.
pub fn timestamp_of(item: &Value, field: &str) -> Option<DateTime<Utc>> {
    let raw = item.get(field)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Result of filtering one page against the window.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredPage {
    /// Items whose timestamp lies inside the window, in page order.
    pub items: Vec<Value>,
    /// Whether the page's oldest item predates the window.
    pub reaches_past_window: bool,
}

/// Filters one page of items against `window` using `field` as the timestamp.
///
/// Items without a parsable timestamp are dropped and do not count toward the
/// page's oldest item.
pub fn filter_page(items: Vec<Value>, window: &DateWindow, field: &str) -> FilteredPage {
    let oldest = items.iter().filter_map(|item| timestamp_of(item, field)).min();
    let items = items
        .into_iter()
        .filter(|item| timestamp_of(item, field).is_some_and(|t| window.contains(&t)))
        .collect();

    FilteredPage {
        items,
        reaches_past_window: oldest.is_some_and(|t| t < window.from),
    }
}

/// Lazily yields the in-window items of each page, newest page first.
///
/// The stream ends after the first page whose oldest item predates
/// `window.from`, when the connection is exhausted, or after an error.
pub fn backward_pages_in_window<'a>(
    transport: &'a dyn GraphqlTransport,
    document: &'a str,
    variables: Variables,
    window: DateWindow,
    timestamp_field: &'a str,
    resource: Resource<'a>,
) -> impl Stream<Item = Result<Vec<Value>, ServiceError>> + Send + 'a {
    let pages = page_iterator(transport, document, variables, PageDirection::Backward).boxed();

    stream::unfold(Some(pages), move |state| async move {
        let Some(mut pages) = state else {
            return None;
        };

        let page = match pages.next().await {
            None => return None,
            Some(Ok(page)) => page,
            Some(Err(e)) => return Some((Err(translate(e, resource)), None)),
        };

        let nodes = match query_nodes(&page) {
            Ok(nodes) => nodes,
            Err(e) => return Some((Err(e), None)),
        };

        let filtered = filter_page(nodes, &window, timestamp_field);
        if filtered.reaches_past_window {
            debug!("Page reaches past the window start, stopping pagination");
            return Some((Ok(filtered.items), None));
        }
        Some((Ok(filtered.items), Some(pages)))
    })
}
