//! Cursor pagination over GraphQL connections
//!
//! Both primitives locate the connection by its `pageInfo` field, wherever the
//! query nests it, and drive the `$cursor` variable from it.

use futures::stream::{self, Stream};
use serde_json::Value;
use tracing::debug;

use super::{GraphqlTransport, TransportError, Variables};
use crate::history::nodes::{NODES_PROPERTY, find_path_to_property, get, get_mut};

/// Name of the pagination metadata field of a connection.
pub const PAGE_INFO_PROPERTY: &str = "pageInfo";

/// Name of the variable carrying the cursor between pages.
pub const CURSOR_VARIABLE: &str = "cursor";

/// Which way a connection is walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    /// `first:/after:` connections, following `endCursor` while `hasNextPage`.
    Forward,
    /// `last:/before:` connections, following `startCursor` while `hasPreviousPage`.
    Backward,
}

impl PageDirection {
    fn has_more_field(self) -> &'static str {
        match self {
            PageDirection::Forward => "hasNextPage",
            PageDirection::Backward => "hasPreviousPage",
        }
    }

    fn cursor_field(self) -> &'static str {
        match self {
            PageDirection::Forward => "endCursor",
            PageDirection::Backward => "startCursor",
        }
    }
}

fn connection_path(page: &Value) -> Result<Vec<String>, TransportError> {
    find_path_to_property(page, PAGE_INFO_PROPERTY).ok_or_else(|| {
        TransportError::Malformed(format!("No pageInfo property found in response: {}", page))
    })
}

/// Reads the cursor of the next page, or `None` when the connection is exhausted.
fn next_cursor(page: &Value, direction: PageDirection) -> Result<Option<String>, TransportError> {
    let mut path = connection_path(page)?;
    path.push(PAGE_INFO_PROPERTY.to_string());
    let page_info = get(page, &path).unwrap_or(&Value::Null);

    let has_more = page_info
        .get(direction.has_more_field())
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !has_more {
        return Ok(None);
    }

    page_info
        .get(direction.cursor_field())
        .and_then(Value::as_str)
        .map(|cursor| Some(cursor.to_string()))
        .ok_or_else(|| {
            TransportError::Malformed(format!(
                "pageInfo reports more pages but carries no {}",
                direction.cursor_field()
            ))
        })
}

/// Executes `document` repeatedly, following the forward cursor to exhaustion.
///
/// Returns the first page's response with its `nodes` collection replaced by
/// the concatenation of every page's nodes.
pub async fn paginate(
    transport: &dyn GraphqlTransport,
    document: &str,
    variables: &Variables,
) -> Result<Value, TransportError> {
    let mut variables = variables.clone();
    let mut accumulated = transport.execute(document, &variables).await?;
    let mut nodes_path = connection_path(&accumulated)?;
    nodes_path.push(NODES_PROPERTY.to_string());

    let mut cursor = next_cursor(&accumulated, PageDirection::Forward)?;
    let mut pages = 1;

    while let Some(next) = cursor {
        variables.insert(CURSOR_VARIABLE.to_string(), Value::String(next));
        let page = transport.execute(document, &variables).await?;
        pages += 1;

        let mut page_nodes_path = connection_path(&page)?;
        page_nodes_path.push(NODES_PROPERTY.to_string());
        let new_nodes = match get(&page, &page_nodes_path) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) => Vec::new(),
            _ => {
                return Err(TransportError::Malformed(format!(
                    "Page {} has no nodes collection: {}",
                    pages, page
                )));
            }
        };

        match get_mut(&mut accumulated, &nodes_path) {
            Some(Value::Array(items)) => items.extend(new_nodes),
            Some(slot) if slot.is_null() => *slot = Value::Array(new_nodes),
            _ => {
                return Err(TransportError::Malformed(
                    "First page has no nodes collection to extend".to_string(),
                ));
            }
        }

        cursor = next_cursor(&page, PageDirection::Forward)?;
    }

    debug!("Paginated query completed after {} page(s)", pages);
    Ok(accumulated)
}

/// Lazily yields one response per page, following the cursor in `direction`.
///
/// The stream ends when the connection reports no further page, or right
/// after yielding an error.
pub fn page_iterator<'a>(
    transport: &'a dyn GraphqlTransport,
    document: &'a str,
    variables: Variables,
    direction: PageDirection,
) -> impl Stream<Item = Result<Value, TransportError>> + Send + 'a {
    stream::unfold(Some(variables), move |state| async move {
        let Some(mut variables) = state else {
            return None;
        };

        let page = match transport.execute(document, &variables).await {
            Ok(page) => page,
            Err(e) => return Some((Err(e), None)),
        };

        match next_cursor(&page, direction) {
            Ok(Some(cursor)) => {
                variables.insert(CURSOR_VARIABLE.to_string(), Value::String(cursor));
                Some((Ok(page), Some(variables)))
            }
            Ok(None) => Some((Ok(page), None)),
            Err(e) => Some((Err(e), None)),
        }
    })
}
