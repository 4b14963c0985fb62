//! Locating paginated `nodes` collections inside GraphQL responses
//!
//! Every query nests its paginated collection at a different depth
//! (`user.contributionsCollection.issueContributions.nodes`,
//! `repository.defaultBranchRef.target.history.nodes`, ...). Rather than
//! declaring each path statically, the path is discovered by a depth-first
//! search over the response tree.

use serde_json::Value;

use crate::error::ServiceError;

/// Name of the field holding the items of a paginated connection.
pub const NODES_PROPERTY: &str = "nodes";

/// Subtrees deeper than this are not searched.
pub const MAX_SEARCH_DEPTH: usize = 32;

/// Finds the path to the object that carries `property`.
///
/// The search is depth first: an object is checked for the property before
/// any of its children, and children are visited in response order. Only objects
/// are descended into; arrays and scalars are skipped.
///
/// Returns `Some(vec![])` when the root itself carries the property and
/// `None` when it is absent everywhere.
pub fn find_path_to_property(value: &Value, property: &str) -> Option<Vec<String>> {
    let mut path = Vec::new();
    if search(value, property, &mut path, 0) {
        Some(path)
    } else {
        None
    }
}

fn search(value: &Value, property: &str, path: &mut Vec<String>, depth: usize) -> bool {
    let Value::Object(map) = value else {
        return false;
    };
    if map.contains_key(property) {
        return true;
    }
    if depth >= MAX_SEARCH_DEPTH {
        return false;
    }

    for (key, child) in map {
        if !child.is_object() {
            continue;
        }
        path.push(key.clone());
        if search(child, property, path, depth + 1) {
            return true;
        }
        path.pop();
    }
    false
}

/// Walks `path` from `value`. Array elements are addressed by decimal index.
pub fn get<'a, S: AsRef<str>>(value: &'a Value, path: &[S]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| match current {
        Value::Object(map) => map.get(key.as_ref()),
        Value::Array(items) => key.as_ref().parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Mutable counterpart of [`get`].
pub fn get_mut<'a, S: AsRef<str>>(value: &'a mut Value, path: &[S]) -> Option<&'a mut Value> {
    path.iter().try_fold(value, |current, key| match current {
        Value::Object(map) => map.get_mut(key.as_ref()),
        Value::Array(items) => key
            .as_ref()
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    })
}

/// Path to the `nodes` collection itself (parent path plus `nodes`).
pub fn nodes_path(envelope: &Value) -> Option<Vec<String>> {
    find_path_to_property(envelope, NODES_PROPERTY).map(|mut path| {
        path.push(NODES_PROPERTY.to_string());
        path
    })
}

/// Extracts the first `nodes` collection found in `envelope`.
///
/// A `null` collection is treated as empty. A missing collection, or one that
/// is not an array, is a [`ServiceError::MissingNodes`].
pub fn query_nodes(envelope: &Value) -> Result<Vec<Value>, ServiceError> {
    let missing = || ServiceError::MissingNodes {
        response: envelope.clone(),
    };

    let path = nodes_path(envelope).ok_or_else(missing)?;
    match get(envelope, &path) {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(Value::Null) => Ok(Vec::new()),
        _ => Err(missing()),
    }
}
