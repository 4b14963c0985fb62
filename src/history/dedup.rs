//! First-seen-wins de-duplication within one logical fetch.

use std::collections::HashSet;

use serde_json::Value;

use super::nodes::get;

/// Set of entity keys already fetched or emitted by the current operation.
///
/// Keys are natural keys (`owner/name` for repositories, the GraphQL `id`
/// otherwise). A renamed repository therefore counts as a new entity.
#[derive(Debug, Default)]
pub struct EntityDeduplicator {
    seen: HashSet<String>,
}

impl EntityDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key` and returns `true` the first time it is presented.
    pub fn first_seen(&mut self, key: &str) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        self.seen.insert(key.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Keeps the records whose key at `key_path` has not been seen, in order.
    ///
    /// Records without a string key are kept; they cannot be matched.
    pub fn retain_unseen<S: AsRef<str>>(&mut self, records: Vec<Value>, key_path: &[S]) -> Vec<Value> {
        records
            .into_iter()
            .filter(|record| match get(record, key_path).and_then(Value::as_str) {
                Some(key) => self.first_seen(key),
                None => true,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_seen_wins() {
        let mut dedup = EntityDeduplicator::new();
        assert!(dedup.first_seen("rust-lang/rust"));
        for _ in 0..4 {
            assert!(!dedup.first_seen("rust-lang/rust"));
        }
        assert!(dedup.first_seen("tokio-rs/tokio"));
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn test_retain_unseen_across_batches() {
        let mut dedup = EntityDeduplicator::new();
        let first = dedup.retain_unseen(
            vec![json!({ "id": "a" }), json!({ "id": "b" }), json!({ "id": "a" })],
            &["id"],
        );
        assert_eq!(first, vec![json!({ "id": "a" }), json!({ "id": "b" })]);

        let second = dedup.retain_unseen(vec![json!({ "id": "b" }), json!({ "id": "c" })], &["id"]);
        assert_eq!(second, vec![json!({ "id": "c" })]);
    }

    #[test]
    fn test_records_without_key_are_kept() {
        let mut dedup = EntityDeduplicator::new();
        let kept = dedup.retain_unseen(vec![json!({ "x": 1 }), json!({ "x": 1 })], &["id"]);
        assert_eq!(kept.len(), 2);
        assert!(dedup.is_empty());
    }
}
