//! Last-write-wins merge for config and access records.

use serde_json::{Map, Value};
use snapsync_types::LwwRecord;

use super::{DomainMerge, MergeContext};

impl DomainMerge for LwwRecord {
    /// The record with the greater `lastUpdateTime` wins (ties go to local).
    /// Fields only the loser has are backfilled into the winner, and the
    /// result is stamped with the merge time.
    fn merge(local: &Self, remote: &Self, ctx: &MergeContext) -> Self {
        let (winner, loser) = if remote.last_update_time() > local.last_update_time() {
            (remote, local)
        } else {
            (local, remote)
        };

        let mut merged = winner.clone();
        fill_missing(merged.as_map_mut(), loser.as_map());
        merged.set_last_update_time(ctx.now);
        merged
    }
}

/// Copy into `target` every field of `source` that `target` lacks.
///
/// Nested objects are filled recursively when both sides hold an object.
/// A field present in `target` is never overwritten, whatever its type.
pub fn fill_missing(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, source_value) in source {
        match target.get_mut(key) {
            None => {
                target.insert(key.clone(), source_value.clone());
            }
            Some(Value::Object(target_obj)) => {
                if let Value::Object(source_obj) = source_value {
                    fill_missing(target_obj, source_obj);
                }
            }
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> LwwRecord {
        match value {
            Value::Object(map) => LwwRecord::from_map(map),
            other => panic!("not an object: {other}"),
        }
    }

    // ===========================================
    // Winner Selection Tests
    // ===========================================

    #[test]
    fn newer_remote_wins_and_backfills_local_fields() {
        let local = record(json!({"theme": "dark", "font": 14, "lastUpdateTime": 10}));
        let remote = record(json!({"theme": "light", "lastUpdateTime": 20}));

        let merged = LwwRecord::merge(&local, &remote, &MergeContext::at(99));

        assert_eq!(
            merged.as_map(),
            record(json!({"theme": "light", "font": 14, "lastUpdateTime": 99})).as_map()
        );
    }

    #[test]
    fn newer_local_wins() {
        let local = record(json!({"theme": "dark", "lastUpdateTime": 30}));
        let remote = record(json!({"theme": "light", "lang": "en", "lastUpdateTime": 20}));

        let merged = LwwRecord::merge(&local, &remote, &MergeContext::at(99));

        assert_eq!(merged.get("theme"), Some(&json!("dark")));
        assert_eq!(merged.get("lang"), Some(&json!("en")));
    }

    #[test]
    fn tie_goes_to_local() {
        let local = record(json!({"theme": "dark", "lastUpdateTime": 20}));
        let remote = record(json!({"theme": "light", "lastUpdateTime": 20}));

        let merged = LwwRecord::merge(&local, &remote, &MergeContext::at(99));

        assert_eq!(merged.get("theme"), Some(&json!("dark")));
    }

    #[test]
    fn missing_timestamps_count_as_zero() {
        let local = record(json!({"theme": "dark"}));
        let remote = record(json!({"theme": "light", "lastUpdateTime": 1}));

        let merged = LwwRecord::merge(&local, &remote, &MergeContext::at(5));

        assert_eq!(merged.get("theme"), Some(&json!("light")));
        assert_eq!(merged.last_update_time(), 5);
    }

    // ===========================================
    // Backfill Tests
    // ===========================================

    #[test]
    fn fill_missing_recurses_into_objects() {
        let mut target = record(json!({"model": {"name": "a"}})).into_map();
        let source = record(json!({"model": {"name": "b", "temperature": 0.5}, "extra": [1]}));

        fill_missing(&mut target, source.as_map());

        assert_eq!(
            Value::Object(target),
            json!({"model": {"name": "a", "temperature": 0.5}, "extra": [1]})
        );
    }

    #[test]
    fn fill_missing_never_replaces_scalars_with_objects() {
        let mut target = record(json!({"model": "flat"})).into_map();
        let source = record(json!({"model": {"name": "nested"}}));

        fill_missing(&mut target, source.as_map());

        assert_eq!(target["model"], json!("flat"));
    }

    #[test]
    fn arrays_are_not_merged() {
        let mut target = record(json!({"tags": ["a"]})).into_map();
        let source = record(json!({"tags": ["b", "c"]}));

        fill_missing(&mut target, source.as_map());

        assert_eq!(target["tags"], json!(["a"]));
    }
}
