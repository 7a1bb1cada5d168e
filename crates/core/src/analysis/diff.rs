use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Before/after pair for a key whose value changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedValue {
    pub before: Value,
    pub after: Value,
}

/// Top-level key partition of two JSON values.
///
/// The four key sets are pairwise disjoint and together cover
/// `keys(before) ∪ keys(after)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    pub added: BTreeMap<String, Value>,
    pub removed: BTreeMap<String, Value>,
    pub changed: BTreeMap<String, ChangedValue>,
    pub unchanged: BTreeMap<String, Value>,
}

impl DiffResult {
    /// Anything added, removed, or changed.
    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty())
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len() + self.unchanged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Key set used for diffing a JSON value. Objects use their keys, arrays
/// their indices, and any other value sits under `"value"`.
fn entries(value: &Value) -> BTreeMap<String, Value> {
    match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        other => BTreeMap::from([("value".to_string(), other.clone())]),
    }
}

/// Classify every top-level key of `before`/`after` as added, removed,
/// changed, or unchanged.
///
/// Only the top level is diffed; nested values that differ anywhere land
/// under `changed` wholesale. Equality is canonical: key order inside
/// nested objects never counts as a change.
pub fn diff(before: Option<&Value>, after: Option<&Value>) -> DiffResult {
    let mut result = DiffResult::default();
    match (before, after) {
        (None, None) => {}
        (None, Some(after)) => result.added = entries(after),
        (Some(before), None) => result.removed = entries(before),
        (Some(before), Some(after)) => {
            let before = entries(before);
            let after = entries(after);
            for (key, after_val) in &after {
                match before.get(key) {
                    None => {
                        result.added.insert(key.clone(), after_val.clone());
                    }
                    Some(before_val) if !values_equal(before_val, after_val) => {
                        result.changed.insert(
                            key.clone(),
                            ChangedValue {
                                before: before_val.clone(),
                                after: after_val.clone(),
                            },
                        );
                    }
                    Some(_) => {
                        result.unchanged.insert(key.clone(), after_val.clone());
                    }
                }
            }
            for (key, before_val) in before {
                if !after.contains_key(&key) {
                    result.removed.insert(key, before_val);
                }
            }
        }
    }
    result
}

/// Rebuild a value with every object's keys in sorted order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, canonicalize(v))).collect();
            let mut out = Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Serialize after canonicalizing, so equal values always yield equal text.
pub fn canonical_string(value: &Value) -> Result<String, serde_json::Error> {
    serde_json::to_string(&canonicalize(value))
}

/// Deep equality by canonical serialization. A value that cannot be
/// serialized compares unequal.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (canonical_string(a), canonical_string(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn keys<V>(m: &BTreeMap<String, V>) -> BTreeSet<String> {
        m.keys().cloned().collect()
    }

    fn assert_partition(a: &Value, b: &Value) {
        let d = diff(Some(a), Some(b));
        let sets = [keys(&d.added), keys(&d.removed), keys(&d.changed), keys(&d.unchanged)];
        for i in 0..sets.len() {
            for j in (i + 1)..sets.len() {
                assert!(sets[i].is_disjoint(&sets[j]), "sets {i} and {j} overlap");
            }
        }
        let union: BTreeSet<String> = sets.iter().flatten().cloned().collect();
        let expected: BTreeSet<String> = keys(&entries(a)).union(&keys(&entries(b))).cloned().collect();
        assert_eq!(union, expected);
    }

    #[test]
    fn added_removed_unchanged() {
        let d = diff(Some(&json!({"a": 1, "b": 2})), Some(&json!({"b": 2, "c": 3})));
        assert_eq!(d.added, BTreeMap::from([("c".to_string(), json!(3))]));
        assert_eq!(d.removed, BTreeMap::from([("a".to_string(), json!(1))]));
        assert!(d.changed.is_empty());
        assert_eq!(d.unchanged, BTreeMap::from([("b".to_string(), json!(2))]));
    }

    #[test]
    fn changed_carries_before_and_after() {
        let d = diff(
            Some(&json!({"messages": ["hi"], "step": 1})),
            Some(&json!({"messages": ["hi", "hello"], "step": 1})),
        );
        assert_eq!(
            d.changed.get("messages"),
            Some(&ChangedValue {
                before: json!(["hi"]),
                after: json!(["hi", "hello"]),
            })
        );
        assert!(d.unchanged.contains_key("step"));
        assert!(d.has_changes());
    }

    #[test]
    fn null_sides() {
        assert!(diff(None, None).is_empty());
        let x = json!({"k": "v", "n": null});
        let added = diff(None, Some(&x));
        assert_eq!(added.added.len(), 2);
        assert!(added.removed.is_empty());
        let removed = diff(Some(&x), None);
        assert_eq!(removed.removed.len(), 2);
        assert!(removed.added.is_empty());
    }

    #[test]
    fn identical_values_are_all_unchanged() {
        let x = json!({"s": "str", "n": 1.5, "b": true, "z": null, "o": {"q": [1, 2]}});
        let d = diff(Some(&x), Some(&x));
        assert!(!d.has_changes());
        assert_eq!(Value::Object(d.unchanged.into_iter().collect()), x);
    }

    #[test]
    fn nested_key_order_is_not_a_change() {
        let mut first = Map::new();
        first.insert("x".into(), json!(1));
        first.insert("y".into(), json!(2));
        let mut second = Map::new();
        second.insert("y".into(), json!(2));
        second.insert("x".into(), json!(1));
        let before = json!({ "state": Value::Object(first) });
        let after = json!({ "state": Value::Object(second) });
        let d = diff(Some(&before), Some(&after));
        assert!(!d.has_changes());
        assert!(values_equal(&before, &after));
    }

    #[test]
    fn nested_difference_reported_wholesale() {
        let d = diff(
            Some(&json!({"state": {"a": {"deep": 1}, "b": 2}})),
            Some(&json!({"state": {"a": {"deep": 2}, "b": 2}})),
        );
        assert_eq!(d.changed.len(), 1);
        assert!(d.changed.contains_key("state"));
    }

    #[test]
    fn non_object_values() {
        let d = diff(Some(&json!([1, 2, 3])), Some(&json!([1, 5])));
        assert_eq!(keys(&d.unchanged), BTreeSet::from(["0".to_string()]));
        assert_eq!(keys(&d.changed), BTreeSet::from(["1".to_string()]));
        assert_eq!(keys(&d.removed), BTreeSet::from(["2".to_string()]));

        let d = diff(Some(&json!("draft")), Some(&json!("final")));
        assert_eq!(keys(&d.changed), BTreeSet::from(["value".to_string()]));
    }

    #[test]
    fn partition_holds_across_shapes() {
        let cases = [
            (json!({}), json!({})),
            (json!({"a": 1}), json!({})),
            (json!({}), json!({"a": 1})),
            (json!({"a": 1, "b": {"c": 2}, "d": [1]}), json!({"b": {"c": 3}, "d": [1], "e": null})),
            (json!([1, 2]), json!({"0": 1, "x": 2})),
            (json!(3), json!({"value": 3, "other": 4})),
        ];
        for (a, b) in &cases {
            assert_partition(a, b);
        }
    }

    #[test]
    fn canonical_string_sorts_keys() {
        let mut map = Map::new();
        map.insert("b".into(), json!(1));
        map.insert("a".into(), json!({"d": 1, "c": 2}));
        let s = canonical_string(&Value::Object(map)).unwrap_or_default();
        assert_eq!(s, r#"{"a":{"c":2,"d":1},"b":1}"#);
    }
}
