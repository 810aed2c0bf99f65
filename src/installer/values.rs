//! Canonical comparison of plugin values.
//!
//! Two value maps are equal when they hold the same non-null entries, with
//! numbers compared by value (`1 == 1.0`) and maps compared independently of
//! key order.

use crate::crd::Values;
use serde_json::{Number, Value};
use std::collections::BTreeMap;

/// Whether two value maps are canonically equal
#[must_use]
pub fn canonical_eq(a: &Values, b: &Values) -> bool {
    entries_eq(a, b)
}

/// Canonical equality of two JSON values
#[must_use]
pub fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_eq(x, y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| value_eq(x, y))
        }
        (Value::Object(x), Value::Object(y)) => entries_eq(x, y),
        _ => a == b,
    }
}

fn non_null<'a>(
    entries: impl IntoIterator<Item = (&'a String, &'a Value)>,
) -> BTreeMap<&'a str, &'a Value> {
    entries
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.as_str(), v))
        .collect()
}

fn entries_eq<'a>(
    a: impl IntoIterator<Item = (&'a String, &'a Value)>,
    b: impl IntoIterator<Item = (&'a String, &'a Value)>,
) -> bool {
    let (a, b) = (non_null(a), non_null(b));
    a.len() == b.len()
        && a
            .iter()
            .all(|(k, v)| b.get(k).is_some_and(|other| value_eq(v, other)))
}

/// Numeric equality across integer and float representations
#[must_use]
pub fn numbers_eq(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(value: Value) -> Values {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_integer_equals_float() {
        assert!(canonical_eq(
            &values(json!({"replicas": 1})),
            &values(json!({"replicas": 1.0}))
        ));
    }

    #[test]
    fn test_null_entries_are_ignored() {
        assert!(canonical_eq(
            &values(json!({"a": 1, "b": null})),
            &values(json!({"a": 1}))
        ));
        assert!(canonical_eq(
            &values(json!({"nested": {"x": null, "y": "v"}})),
            &values(json!({"nested": {"y": "v"}}))
        ));
    }

    #[test]
    fn test_key_order_is_irrelevant() {
        let a: Values = serde_yaml::from_str("b: 2\na: {d: 4, c: 3}\n").unwrap();
        let b: Values = serde_yaml::from_str("a: {c: 3, d: 4}\nb: 2\n").unwrap();
        assert!(canonical_eq(&a, &b));
    }

    #[test]
    fn test_different_values_are_not_equal() {
        assert!(!canonical_eq(
            &values(json!({"image": "nginx:1.25"})),
            &values(json!({"image": "nginx:1.26"}))
        ));
        assert!(!canonical_eq(&values(json!({"a": 1})), &values(json!({"a": 1, "b": 2}))));
        assert!(!canonical_eq(&values(json!({"list": [1, 2]})), &values(json!({"list": [2, 1]}))));
    }

    #[test]
    fn test_empty_maps_are_equal() {
        assert!(canonical_eq(&Values::new(), &Values::new()));
    }
}
