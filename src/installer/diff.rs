//! # Diff
//!
//! Schema-free "desired is a subset of live" comparison.
//!
//! A live object matches its desired manifest when every field the manifest
//! sets has the same value in the live object. Fields only present in the live
//! object (server defaults, status, fields owned by other managers) are ignored.
//! Arrays are compared element-wise and must have the same length.

use crate::installer::values::numbers_eq;
use kube::api::DynamicObject;
use serde_json::Value;
use std::collections::BTreeMap;

/// Whether every field set in `desired` has an equal value in `live`
#[must_use]
pub fn is_subset(desired: &Value, live: &Value) -> bool {
    match (desired, live) {
        (Value::Null, _) => true,
        (Value::Object(want), Value::Object(have)) => want.iter().all(|(k, v)| match have.get(k) {
            Some(live_value) => is_subset(v, live_value),
            None => v.is_null(),
        }),
        (Value::Array(want), Value::Array(have)) => {
            want.len() == have.len() && want.iter().zip(have).all(|(w, h)| is_subset(w, h))
        }
        (Value::Number(want), Value::Number(have)) => numbers_eq(want, have),
        _ => desired == live,
    }
}

fn map_subset(desired: Option<&BTreeMap<String, String>>, live: Option<&BTreeMap<String, String>>) -> bool {
    desired.is_none_or(|want| {
        want.iter()
            .all(|(k, v)| live.and_then(|have| have.get(k)) == Some(v))
    })
}

/// Whether applying `desired` would change `live`
#[must_use]
pub fn is_modified(desired: &DynamicObject, live: &DynamicObject) -> bool {
    let meta_matches = desired.metadata.name == live.metadata.name
        && map_subset(desired.metadata.labels.as_ref(), live.metadata.labels.as_ref())
        && map_subset(
            desired.metadata.annotations.as_ref(),
            live.metadata.annotations.as_ref(),
        );
    !(meta_matches && is_subset(&desired.data, &live.data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> DynamicObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_server_defaults_are_ignored() {
        let desired = object(json!({
            "apiVersion": "apps/v1", "kind": "Deployment",
            "metadata": {"name": "web", "labels": {"app": "web"}},
            "spec": {"replicas": 2}
        }));
        let live = object(json!({
            "apiVersion": "apps/v1", "kind": "Deployment",
            "metadata": {
                "name": "web", "namespace": "ns1", "uid": "1234",
                "labels": {"app": "web", "pod-template-hash": "abc"}
            },
            "spec": {"replicas": 2.0, "revisionHistoryLimit": 10},
            "status": {"readyReplicas": 2}
        }));
        assert!(!is_modified(&desired, &live));
    }

    #[test]
    fn test_changed_field_is_modified() {
        let desired = object(json!({
            "apiVersion": "v1", "kind": "ConfigMap",
            "metadata": {"name": "cm-a"}, "data": {"k": "v2"}
        }));
        let live = object(json!({
            "apiVersion": "v1", "kind": "ConfigMap",
            "metadata": {"name": "cm-a"}, "data": {"k": "v1"}
        }));
        assert!(is_modified(&desired, &live));
    }

    #[test]
    fn test_missing_annotation_is_modified() {
        let desired = object(json!({
            "apiVersion": "v1", "kind": "ConfigMap",
            "metadata": {"name": "cm-a", "annotations": {"plugin-installer.io/owner": "ns1/demo"}}
        }));
        let live = object(json!({
            "apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "cm-a"}
        }));
        assert!(is_modified(&desired, &live));
    }

    #[test]
    fn test_arrays_compare_by_length_and_position() {
        assert!(is_subset(&json!([{"a": 1}]), &json!([{"a": 1, "b": 2}])));
        assert!(!is_subset(&json!([1]), &json!([1, 2])));
        assert!(!is_subset(&json!([1, 2]), &json!([2, 1])));
    }

    #[test]
    fn test_explicit_null_matches_absent_field() {
        assert!(is_subset(&json!({"a": null}), &json!({})));
    }
}
