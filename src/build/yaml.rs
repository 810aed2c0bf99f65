//! Multi-document YAML parsing into schema-free manifests.

use anyhow::{anyhow, Context, Result};
use kube::api::DynamicObject;
use serde::Deserialize;

/// Parse a `---` separated stream of manifests
///
/// Empty documents are skipped and `*List` kinds are expanded into their items.
pub fn parse_manifests(text: &str) -> Result<Vec<DynamicObject>> {
    let mut manifests = Vec::new();
    for (i, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let value = serde_yaml::Value::deserialize(document)
            .with_context(|| format!("parse YAML document {i}"))?;
        if value.is_null() {
            continue;
        }
        let value = serde_json::to_value(&value)
            .with_context(|| format!("convert YAML document {i} to JSON"))?;
        push_manifest(&mut manifests, value).with_context(|| format!("YAML document {i}"))?;
    }
    Ok(manifests)
}

/// Convert one JSON manifest, expanding lists
pub fn push_manifest(manifests: &mut Vec<DynamicObject>, value: serde_json::Value) -> Result<()> {
    let kind = value.get("kind").and_then(|k| k.as_str()).unwrap_or_default();
    if kind.ends_with("List") {
        if let Some(items) = value.get("items").and_then(|i| i.as_array()) {
            for item in items {
                push_manifest(manifests, item.clone())?;
            }
            return Ok(());
        }
    }
    manifests.push(to_manifest(value)?);
    Ok(())
}

fn to_manifest(value: serde_json::Value) -> Result<DynamicObject> {
    if !value.is_object() {
        return Err(anyhow!("manifest must be a mapping"));
    }
    let obj: DynamicObject = serde_json::from_value(value).context("invalid manifest")?;
    match &obj.types {
        Some(types) if !types.api_version.is_empty() && !types.kind.is_empty() => {}
        _ => return Err(anyhow!("manifest is missing apiVersion or kind")),
    }
    if obj.metadata.name.as_deref().is_none_or(str::is_empty) {
        return Err(anyhow!("manifest is missing metadata.name"));
    }
    Ok(obj)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multiple_documents() {
        let text = r"
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: a
data:
  replicas: '3'
---
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: ns1
spec:
  replicas: 2
";
        let manifests = parse_manifests(text).unwrap();
        assert_eq!(manifests.len(), 2);
        assert_eq!(manifests[0].metadata.name.as_deref(), Some("a"));
        assert_eq!(manifests[1].data["spec"]["replicas"], 2);
    }

    #[test]
    fn test_list_kinds_are_expanded() {
        let text = r"
apiVersion: v1
kind: List
items:
  - apiVersion: v1
    kind: ConfigMap
    metadata: {name: a}
  - apiVersion: v1
    kind: ConfigMap
    metadata: {name: b}
";
        let manifests = parse_manifests(text).unwrap();
        let names: Vec<_> = manifests.iter().filter_map(|m| m.metadata.name.clone()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_missing_kind_is_an_error() {
        let err = parse_manifests("apiVersion: v1\nmetadata: {name: a}\n").unwrap_err();
        assert!(format!("{err:#}").contains("apiVersion or kind"));
    }

    #[test]
    fn test_json_documents_parse() {
        let manifests =
            parse_manifests(r#"{"apiVersion": "v1", "kind": "Secret", "metadata": {"name": "s"}}"#).unwrap();
        assert_eq!(manifests.len(), 1);
    }
}
