use super::yaml::{parse_manifests, push_manifest};
use super::ManifestBuilder;
use crate::crd::Plugin;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use kube::api::DynamicObject;
use std::path::Path;

/// Manifests listed inline in the plugin, as JSON objects or YAML strings
pub fn inline_resources(plugin: &Plugin) -> Result<Vec<DynamicObject>> {
    let mut manifests = Vec::new();
    for (i, resource) in plugin.resources.iter().enumerate() {
        let parsed = match resource {
            serde_json::Value::String(text) => parse_manifests(text),
            serde_json::Value::Object(_) => {
                let mut one = Vec::new();
                push_manifest(&mut one, resource.clone()).map(|()| one)
            }
            other => Err(anyhow!("expected an object or YAML string, got {other}")),
        };
        manifests.extend(parsed.with_context(|| format!("unmarshal resource[{i}]"))?);
    }
    Ok(manifests)
}

/// Builder for the `inline` plugin kind; the source directory is not read
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineBuilder;

#[async_trait]
impl ManifestBuilder for InlineBuilder {
    async fn build(&self, plugin: &Plugin, _dir: &Path) -> Result<Vec<DynamicObject>> {
        inline_resources(plugin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::PluginKind;
    use serde_json::json;

    fn plugin(resources: Vec<serde_json::Value>) -> Plugin {
        Plugin {
            kind: PluginKind::Inline,
            name: "demo".to_string(),
            namespace: "ns1".to_string(),
            repo: String::new(),
            version: String::new(),
            path: String::new(),
            resources,
            values: Default::default(),
        }
    }

    #[test]
    fn test_objects_and_yaml_strings() {
        let manifests = inline_resources(&plugin(vec![
            json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "cm-a"}}),
            json!("apiVersion: v1\nkind: Secret\nmetadata:\n  name: s\n"),
        ]))
        .unwrap();
        assert_eq!(manifests.len(), 2);
    }

    #[test]
    fn test_bad_resource_names_its_index() {
        let err = inline_resources(&plugin(vec![
            json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "ok"}}),
            json!(42),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("unmarshal resource[1]"));
    }
}
