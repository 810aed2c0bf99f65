//! # Resource Identity
//!
//! Keys, types and small accessors for schema-free manifests.

use kube::api::{ApiResource, DynamicObject};
use std::fmt;

/// Identity of a cluster object, independent of API version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub group: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(
        group: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a manifest, as currently written (namespace not defaulted)
    #[must_use]
    pub fn from_object(obj: &DynamicObject) -> Self {
        let (group, _) = split_api_version(api_version(obj));
        Self {
            group: group.to_string(),
            kind: kind(obj).to_string(),
            namespace: obj.metadata.namespace.clone().unwrap_or_default(),
            name: obj.metadata.name.clone().unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn group_kind(&self) -> GroupKind {
        GroupKind {
            group: self.group.clone(),
            kind: self.kind.clone(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.group, self.kind, self.namespace, self.name
        )
    }
}

/// Group and kind, the version-independent type of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKind {
    pub group: String,
    pub kind: String,
}

impl GroupKind {
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }
}

/// A discovered resource type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceType {
    pub api_resource: ApiResource,
    pub namespaced: bool,
}

impl ResourceType {
    #[must_use]
    pub fn group_kind(&self) -> GroupKind {
        GroupKind::new(&self.api_resource.group, &self.api_resource.kind)
    }

    /// Same resource type addressed through another version of its group
    #[must_use]
    pub fn with_api_version(&self, api_version: &str) -> Self {
        let (group, version) = split_api_version(api_version);
        if api_version.is_empty() || version == self.api_resource.version {
            return self.clone();
        }
        let mut api_resource = self.api_resource.clone();
        api_resource.group = group.to_string();
        api_resource.version = version.to_string();
        api_resource.api_version = api_version.to_string();
        Self {
            api_resource,
            namespaced: self.namespaced,
        }
    }
}

/// Parse apiVersion into group/version
#[must_use]
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    api_version.split_once('/').unwrap_or(("", api_version))
}

#[must_use]
pub fn api_version(obj: &DynamicObject) -> &str {
    obj.types
        .as_ref()
        .map(|t| t.api_version.as_str())
        .unwrap_or_default()
}

#[must_use]
pub fn kind(obj: &DynamicObject) -> &str {
    obj.types
        .as_ref()
        .map(|t| t.kind.as_str())
        .unwrap_or_default()
}

/// Get priority for a Kubernetes resource kind (lower = apply first)
#[must_use]
pub fn kind_priority(kind: &str) -> u8 {
    match kind {
        "Namespace" => 0,
        "CustomResourceDefinition" => 1,
        "ServiceAccount" => 2,
        "ClusterRole" | "Role" => 3,
        "ClusterRoleBinding" | "RoleBinding" => 4,
        "ConfigMap" | "Secret" => 5,
        "Service" => 6,
        "Deployment" | "DaemonSet" | "StatefulSet" => 7,
        "HorizontalPodAutoscaler" => 8,
        _ => 10, // webhooks, policies, etc. come last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::TypeMeta;

    fn object(api_version: &str, kind: &str, namespace: Option<&str>, name: &str) -> DynamicObject {
        let mut obj = DynamicObject {
            types: Some(TypeMeta {
                api_version: api_version.to_string(),
                kind: kind.to_string(),
            }),
            metadata: Default::default(),
            data: serde_json::Value::Null,
        };
        obj.metadata.name = Some(name.to_string());
        obj.metadata.namespace = namespace.map(str::to_string);
        obj
    }

    #[test]
    fn test_key_display_core_group() {
        let key = ResourceKey::from_object(&object("v1", "ConfigMap", Some("ns1"), "cm-a"));
        assert_eq!(key.to_string(), "/ConfigMap/ns1/cm-a");
    }

    #[test]
    fn test_key_display_named_group_cluster_scoped() {
        let key = ResourceKey::from_object(&object(
            "rbac.authorization.k8s.io/v1",
            "ClusterRole",
            None,
            "viewer",
        ));
        assert_eq!(key.to_string(), "rbac.authorization.k8s.io/ClusterRole//viewer");
    }

    #[test]
    fn test_split_api_version() {
        assert_eq!(split_api_version("apps/v1"), ("apps", "v1"));
        assert_eq!(split_api_version("v1"), ("", "v1"));
    }

    #[test]
    fn test_with_api_version_keeps_plural_and_scope() {
        let ty = ResourceType {
            api_resource: ApiResource {
                group: "autoscaling".to_string(),
                version: "v2".to_string(),
                api_version: "autoscaling/v2".to_string(),
                kind: "HorizontalPodAutoscaler".to_string(),
                plural: "horizontalpodautoscalers".to_string(),
            },
            namespaced: true,
        };
        let v1 = ty.with_api_version("autoscaling/v1");
        assert_eq!(v1.api_resource.version, "v1");
        assert_eq!(v1.api_resource.plural, "horizontalpodautoscalers");
        assert!(v1.namespaced);
    }

    #[test]
    fn test_kind_priority_orders_foundations_first() {
        assert!(kind_priority("Namespace") < kind_priority("CustomResourceDefinition"));
        assert!(kind_priority("ConfigMap") < kind_priority("Deployment"));
        assert_eq!(kind_priority("MutatingWebhookConfiguration"), 10);
    }
}
