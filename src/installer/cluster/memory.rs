//! In-memory cluster used by tests and dry runs.
//!
//! Behaves like a small API server: it only accepts known resource types,
//! requires namespaced objects to land in an existing namespace, and stamps a
//! `uid` and `resourceVersion` on every write the way a server defaults fields.

use super::{ClusterClient, ClusterError};
use crate::installer::resource::{api_version, kind, split_api_version, ResourceKey, ResourceType};
use async_trait::async_trait;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind, TypeMeta};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Number of calls received per operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub discover: usize,
    pub list: usize,
    pub get: usize,
    pub apply: usize,
    pub delete: usize,
}

impl CallCounts {
    /// Calls that touch the cluster at all
    #[must_use]
    pub fn total(&self) -> usize {
        self.discover + self.list + self.get + self.apply + self.delete
    }

    /// Calls that change cluster state
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.apply + self.delete
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    types: Vec<ResourceType>,
    objects: BTreeMap<ResourceKey, DynamicObject>,
    fail_discovery: bool,
    rejected: HashMap<String, String>,
    calls: CallCounts,
    revision: u64,
}

#[derive(Debug)]
pub struct InMemoryCluster {
    state: Mutex<MemoryState>,
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

fn resource_type(group: &str, version: &str, kind: &str, plural: &str, namespaced: bool) -> ResourceType {
    let gvk = GroupVersionKind::gvk(group, version, kind);
    ResourceType {
        api_resource: ApiResource::from_gvk_with_plural(&gvk, plural),
        namespaced,
    }
}

impl InMemoryCluster {
    /// Cluster serving the built-in types the installer commonly manages
    #[must_use]
    pub fn new() -> Self {
        Self::with_types(vec![
            resource_type("", "v1", "Namespace", "namespaces", false),
            resource_type("", "v1", "ConfigMap", "configmaps", true),
            resource_type("", "v1", "Secret", "secrets", true),
            resource_type("", "v1", "ServiceAccount", "serviceaccounts", true),
            resource_type("", "v1", "Service", "services", true),
            resource_type("apps", "v1", "Deployment", "deployments", true),
            resource_type(
                "rbac.authorization.k8s.io",
                "v1",
                "ClusterRole",
                "clusterroles",
                false,
            ),
            resource_type(
                "apiextensions.k8s.io",
                "v1",
                "CustomResourceDefinition",
                "customresourcedefinitions",
                false,
            ),
        ])
    }

    #[must_use]
    pub fn with_types(types: Vec<ResourceType>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                types,
                ..MemoryState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve an additional resource type, as if a CRD had been established
    pub fn register_type(
        &self,
        api_version: &str,
        kind: &str,
        plural: &str,
        namespaced: bool,
    ) {
        let (group, version) = split_api_version(api_version);
        self.state()
            .types
            .push(resource_type(group, version, kind, plural, namespaced));
    }

    /// Store an object directly, bypassing call counting and admission
    pub fn insert(&self, object: DynamicObject) {
        let key = ResourceKey::from_object(&object);
        self.state().objects.insert(key, object);
    }

    /// Delete an object directly, as if another client had removed it
    pub fn remove(&self, key: &ResourceKey) -> Option<DynamicObject> {
        self.state().objects.remove(key)
    }

    #[must_use]
    pub fn object(&self, key: &ResourceKey) -> Option<DynamicObject> {
        self.state().objects.get(key).cloned()
    }

    #[must_use]
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.state().objects.contains_key(key)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<ResourceKey> {
        self.state().objects.keys().cloned().collect()
    }

    /// Make every subsequent discovery call fail (or succeed again)
    pub fn fail_discovery(&self, fail: bool) {
        self.state().fail_discovery = fail;
    }

    /// Reject applies of any object named `name` with `message`
    pub fn reject_apply(&self, name: impl Into<String>, message: impl Into<String>) {
        self.state().rejected.insert(name.into(), message.into());
    }

    #[must_use]
    pub fn calls(&self) -> CallCounts {
        self.state().calls
    }

    pub fn reset_calls(&self) {
        self.state().calls = CallCounts::default();
    }
}

impl MemoryState {
    fn find_type(&self, resource_type: &ResourceType) -> Option<&ResourceType> {
        let wanted = resource_type.group_kind();
        self.types.iter().find(|t| t.group_kind() == wanted)
    }

    fn unknown(resource_type: &ResourceType) -> ClusterError {
        ClusterError::UnknownResourceType {
            api_version: resource_type.api_resource.api_version.clone(),
            kind: resource_type.api_resource.kind.clone(),
        }
    }

    fn namespace_exists(&self, namespace: &str) -> bool {
        self.objects
            .contains_key(&ResourceKey::new("", "Namespace", "", namespace))
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn discover(&self) -> Result<Vec<ResourceType>, ClusterError> {
        let mut state = self.state();
        state.calls.discover += 1;
        if state.fail_discovery {
            return Err(ClusterError::Discovery(
                "connection refused".to_string(),
            ));
        }
        Ok(state.types.clone())
    }

    async fn list(&self, resource_type: &ResourceType) -> Result<Vec<DynamicObject>, ClusterError> {
        let mut state = self.state();
        state.calls.list += 1;
        let served = state
            .find_type(resource_type)
            .ok_or_else(|| MemoryState::unknown(resource_type))?
            .group_kind();

        let types = TypeMeta {
            api_version: resource_type.api_resource.api_version.clone(),
            kind: resource_type.api_resource.kind.clone(),
        };
        Ok(state
            .objects
            .iter()
            .filter(|(key, _)| key.group_kind() == served)
            .map(|(_, obj)| {
                let mut obj = obj.clone();
                obj.types = Some(types.clone());
                obj
            })
            .collect())
    }

    async fn apply(
        &self,
        resource_type: &ResourceType,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClusterError> {
        let mut state = self.state();
        state.calls.apply += 1;
        let namespaced = state
            .find_type(resource_type)
            .ok_or_else(|| MemoryState::unknown(resource_type))?
            .namespaced;

        let mut key = ResourceKey::from_object(object);
        if !namespaced {
            key.namespace.clear();
        }
        if key.name.is_empty() {
            return Err(ClusterError::Rejected {
                key,
                message: "metadata.name is required".to_string(),
            });
        }
        if let Some(message) = state.rejected.get(&key.name) {
            return Err(ClusterError::Rejected {
                message: message.clone(),
                key,
            });
        }
        if namespaced {
            if key.namespace.is_empty() {
                return Err(ClusterError::Rejected {
                    key,
                    message: "metadata.namespace is required".to_string(),
                });
            }
            if !state.namespace_exists(&key.namespace) {
                let message = format!("namespaces \"{}\" not found", key.namespace);
                return Err(ClusterError::Rejected { key, message });
            }
        }

        state.revision += 1;
        let uid = state
            .objects
            .get(&key)
            .and_then(|existing| existing.metadata.uid.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut stored = object.clone();
        stored.types = Some(TypeMeta {
            api_version: api_version(object).to_string(),
            kind: kind(object).to_string(),
        });
        stored.metadata.namespace = (!key.namespace.is_empty()).then(|| key.namespace.clone());
        stored.metadata.uid = Some(uid);
        stored.metadata.resource_version = Some(state.revision.to_string());

        debug!(resource = %key, "Stored object in memory");
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn get(
        &self,
        resource_type: &ResourceType,
        key: &ResourceKey,
    ) -> Result<Option<DynamicObject>, ClusterError> {
        let mut state = self.state();
        state.calls.get += 1;
        if state.find_type(resource_type).is_none() {
            return Err(MemoryState::unknown(resource_type));
        }
        Ok(state.objects.get(key).cloned())
    }

    async fn delete(&self, resource_type: &ResourceType, key: &ResourceKey) -> Result<(), ClusterError> {
        let mut state = self.state();
        state.calls.delete += 1;
        if state.find_type(resource_type).is_none() {
            return Err(MemoryState::unknown(resource_type));
        }
        match state.objects.remove(key) {
            Some(_) => Ok(()),
            None => Err(ClusterError::NotFound(key.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(value: serde_json::Value) -> DynamicObject {
        serde_json::from_value(value).unwrap()
    }

    fn config_map_type() -> ResourceType {
        resource_type("", "v1", "ConfigMap", "configmaps", true)
    }

    #[tokio::test]
    async fn test_apply_requires_existing_namespace() {
        let cluster = InMemoryCluster::new();
        let cm = manifest(serde_json::json!({
            "apiVersion": "v1", "kind": "ConfigMap",
            "metadata": {"name": "cm-a", "namespace": "ns1"}
        }));

        let err = cluster.apply(&config_map_type(), &cm).await.unwrap_err();
        assert!(err.to_string().contains("namespaces \"ns1\" not found"));

        let ns = manifest(serde_json::json!({
            "apiVersion": "v1", "kind": "Namespace", "metadata": {"name": "ns1"}
        }));
        let ns_type = resource_type("", "v1", "Namespace", "namespaces", false);
        cluster.apply(&ns_type, &ns).await.unwrap();
        let stored = cluster.apply(&config_map_type(), &cm).await.unwrap();

        assert!(stored.metadata.uid.is_some());
        assert!(cluster.contains(&ResourceKey::new("", "ConfigMap", "ns1", "cm-a")));
        assert_eq!(cluster.calls().apply, 3);
    }

    #[tokio::test]
    async fn test_reapply_keeps_uid() {
        let cluster = InMemoryCluster::new();
        let ns = manifest(serde_json::json!({
            "apiVersion": "v1", "kind": "Namespace", "metadata": {"name": "ns1"}
        }));
        let ns_type = resource_type("", "v1", "Namespace", "namespaces", false);
        let first = cluster.apply(&ns_type, &ns).await.unwrap();
        let second = cluster.apply(&ns_type, &ns).await.unwrap();
        assert_eq!(first.metadata.uid, second.metadata.uid);
        assert_ne!(first.metadata.resource_version, second.metadata.resource_version);
    }

    #[tokio::test]
    async fn test_delete_missing_object_is_not_found() {
        let cluster = InMemoryCluster::new();
        let key = ResourceKey::new("", "ConfigMap", "ns1", "gone");
        let err = cluster.delete(&config_map_type(), &key).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unknown_type_is_rejected_until_registered() {
        let cluster = InMemoryCluster::new();
        let widget = resource_type("example.io", "v1", "Widget", "widgets", true);
        assert!(matches!(
            cluster.list(&widget).await,
            Err(ClusterError::UnknownResourceType { .. })
        ));

        cluster.register_type("example.io/v1", "Widget", "widgets", true);
        assert!(cluster.list(&widget).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_discovery_failure_toggle() {
        let cluster = InMemoryCluster::new();
        cluster.fail_discovery(true);
        assert!(cluster.discover().await.is_err());
        cluster.fail_discovery(false);
        assert!(!cluster.discover().await.unwrap().is_empty());
        assert_eq!(cluster.calls().discover, 2);
    }
}
