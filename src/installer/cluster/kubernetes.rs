//! `kube`-backed cluster client using discovery and server-side apply.

use super::{ClusterClient, ClusterError};
use crate::installer::resource::{ResourceKey, ResourceType};
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, TypeMeta};
use kube::discovery::{verbs, Discovery, Scope};
use kube::Client;
use tracing::debug;

#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    field_manager: String,
}

impl std::fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCluster")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

impl KubeCluster {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn api(&self, resource_type: &ResourceType, namespace: &str) -> Api<DynamicObject> {
        if resource_type.namespaced && !namespace.is_empty() {
            Api::namespaced_with(self.client.clone(), namespace, &resource_type.api_resource)
        } else {
            Api::all_with(self.client.clone(), &resource_type.api_resource)
        }
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn discover(&self) -> Result<Vec<ResourceType>, ClusterError> {
        let discovery = Discovery::new(self.client.clone())
            .run()
            .await
            .map_err(|e| ClusterError::Discovery(e.to_string()))?;

        let mut types = Vec::new();
        for group in discovery.groups() {
            for (api_resource, caps) in group.recommended_resources() {
                if !caps.supports_operation(verbs::LIST) {
                    continue;
                }
                types.push(ResourceType {
                    api_resource,
                    namespaced: caps.scope == Scope::Namespaced,
                });
            }
        }
        debug!(types = types.len(), "Discovered resource types");
        Ok(types)
    }

    async fn list(&self, resource_type: &ResourceType) -> Result<Vec<DynamicObject>, ClusterError> {
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource_type.api_resource);
        let list = api.list(&ListParams::default()).await?;

        // List responses omit per-item type information.
        let types = TypeMeta {
            api_version: resource_type.api_resource.api_version.clone(),
            kind: resource_type.api_resource.kind.clone(),
        };
        Ok(list
            .items
            .into_iter()
            .map(|mut obj| {
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
        let key = ResourceKey::from_object(object);
        let api = self.api(resource_type, &key.namespace);
        let params = PatchParams::apply(&self.field_manager).force();

        let mut applied = api.patch(&key.name, &params, &Patch::Apply(object)).await?;
        if applied.types.is_none() {
            applied.types.clone_from(&object.types);
        }
        debug!(resource = %key, "Applied manifest");
        Ok(applied)
    }

    async fn get(
        &self,
        resource_type: &ResourceType,
        key: &ResourceKey,
    ) -> Result<Option<DynamicObject>, ClusterError> {
        let api = self.api(resource_type, &key.namespace);
        let mut found = api.get_opt(&key.name).await?;
        if let Some(obj) = found.as_mut() {
            if obj.types.is_none() {
                obj.types = Some(TypeMeta {
                    api_version: resource_type.api_resource.api_version.clone(),
                    kind: resource_type.api_resource.kind.clone(),
                });
            }
        }
        Ok(found)
    }

    async fn delete(&self, resource_type: &ResourceType, key: &ResourceKey) -> Result<(), ClusterError> {
        let api = self.api(resource_type, &key.namespace);
        api.delete(&key.name, &DeleteParams::default()).await?;
        debug!(resource = %key, "Deleted object");
        Ok(())
    }
}
