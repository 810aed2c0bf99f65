//! # Cluster State Cache
//!
//! In-process snapshot of the cluster: the resource types the API server
//! serves and every object of every listable type.
//!
//! The cache is created once at startup and shared by `Arc`. Every sync calls
//! [`ClusterCache::ensure_synced`], which is a no-op while the snapshot is
//! fresh. There are no watches: every sync relists the kinds it is about to
//! touch through [`ClusterCache::relist`], and the sync engine writes back what
//! it applies or prunes.

use crate::installer::cluster::{ClusterClient, ClusterError};
use crate::installer::ownership::ResourceSelector;
use crate::installer::resource::{split_api_version, GroupKind, ResourceKey, ResourceType};
use crate::observability::metrics;
use kube::api::DynamicObject;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cluster cache discovery failed: {0}")]
    Discovery(#[source] ClusterError),

    #[error("cluster cache failed to list {resource}: {source}")]
    List {
        resource: String,
        #[source]
        source: ClusterError,
    },
}

#[derive(Debug, Default)]
struct CacheState {
    synced_at: Option<Instant>,
    types: HashMap<GroupKind, ResourceType>,
    objects: BTreeMap<ResourceKey, DynamicObject>,
}

pub struct ClusterCache {
    client: Arc<dyn ClusterClient>,
    resync_interval: Option<Duration>,
    state: RwLock<CacheState>,
}

impl std::fmt::Debug for ClusterCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterCache")
            .field("resync_interval", &self.resync_interval)
            .finish_non_exhaustive()
    }
}

impl ClusterCache {
    /// `resync_interval` of `None` keeps a synced snapshot until invalidated
    pub fn new(client: Arc<dyn ClusterClient>, resync_interval: Option<Duration>) -> Self {
        Self {
            client,
            resync_interval,
            state: RwLock::new(CacheState::default()),
        }
    }

    fn is_fresh(&self, state: &CacheState) -> bool {
        match (state.synced_at, self.resync_interval) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(at), Some(interval)) => at.elapsed() < interval,
        }
    }

    /// Sync the snapshot unless it is already synced and fresh
    ///
    /// A failure leaves the cache unsynced; the next call tries again.
    pub async fn ensure_synced(&self) -> Result<(), CacheError> {
        if self.is_fresh(&*self.state.read().await) {
            return Ok(());
        }
        let mut state = self.state.write().await;
        if self.is_fresh(&state) {
            return Ok(());
        }
        self.sync_locked(&mut state).await
    }

    /// Discard the snapshot and sync again
    pub async fn refresh(&self) -> Result<(), CacheError> {
        let mut state = self.state.write().await;
        self.sync_locked(&mut state).await
    }

    /// Re-run discovery only, listing objects of types not seen before
    ///
    /// Used after CRDs are applied so their kinds become resolvable.
    pub async fn refresh_types(&self) -> Result<(), CacheError> {
        let mut state = self.state.write().await;
        if state.synced_at.is_none() {
            return self.sync_locked(&mut state).await;
        }

        let discovered = self
            .client
            .discover()
            .await
            .map_err(CacheError::Discovery)?;
        let mut added = 0;
        for resource_type in discovered {
            let group_kind = resource_type.group_kind();
            if state.types.contains_key(&group_kind) {
                continue;
            }
            for obj in self.list(&resource_type).await? {
                state.objects.insert(ResourceKey::from_object(&obj), obj);
            }
            state.types.insert(group_kind, resource_type);
            added += 1;
        }
        debug!(added, "Refreshed cluster resource types");
        Ok(())
    }

    /// Drop the snapshot; the next [`Self::ensure_synced`] resyncs
    pub async fn invalidate(&self) {
        *self.state.write().await = CacheState::default();
    }

    pub async fn is_synced(&self) -> bool {
        self.state.read().await.synced_at.is_some()
    }

    /// Resource type for a manifest's `apiVersion` and `kind`
    ///
    /// The returned type is addressed at the manifest's own version.
    pub async fn resolve(&self, api_version: &str, kind: &str) -> Option<ResourceType> {
        let (group, _) = split_api_version(api_version);
        self.state
            .read()
            .await
            .types
            .get(&GroupKind::new(group, kind))
            .map(|t| t.with_api_version(api_version))
    }

    /// Cached objects accepted by `selector`, plus any cached object a target names
    pub async fn managed_live_objects(
        &self,
        targets: &[DynamicObject],
        selector: &ResourceSelector,
    ) -> Vec<DynamicObject> {
        let target_keys: HashSet<ResourceKey> =
            targets.iter().map(ResourceKey::from_object).collect();
        self.state
            .read()
            .await
            .objects
            .iter()
            .filter(|(key, obj)| target_keys.contains(*key) || selector.select(obj))
            .map(|(_, obj)| obj.clone())
            .collect()
    }

    /// Group/kinds of every cached object `selector` accepts
    pub async fn managed_kinds(&self, selector: &ResourceSelector) -> HashSet<GroupKind> {
        self.state
            .read()
            .await
            .objects
            .iter()
            .filter(|(_, obj)| selector.select(obj))
            .map(|(key, _)| key.group_kind())
            .collect()
    }

    /// List `kinds` again and replace their cached objects
    ///
    /// Kinds the server does not serve are skipped.
    pub async fn relist(&self, kinds: &HashSet<GroupKind>) -> Result<(), CacheError> {
        let types: Vec<ResourceType> = {
            let state = self.state.read().await;
            kinds
                .iter()
                .filter_map(|group_kind| state.types.get(group_kind).cloned())
                .collect()
        };

        let mut listed = Vec::with_capacity(types.len());
        for resource_type in &types {
            listed.push((resource_type.group_kind(), self.list(resource_type).await?));
        }

        let mut state = self.state.write().await;
        for (group_kind, objects) in listed {
            state.objects.retain(|key, _| key.group_kind() != group_kind);
            for obj in objects {
                state.objects.insert(ResourceKey::from_object(&obj), obj);
            }
        }
        debug!(types = types.len(), "Relisted resource types");
        Ok(())
    }

    pub async fn record_applied(&self, obj: DynamicObject) {
        let key = ResourceKey::from_object(&obj);
        self.state.write().await.objects.insert(key, obj);
    }

    pub async fn record_deleted(&self, key: &ResourceKey) {
        self.state.write().await.objects.remove(key);
    }

    pub async fn contains(&self, key: &ResourceKey) -> bool {
        self.state.read().await.objects.contains_key(key)
    }

    pub async fn object_count(&self) -> usize {
        self.state.read().await.objects.len()
    }

    async fn list(&self, resource_type: &ResourceType) -> Result<Vec<DynamicObject>, CacheError> {
        self.client
            .list(resource_type)
            .await
            .map_err(|source| CacheError::List {
                resource: resource_type.api_resource.plural.clone(),
                source,
            })
    }

    async fn sync_locked(&self, state: &mut RwLockWriteGuard<'_, CacheState>) -> Result<(), CacheError> {
        **state = CacheState::default();
        match self.full_sync().await {
            Ok(synced) => {
                **state = synced;
                metrics::increment_cache_syncs();
                info!(
                    types = state.types.len(),
                    objects = state.objects.len(),
                    "Cluster cache synced"
                );
                Ok(())
            }
            Err(e) => {
                metrics::increment_cache_sync_errors();
                warn!(error = %e, "Cluster cache sync failed");
                Err(e)
            }
        }
    }

    async fn full_sync(&self) -> Result<CacheState, CacheError> {
        let discovered = self
            .client
            .discover()
            .await
            .map_err(CacheError::Discovery)?;

        let mut synced = CacheState::default();
        for resource_type in discovered {
            for obj in self.list(&resource_type).await? {
                synced.objects.insert(ResourceKey::from_object(&obj), obj);
            }
            synced.types.insert(resource_type.group_kind(), resource_type);
        }
        synced.synced_at = Some(Instant::now());
        Ok(synced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::cluster::InMemoryCluster;

    fn object(value: serde_json::Value) -> DynamicObject {
        serde_json::from_value(value).unwrap()
    }

    fn seeded() -> Arc<InMemoryCluster> {
        let cluster = Arc::new(InMemoryCluster::new());
        cluster.insert(object(serde_json::json!({
            "apiVersion": "v1", "kind": "Namespace", "metadata": {"name": "ns1"}
        })));
        cluster.insert(object(serde_json::json!({
            "apiVersion": "v1", "kind": "ConfigMap",
            "metadata": {
                "name": "owned", "namespace": "ns1",
                "annotations": {"plugin-installer.io/owner": "ns1/demo"}
            }
        })));
        cluster.insert(object(serde_json::json!({
            "apiVersion": "v1", "kind": "ConfigMap",
            "metadata": {"name": "foreign", "namespace": "ns1"}
        })));
        cluster
    }

    #[tokio::test]
    async fn test_ensure_synced_runs_once_while_fresh() {
        let cluster = seeded();
        let cache = ClusterCache::new(Arc::clone(&cluster) as Arc<dyn ClusterClient>, None);

        cache.ensure_synced().await.unwrap();
        let after_first = cluster.calls();
        cache.ensure_synced().await.unwrap();

        assert_eq!(cluster.calls(), after_first);
        assert_eq!(after_first.discover, 1);
        assert_eq!(cache.object_count().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_cache_resyncs() {
        let cluster = seeded();
        let cache = ClusterCache::new(
            Arc::clone(&cluster) as Arc<dyn ClusterClient>,
            Some(Duration::from_secs(30)),
        );
        cache.ensure_synced().await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        cache.ensure_synced().await.unwrap();
        assert_eq!(cluster.calls().discover, 2);
    }

    #[tokio::test]
    async fn test_sync_failure_leaves_cache_unsynced() {
        let cluster = seeded();
        cluster.fail_discovery(true);
        let cache = ClusterCache::new(Arc::clone(&cluster) as Arc<dyn ClusterClient>, None);

        assert!(matches!(
            cache.ensure_synced().await,
            Err(CacheError::Discovery(_))
        ));
        assert!(!cache.is_synced().await);

        cluster.fail_discovery(false);
        cache.ensure_synced().await.unwrap();
        assert!(cache.is_synced().await);
    }

    #[tokio::test]
    async fn test_managed_live_objects_uses_selector_and_targets() {
        let cluster = seeded();
        let cache = ClusterCache::new(Arc::clone(&cluster) as Arc<dyn ClusterClient>, None);
        cache.ensure_synced().await.unwrap();

        let selector = ResourceSelector::by_plugin("ns1", "demo");
        let live = cache.managed_live_objects(&[], &selector).await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].metadata.name.as_deref(), Some("owned"));

        let target = object(serde_json::json!({
            "apiVersion": "v1", "kind": "ConfigMap",
            "metadata": {"name": "foreign", "namespace": "ns1"}
        }));
        let live = cache.managed_live_objects(&[target], &selector).await;
        assert_eq!(live.len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_types_picks_up_new_kinds() {
        let cluster = seeded();
        let cache = ClusterCache::new(Arc::clone(&cluster) as Arc<dyn ClusterClient>, None);
        cache.ensure_synced().await.unwrap();
        assert!(cache.resolve("example.io/v1", "Widget").await.is_none());

        cluster.register_type("example.io/v1", "Widget", "widgets", true);
        cache.refresh_types().await.unwrap();

        let widget = cache.resolve("example.io/v1", "Widget").await.unwrap();
        assert_eq!(widget.api_resource.plural, "widgets");
        assert!(widget.namespaced);
    }

    #[tokio::test]
    async fn test_relist_replaces_stale_objects() {
        let cluster = seeded();
        let cache = ClusterCache::new(Arc::clone(&cluster) as Arc<dyn ClusterClient>, None);
        cache.ensure_synced().await.unwrap();

        let owned = ResourceKey::new("", "ConfigMap", "ns1", "owned");
        cluster.remove(&owned);
        cluster.insert(object(serde_json::json!({
            "apiVersion": "v1", "kind": "ConfigMap",
            "metadata": {"name": "late", "namespace": "ns1"}
        })));
        assert!(cache.contains(&owned).await);

        let selector = ResourceSelector::by_plugin("ns1", "demo");
        let kinds = cache.managed_kinds(&selector).await;
        assert_eq!(kinds, HashSet::from([GroupKind::new("", "ConfigMap")]));

        cluster.reset_calls();
        cache.relist(&kinds).await.unwrap();

        assert!(!cache.contains(&owned).await);
        assert!(cache.contains(&ResourceKey::new("", "ConfigMap", "ns1", "late")).await);
        assert!(cache.contains(&ResourceKey::new("", "Namespace", "", "ns1")).await);
        assert_eq!(cluster.calls().list, 1);
        assert_eq!(cluster.calls().discover, 0);
    }

    #[tokio::test]
    async fn test_relist_skips_unserved_kinds() {
        let cluster = seeded();
        let cache = ClusterCache::new(Arc::clone(&cluster) as Arc<dyn ClusterClient>, None);
        cache.ensure_synced().await.unwrap();
        cluster.reset_calls();

        let kinds = HashSet::from([GroupKind::new("example.io", "Widget")]);
        cache.relist(&kinds).await.unwrap();
        assert_eq!(cluster.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_forces_resync() {
        let cluster = seeded();
        let cache = ClusterCache::new(Arc::clone(&cluster) as Arc<dyn ClusterClient>, None);
        cache.ensure_synced().await.unwrap();
        cache.invalidate().await;
        assert!(!cache.is_synced().await);
        cache.ensure_synced().await.unwrap();
        assert_eq!(cluster.calls().discover, 2);
    }

    #[tokio::test]
    async fn test_resolve_uses_manifest_version() {
        let cluster = seeded();
        let cache = ClusterCache::new(Arc::clone(&cluster) as Arc<dyn ClusterClient>, None);
        cache.ensure_synced().await.unwrap();
        let deployment = cache.resolve("apps/v1beta2", "Deployment").await.unwrap();
        assert_eq!(deployment.api_resource.api_version, "apps/v1beta2");
        assert_eq!(deployment.api_resource.plural, "deployments");
    }
}
