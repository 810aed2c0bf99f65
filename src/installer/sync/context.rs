//! # Sync Context
//!
//! State of one sync run. Each call to [`SyncContext::sync`] advances the run
//! by at most one wave; the engine's poll loop drives it to completion.
//!
//! A context is counted in the engine's active total from creation until
//! [`SyncContext::terminate`], which `Drop` calls on every exit path.

use super::health::HealthStatus;
use super::result::{OperationPhase, ResourceSyncResult, ResultCode, SyncResult};
use super::SyncOptions;
use crate::installer::cache::ClusterCache;
use crate::installer::cluster::ClusterClient;
use crate::installer::reconcile::{SyncAction, SyncPlan, SyncTask, PRUNE_WAVE};
use crate::installer::resource::{api_version, kind, ResourceKey, ResourceType};
use crate::observability::metrics;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{ApiResource, DynamicObject};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct SyncContext {
    id: Uuid,
    client: Arc<dyn ClusterClient>,
    cache: Arc<ClusterCache>,
    options: SyncOptions,
    plan: SyncPlan,
    waves: VecDeque<u8>,
    namespaces_ensured: bool,
    types_refreshed: bool,
    pending_health: Vec<DynamicObject>,
    result: SyncResult,
    active: Arc<AtomicUsize>,
    terminated: bool,
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("id", &self.id)
            .field("namespace", &self.plan.namespace)
            .field("waves", &self.waves)
            .field("phase", &self.result.phase)
            .finish_non_exhaustive()
    }
}

impl SyncContext {
    pub(crate) fn new(
        client: Arc<dyn ClusterClient>,
        cache: Arc<ClusterCache>,
        options: SyncOptions,
        plan: SyncPlan,
        active: Arc<AtomicUsize>,
    ) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        let waves = plan.waves().into_iter().collect();
        Self {
            id: Uuid::new_v4(),
            client,
            cache,
            options,
            plan,
            waves,
            namespaces_ensured: false,
            types_refreshed: false,
            pending_health: Vec::new(),
            result: SyncResult::default(),
            active,
            terminated: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current phase, message and per-resource results
    #[must_use]
    pub fn state(&self) -> &SyncResult {
        &self.result
    }

    /// Advance the run by one step
    pub async fn sync(&mut self) {
        if self.result.phase.completed() {
            return;
        }
        metrics::increment_sync_steps();

        if !self.namespaces_ensured && self.options.create_namespace {
            self.namespaces_ensured = true;
            if !self.ensure_namespaces().await {
                return;
            }
        }

        if !self.pending_health.is_empty() {
            let pending = std::mem::take(&mut self.pending_health);
            let current = self.refetch(pending).await;
            if !self.assess_health(current).await {
                return;
            }
        }

        let Some(wave) = self.waves.pop_front() else {
            self.succeed();
            return;
        };

        let tasks: Vec<SyncTask> = self.plan.wave(wave).cloned().collect();
        let mut failed = false;
        let mut applied = Vec::new();
        for task in &tasks {
            let (outcome, live) = self.execute(task).await;
            if outcome.status == ResultCode::SyncFailed {
                failed = true;
            }
            applied.extend(live);
            self.result.resources.push(outcome);
        }

        if failed {
            let what = if wave == PRUNE_WAVE { "prune" } else { "apply" };
            self.fail(format!("one or more objects failed to {what}"));
            return;
        }
        if !self.assess_health(applied).await {
            return;
        }
        if self.waves.is_empty() {
            self.succeed();
        } else {
            self.result.message = format!("wave {wave} synced, {} remaining", self.waves.len());
            debug!(sync_id = %self.id, wave, "Wave synced");
        }
    }

    /// Release the context; later calls are no-ops
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.active.fetch_sub(1, Ordering::SeqCst);
        debug!(sync_id = %self.id, phase = %self.result.phase, "Sync context terminated");
    }

    fn succeed(&mut self) {
        self.result.phase = OperationPhase::Succeeded;
        self.result.message = "successfully synced (all tasks run)".to_string();
        info!(
            sync_id = %self.id,
            namespace = %self.plan.namespace,
            resources = self.result.resources.len(),
            "Sync succeeded"
        );
    }

    fn fail(&mut self, message: String) {
        warn!(sync_id = %self.id, namespace = %self.plan.namespace, %message, "Sync failed");
        self.result.phase = OperationPhase::Failed;
        self.result.message = message;
    }

    /// Returns false when the run can not continue in this step
    async fn assess_health(&mut self, objects: Vec<DynamicObject>) -> bool {
        let mut progressing = Vec::new();
        for obj in objects {
            match self.options.health.check(&obj).await {
                HealthStatus::Healthy => {}
                HealthStatus::Progressing => progressing.push(obj),
                HealthStatus::Degraded(reason) => {
                    let key = ResourceKey::from_object(&obj);
                    self.fail(format!("{key} is degraded: {reason}"));
                    return false;
                }
            }
        }
        if progressing.is_empty() {
            return true;
        }
        self.result.message = format!(
            "waiting for {} to become healthy",
            ResourceKey::from_object(&progressing[0])
        );
        self.pending_health = progressing;
        false
    }

    /// Create every namespace targets are applied into, once per run
    ///
    /// Created namespaces are not owned by the plugin and are not reported.
    async fn ensure_namespaces(&mut self) -> bool {
        let declared: Vec<String> = self
            .plan
            .tasks
            .iter()
            .filter(|t| t.action != SyncAction::Prune && t.key.kind == "Namespace" && t.key.group.is_empty())
            .map(|t| t.key.name.clone())
            .collect();
        let namespace_type = ResourceType {
            api_resource: ApiResource::erase::<Namespace>(&()),
            namespaced: false,
        };

        for namespace in self.plan.target_namespaces() {
            let key = ResourceKey::new("", "Namespace", "", namespace.as_str());
            if declared.contains(&namespace) || self.cache.contains(&key).await {
                continue;
            }
            let manifest = DynamicObject::new(&namespace, &namespace_type.api_resource);
            match self.client.apply(&namespace_type, &manifest).await {
                Ok(created) => {
                    info!(sync_id = %self.id, %namespace, "Created namespace");
                    self.cache.record_applied(created).await;
                }
                Err(e) => {
                    self.result.resources.push(ResourceSyncResult::new(
                        key,
                        ResultCode::SyncFailed,
                        e.to_string(),
                    ));
                    self.fail(format!("failed to create namespace {namespace}"));
                    return false;
                }
            }
        }
        true
    }

    async fn resolve(&mut self, obj: &DynamicObject) -> Option<ResourceType> {
        let (api_version, kind) = (api_version(obj), kind(obj));
        if let Some(found) = self.cache.resolve(api_version, kind).await {
            return Some(found);
        }
        if !self.types_refreshed {
            self.types_refreshed = true;
            debug!(sync_id = %self.id, %api_version, %kind, "Unknown kind, refreshing discovery");
            if let Err(e) = self.cache.refresh_types().await {
                warn!(sync_id = %self.id, error = %e, "Discovery refresh failed");
            }
            return self.cache.resolve(api_version, kind).await;
        }
        None
    }

    /// Run one task, returning its outcome and the object to health check
    async fn execute(&mut self, task: &SyncTask) -> (ResourceSyncResult, Option<DynamicObject>) {
        let key = task.key.clone();
        match task.action {
            SyncAction::Unchanged => (
                ResourceSyncResult::new(key, ResultCode::Synced, "unchanged"),
                task.live.clone(),
            ),
            SyncAction::Create | SyncAction::Update => {
                let Some(target) = task.target.as_ref() else {
                    return (
                        ResourceSyncResult::new(key, ResultCode::SyncFailed, "missing manifest"),
                        None,
                    );
                };
                let Some(resource_type) = self.resolve(target).await else {
                    let message = format!(
                        "unknown resource type {}/{}",
                        api_version(target),
                        kind(target)
                    );
                    return (ResourceSyncResult::new(key, ResultCode::SyncFailed, message), None);
                };
                match self.client.apply(&resource_type, target).await {
                    Ok(applied) => {
                        self.cache.record_applied(applied.clone()).await;
                        let verb = if task.action == SyncAction::Create {
                            "created"
                        } else {
                            "configured"
                        };
                        debug!(sync_id = %self.id, resource = %key, verb, "Applied");
                        (ResourceSyncResult::new(key, ResultCode::Synced, verb), Some(applied))
                    }
                    Err(e) => {
                        warn!(sync_id = %self.id, resource = %key, error = %e, "Apply failed");
                        (ResourceSyncResult::new(key, ResultCode::SyncFailed, e.to_string()), None)
                    }
                }
            }
            SyncAction::Prune => (self.prune(task).await, None),
        }
    }

    async fn prune(&mut self, task: &SyncTask) -> ResourceSyncResult {
        let key = task.key.clone();
        if !self.options.prune {
            return ResourceSyncResult::new(key, ResultCode::PruneSkipped, "ignored (requires pruning)");
        }
        let Some(live) = task.live.as_ref() else {
            return ResourceSyncResult::new(key, ResultCode::Pruned, "pruned");
        };
        let Some(resource_type) = self.resolve(live).await else {
            let message = format!("unknown resource type {}/{}", api_version(live), kind(live));
            return ResourceSyncResult::new(key, ResultCode::SyncFailed, message);
        };
        match self.client.delete(&resource_type, &key).await {
            Ok(()) => {
                self.cache.record_deleted(&key).await;
                metrics::increment_resources_pruned(1);
                debug!(sync_id = %self.id, resource = %key, "Pruned");
                ResourceSyncResult::new(key, ResultCode::Pruned, "pruned")
            }
            Err(e) if e.is_not_found() => {
                self.cache.record_deleted(&key).await;
                ResourceSyncResult::new(key, ResultCode::Pruned, "already gone")
            }
            Err(e) => {
                warn!(sync_id = %self.id, resource = %key, error = %e, "Prune failed");
                ResourceSyncResult::new(key, ResultCode::SyncFailed, e.to_string())
            }
        }
    }

    /// Current server state of objects waiting to become healthy
    ///
    /// An object that can not be fetched is checked as last seen.
    async fn refetch(&mut self, objects: Vec<DynamicObject>) -> Vec<DynamicObject> {
        let mut current = Vec::with_capacity(objects.len());
        for obj in objects {
            let key = ResourceKey::from_object(&obj);
            let Some(resource_type) = self.resolve(&obj).await else {
                current.push(obj);
                continue;
            };
            match self.client.get(&resource_type, &key).await {
                Ok(Some(live)) => {
                    self.cache.record_applied(live.clone()).await;
                    current.push(live);
                }
                Ok(None) => {
                    debug!(sync_id = %self.id, resource = %key, "Object gone while waiting for health");
                    self.cache.record_deleted(&key).await;
                    current.push(obj);
                }
                Err(e) => {
                    warn!(sync_id = %self.id, resource = %key, error = %e, "Failed to fetch object for health check");
                    current.push(obj);
                }
            }
        }
        current
    }
}

impl Drop for SyncContext {
    fn drop(&mut self) {
        self.terminate();
    }
}
