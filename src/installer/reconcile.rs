//! # Reconciler
//!
//! Compares desired manifests with the live objects a plugin owns and
//! produces a [`SyncPlan`]: one task per object, grouped into waves.
//!
//! Apply waves follow [`kind_priority`] so namespaces and CRDs land before the
//! objects that need them. Pruning runs last, in reverse priority.

use crate::installer::cache::ClusterCache;
use crate::installer::diff;
use crate::installer::resource::{api_version, kind, kind_priority, ResourceKey};
use kube::api::DynamicObject;
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Wave holding every prune task
pub const PRUNE_WAVE: u8 = u8::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Create,
    Update,
    Unchanged,
    Prune,
}

#[derive(Debug, Clone)]
pub struct SyncTask {
    pub key: ResourceKey,
    pub action: SyncAction,
    /// Desired manifest; `None` for prune tasks
    pub target: Option<DynamicObject>,
    pub live: Option<DynamicObject>,
    pub wave: u8,
}

impl SyncTask {
    /// The manifest this task acts on, desired if present else live
    #[must_use]
    pub fn object(&self) -> Option<&DynamicObject> {
        self.target.as_ref().or(self.live.as_ref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub namespace: String,
    pub tasks: Vec<SyncTask>,
}

impl SyncPlan {
    /// Distinct waves in execution order
    #[must_use]
    pub fn waves(&self) -> Vec<u8> {
        self.tasks
            .iter()
            .map(|t| t.wave)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn wave(&self, wave: u8) -> impl Iterator<Item = &SyncTask> {
        self.tasks.iter().filter(move |t| t.wave == wave)
    }

    /// Namespaces that namespaced targets will be applied into
    #[must_use]
    pub fn target_namespaces(&self) -> BTreeSet<String> {
        self.tasks
            .iter()
            .filter(|t| t.action != SyncAction::Prune && !t.key.namespace.is_empty())
            .map(|t| t.key.namespace.clone())
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Default namespaces, clear them on cluster-scoped kinds, and drop duplicates
///
/// Kinds the cache cannot resolve are treated as namespaced. When two manifests
/// share a key the later one wins.
pub async fn normalize_targets(
    targets: Vec<DynamicObject>,
    namespace: &str,
    cache: &ClusterCache,
) -> Vec<DynamicObject> {
    let mut normalized: Vec<DynamicObject> = Vec::with_capacity(targets.len());
    let mut index: HashMap<ResourceKey, usize> = HashMap::new();

    for mut target in targets {
        let namespaced = cache
            .resolve(api_version(&target), kind(&target))
            .await
            .is_none_or(|t| t.namespaced);
        if !namespaced {
            target.metadata.namespace = None;
        } else if target.metadata.namespace.as_deref().is_none_or(str::is_empty) {
            target.metadata.namespace = Some(namespace.to_string());
        }

        let key = ResourceKey::from_object(&target);
        if let Some(&i) = index.get(&key) {
            warn!(resource = %key, "Duplicate manifest, keeping the last one");
            normalized[i] = target;
        } else {
            index.insert(key, normalized.len());
            normalized.push(target);
        }
    }
    normalized
}

/// Plan the sync of `targets` against the `live` objects the plugin owns
#[must_use]
pub fn reconcile(targets: &[DynamicObject], live: Vec<DynamicObject>, namespace: &str) -> SyncPlan {
    let mut live: HashMap<ResourceKey, DynamicObject> = live
        .into_iter()
        .map(|obj| (ResourceKey::from_object(&obj), obj))
        .collect();

    let mut tasks: Vec<SyncTask> = targets
        .iter()
        .map(|target| {
            let key = ResourceKey::from_object(target);
            let existing = live.remove(&key);
            let action = match &existing {
                None => SyncAction::Create,
                Some(obj) if diff::is_modified(target, obj) => SyncAction::Update,
                Some(_) => SyncAction::Unchanged,
            };
            SyncTask {
                wave: kind_priority(&key.kind),
                key,
                action,
                target: Some(target.clone()),
                live: existing,
            }
        })
        .collect();
    tasks.sort_by_key(|t| t.wave);

    let mut prunes: Vec<SyncTask> = live
        .into_iter()
        .map(|(key, obj)| SyncTask {
            key,
            action: SyncAction::Prune,
            target: None,
            live: Some(obj),
            wave: PRUNE_WAVE,
        })
        .collect();
    prunes.sort_by(|a, b| {
        Reverse(kind_priority(&a.key.kind))
            .cmp(&Reverse(kind_priority(&b.key.kind)))
            .then_with(|| a.key.cmp(&b.key))
    });
    tasks.extend(prunes);

    SyncPlan {
        namespace: namespace.to_string(),
        tasks,
    }
}
