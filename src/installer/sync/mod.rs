//! # Sync Engine
//!
//! Drives a desired manifest set to convergence.
//!
//! - `engine`: the completion poll loop
//! - `context`: state of one run, advanced one wave per step
//! - `health`: health assessment of applied objects
//! - `poll`: wait policy between steps
//! - `result`: phase and per-resource outcomes

mod context;
mod engine;
mod health;
mod poll;
mod result;

pub use context::SyncContext;
pub use engine::SyncEngine;
pub use health::{AlwaysHealthy, HealthCheck, HealthStatus};
pub use poll::PollPolicy;
pub use result::{OperationPhase, ResourceSyncResult, ResultCode, SyncResult};

use crate::installer::cache::CacheError;
use crate::installer::ownership::ResourceSelector;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Annotations marking a manifest as a lifecycle hook rather than a resource
pub const HOOK_ANNOTATIONS: &[&str] = &["helm.sh/hook", "argocd.argoproj.io/hook"];

#[derive(Clone)]
pub struct SyncOptions {
    /// Delete owned objects that are no longer desired
    pub prune: bool,
    /// Create target namespaces that do not exist yet
    pub create_namespace: bool,
    /// Leave hook manifests out of the sync
    pub skip_hooks: bool,
    pub health: Arc<dyn HealthCheck>,
    pub selector: ResourceSelector,
}

impl std::fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOptions")
            .field("prune", &self.prune)
            .field("create_namespace", &self.create_namespace)
            .field("skip_hooks", &self.skip_hooks)
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            prune: true,
            create_namespace: true,
            skip_hooks: true,
            health: Arc::new(AlwaysHealthy),
            selector: ResourceSelector::none(),
        }
    }
}

impl SyncOptions {
    /// Default options scoped to `selector`
    #[must_use]
    pub fn with_selector(selector: ResourceSelector) -> Self {
        Self {
            selector,
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("sync cancelled: {}", .last.message)]
    Cancelled { last: SyncResult },

    #[error("sync did not complete within {waited:?}: {}", .last.message)]
    Timeout { waited: Duration, last: SyncResult },
}
