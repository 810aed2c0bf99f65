//! Health assessment of applied objects.

use async_trait::async_trait;
use kube::api::DynamicObject;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    /// Not ready yet; the sync keeps running and re-checks on the next step
    Progressing,
    Degraded(String),
}

/// Decides whether an applied object has converged
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self, object: &DynamicObject) -> HealthStatus;
}

/// Treats every object as healthy as soon as it is applied
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysHealthy;

#[async_trait]
impl HealthCheck for AlwaysHealthy {
    async fn check(&self, _object: &DynamicObject) -> HealthStatus {
        HealthStatus::Healthy
    }
}
