//! # Cluster Access
//!
//! The narrow seam between the installer and a Kubernetes API server.
//!
//! - [`KubeCluster`] talks to a real cluster through `kube`
//! - [`InMemoryCluster`] keeps objects in memory for tests and dry runs

mod kubernetes;
mod memory;

pub use kubernetes::KubeCluster;
pub use memory::{CallCounts, InMemoryCluster};

use crate::installer::resource::{ResourceKey, ResourceType};
use async_trait::async_trait;
use kube::api::DynamicObject;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error("API discovery failed: {0}")]
    Discovery(String),

    #[error("{0} not found")]
    NotFound(ResourceKey),

    #[error("unknown resource type {api_version}/{kind}")]
    UnknownResourceType { api_version: String, kind: String },

    #[error("{key} rejected: {message}")]
    Rejected { key: ResourceKey, message: String },
}

impl ClusterError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Kube(kube::Error::Api(api_err)) => api_err.code == 404,
            _ => false,
        }
    }
}

/// Operations the installer needs from a cluster
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Every listable resource type the server offers, at its preferred version
    async fn discover(&self) -> Result<Vec<ResourceType>, ClusterError>;

    /// All objects of one type, across namespaces, with `types` populated
    async fn list(&self, resource_type: &ResourceType) -> Result<Vec<DynamicObject>, ClusterError>;

    /// Server-side apply of one object, returning the object as stored
    async fn apply(
        &self,
        resource_type: &ResourceType,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClusterError>;

    /// Current state of one object, `None` when it does not exist
    async fn get(
        &self,
        resource_type: &ResourceType,
        key: &ResourceKey,
    ) -> Result<Option<DynamicObject>, ClusterError>;

    /// Delete one object; a missing object is reported through [`ClusterError::is_not_found`]
    async fn delete(&self, resource_type: &ResourceType, key: &ResourceKey) -> Result<(), ClusterError>;
}
