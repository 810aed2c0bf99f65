//! # Initialization
//!
//! Builds the long-lived installer components: Kubernetes client, cluster
//! cache, sync engine and plugin dispatcher.
//!
//! The cluster cache is created here once and shared by every applier. It is
//! synced eagerly; a failed startup sync is logged and retried by the first
//! operation that needs the cache.

use crate::config::InstallerConfig;
use crate::installer::cache::ClusterCache;
use crate::installer::cluster::{ClusterClient, KubeCluster};
use crate::installer::delegate::{DelegatePluginManager, PluginManager};
use crate::installer::sync::SyncEngine;
use crate::observability;
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::{info, warn};

/// Components needed to install and remove plugins
#[derive(Clone)]
pub struct Installer {
    pub cache: Arc<ClusterCache>,
    pub engine: SyncEngine,
    pub manager: DelegatePluginManager,
    pub config: InstallerConfig,
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("manager", &self.manager)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Connect to the cluster from the ambient kubeconfig and assemble the installer
///
/// `helm` is registered for the `helm` plugin kind when supplied.
pub async fn initialize(
    config: InstallerConfig,
    helm: Option<Arc<dyn PluginManager>>,
) -> Result<Installer> {
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let cluster: Arc<dyn ClusterClient> = Arc::new(KubeCluster::new(client, &config.field_manager));

    Ok(assemble(cluster, config, helm).await)
}

/// Assemble the installer on top of any cluster client
pub async fn assemble(
    cluster: Arc<dyn ClusterClient>,
    config: InstallerConfig,
    helm: Option<Arc<dyn PluginManager>>,
) -> Installer {
    let cache = Arc::new(ClusterCache::new(
        Arc::clone(&cluster),
        config.cache_resync_interval(),
    ));
    if let Err(e) = cache.ensure_synced().await {
        warn!(error = %e, "Initial cluster cache sync failed, will retry on first use");
    }

    let engine = SyncEngine::new(cluster, Arc::clone(&cache), config.poll_policy());
    let options = config.plugin_options();
    info!(
        plugins_dir = %options.plugins_dir.display(),
        kustomize_dir = %options.kustomize_dir.display(),
        helm = helm.is_some(),
        "Plugin appliers configured"
    );
    let manager = DelegatePluginManager::from_options(&options, engine.clone(), helm);

    Installer {
        cache,
        engine,
        manager,
        config,
    }
}
