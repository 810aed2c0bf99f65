//! # Native Applier
//!
//! Installs and removes plugins by building their manifests locally and
//! converging the cluster with the [`SyncEngine`].
//!
//! ## Apply
//!
//! 1. Default `repo` to the local source directory and `path` to the plugin name
//! 2. Resolve the source and build manifests with the kind's builder
//! 3. Append inline resources (except for `inline` plugins, whose builder produced them)
//! 4. Stamp ownership on every manifest
//! 5. Skip everything if the plugin is installed with canonically equal values
//! 6. Sync, classify, and record the outcome on the status
//!
//! ## Remove
//!
//! Syncs an empty desired set with the same ownership selector, pruning
//! everything the plugin owns. Only `Installed` and `Failed` plugins are
//! removed; see [`NativeApplier::remove`].

use crate::build::{inline_resources, ManifestBuilder};
use crate::constants::DEFAULT_PLUGIN_VERSION;
use crate::crd::{Plugin, PluginKind, PluginPhase, PluginStatus};
use crate::installer::classify::classify_result;
use crate::installer::error::InstallerError;
use crate::installer::ownership::{stamp_ownership, ResourceSelector};
use crate::installer::sync::{AlwaysHealthy, HealthCheck, SyncEngine, SyncOptions, SyncResult};
use crate::installer::values::canonical_eq;
use crate::observability::metrics;
use crate::source::SourceResolver;
use chrono::Utc;
use kube::api::DynamicObject;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

#[derive(Clone)]
pub struct NativeApplier {
    engine: SyncEngine,
    resolver: Arc<dyn SourceResolver>,
    builder: Arc<dyn ManifestBuilder>,
    health: Arc<dyn HealthCheck>,
    default_repo: PathBuf,
}

impl std::fmt::Debug for NativeApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeApplier")
            .field("default_repo", &self.default_repo)
            .finish_non_exhaustive()
    }
}

impl NativeApplier {
    /// `default_repo` is made absolute; it is used when a plugin has no `repo`
    pub fn new(
        engine: SyncEngine,
        resolver: Arc<dyn SourceResolver>,
        builder: Arc<dyn ManifestBuilder>,
        default_repo: impl AsRef<Path>,
    ) -> Self {
        let default_repo = default_repo.as_ref();
        Self {
            engine,
            resolver,
            builder,
            health: Arc::new(AlwaysHealthy),
            default_repo: std::path::absolute(default_repo).unwrap_or_else(|_| default_repo.to_path_buf()),
        }
    }

    /// Replace the health check used to decide when a sync has converged
    #[must_use]
    pub fn with_health(mut self, health: Arc<dyn HealthCheck>) -> Self {
        self.health = health;
        self
    }

    #[must_use]
    pub fn default_repo(&self) -> &Path {
        &self.default_repo
    }

    fn sync_options(&self, plugin: &Plugin) -> SyncOptions {
        SyncOptions {
            health: Arc::clone(&self.health),
            ..SyncOptions::with_selector(ResourceSelector::by_plugin(&plugin.namespace, &plugin.name))
        }
    }

    /// Desired manifests of `plugin`, stamped with its ownership
    pub async fn render(&self, plugin: &Plugin) -> Result<Vec<DynamicObject>, InstallerError> {
        let mut plugin = plugin.clone();
        if plugin.repo.is_empty() {
            plugin.repo = format!("file://{}", self.default_repo.display());
        }
        if plugin.path.is_empty() {
            plugin.path.clone_from(&plugin.name);
        }

        let dir = self
            .resolver
            .resolve(&plugin.repo, &plugin.version, &plugin.path)
            .await?;
        let mut manifests = self
            .builder
            .build(&plugin, &dir)
            .await
            .map_err(InstallerError::Build)?;
        if plugin.kind != PluginKind::Inline {
            manifests.extend(inline_resources(&plugin).map_err(InstallerError::Build)?);
        }

        stamp_ownership(&mut manifests, &plugin.namespace, &plugin.name);
        debug!(plugin = %plugin.owner(), manifests = manifests.len(), "Rendered plugin");
        Ok(manifests)
    }

    async fn sync(
        &self,
        plugin: &Plugin,
        manifests: Vec<DynamicObject>,
        cancel: &CancellationToken,
    ) -> Result<SyncResult, InstallerError> {
        let options = self.sync_options(plugin);
        Ok(self
            .engine
            .run(&plugin.namespace, manifests, &options, cancel)
            .await?)
    }

    /// Install or upgrade `plugin`
    ///
    /// On failure the phase is left as it was; `notes` still reflects any
    /// completed sync.
    pub async fn apply(
        &self,
        plugin: &Plugin,
        status: &mut PluginStatus,
        cancel: &CancellationToken,
    ) -> Result<(), InstallerError> {
        let span = info_span!("plugin.apply", plugin = %plugin.owner(), kind = %plugin.kind);
        let result = self.apply_inner(plugin, status, cancel).instrument(span).await;
        metrics::increment_applies(if result.is_ok() { "success" } else { "error" });
        result
    }

    async fn apply_inner(
        &self,
        plugin: &Plugin,
        status: &mut PluginStatus,
        cancel: &CancellationToken,
    ) -> Result<(), InstallerError> {
        let manifests = self.render(plugin).await?;

        if status.is_installed() && canonical_eq(&status.values, &plugin.values) {
            info!("plugin is up to date and has no changes");
            metrics::increment_idempotent_skips();
            return Ok(());
        }

        let result = self.sync(plugin, manifests, cancel).await?;
        classify_result(&result, status)?;

        let now = Utc::now();
        status.phase = Some(PluginPhase::Installed);
        status.values.clone_from(&plugin.values);
        status.version = if plugin.version.is_empty() {
            DEFAULT_PLUGIN_VERSION.to_string()
        } else {
            plugin.version.clone()
        };
        status.message = result.message;
        status.name.clone_from(&plugin.name);
        status.namespace.clone_from(&plugin.namespace);
        status.created_at.get_or_insert(now);
        status.upgraded_at = Some(now);
        info!(version = %status.version, "Plugin installed");
        Ok(())
    }

    /// Remove everything `plugin` owns
    ///
    /// | phase | effect |
    /// |---|---|
    /// | `Installed`, `Failed` | prune owned objects, then `Removed` |
    /// | `None`, `Removed` | nothing |
    /// | unset | set to `None` without contacting the cluster |
    pub async fn remove(
        &self,
        plugin: &Plugin,
        status: &mut PluginStatus,
        cancel: &CancellationToken,
    ) -> Result<(), InstallerError> {
        let span = info_span!("plugin.remove", plugin = %plugin.owner(), kind = %plugin.kind);
        let result = self.remove_inner(plugin, status, cancel).instrument(span).await;
        metrics::increment_removes(if result.is_ok() { "success" } else { "error" });
        result
    }

    async fn remove_inner(
        &self,
        plugin: &Plugin,
        status: &mut PluginStatus,
        cancel: &CancellationToken,
    ) -> Result<(), InstallerError> {
        match status.phase {
            Some(PluginPhase::Installed | PluginPhase::Failed) => {}
            Some(PluginPhase::None | PluginPhase::Removed) => {
                info!("plugin is removed or not installed");
                return Ok(());
            }
            None => {
                info!("plugin is not installed, marking as not installed");
                status.phase = Some(PluginPhase::None);
                return Ok(());
            }
        }

        let result = self.sync(plugin, Vec::new(), cancel).await?;
        classify_result(&result, status)?;

        status.phase = Some(PluginPhase::Removed);
        status.message = result.message;
        status.name.clone_from(&plugin.name);
        status.namespace.clone_from(&plugin.namespace);
        status.deleted_at = Some(Utc::now());
        info!("Plugin removed");
        Ok(())
    }
}
