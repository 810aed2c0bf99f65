//! # Plugin Dispatcher
//!
//! Routes each plugin to the applier registered for its kind.

use crate::build::{DirectoryBuilder, InlineBuilder, KustomizeBuilder, ManifestBuilder};
use crate::config::PluginOptions;
use crate::crd::{Plugin, PluginKind, PluginStatus};
use crate::installer::error::InstallerError;
use crate::installer::native::NativeApplier;
use crate::installer::sync::SyncEngine;
use crate::source::{LocalSourceResolver, SourceResolver};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Installs and removes plugins of some kind
#[async_trait]
pub trait PluginManager: Send + Sync {
    async fn apply(
        &self,
        plugin: &Plugin,
        status: &mut PluginStatus,
        cancel: &CancellationToken,
    ) -> Result<(), InstallerError>;

    async fn remove(
        &self,
        plugin: &Plugin,
        status: &mut PluginStatus,
        cancel: &CancellationToken,
    ) -> Result<(), InstallerError>;
}

#[async_trait]
impl PluginManager for NativeApplier {
    async fn apply(
        &self,
        plugin: &Plugin,
        status: &mut PluginStatus,
        cancel: &CancellationToken,
    ) -> Result<(), InstallerError> {
        NativeApplier::apply(self, plugin, status, cancel).await
    }

    async fn remove(
        &self,
        plugin: &Plugin,
        status: &mut PluginStatus,
        cancel: &CancellationToken,
    ) -> Result<(), InstallerError> {
        NativeApplier::remove(self, plugin, status, cancel).await
    }
}

/// Kind-to-applier table
#[derive(Clone, Default)]
pub struct DelegatePluginManager {
    appliers: HashMap<PluginKind, Arc<dyn PluginManager>>,
}

impl std::fmt::Debug for DelegatePluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&str> = self.appliers.keys().map(PluginKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("DelegatePluginManager")
            .field("kinds", &kinds)
            .finish()
    }
}

impl DelegatePluginManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `applier` for `kind`, replacing any previous one
    #[must_use]
    pub fn with_applier(mut self, kind: PluginKind, applier: Arc<dyn PluginManager>) -> Self {
        self.appliers.insert(kind, applier);
        self
    }

    /// Native appliers for kustomize, template and inline plugins
    ///
    /// Helm plugins are only handled when `helm` supplies an applier.
    pub fn from_options(
        options: &PluginOptions,
        engine: SyncEngine,
        helm: Option<Arc<dyn PluginManager>>,
    ) -> Self {
        let resolver: Arc<dyn SourceResolver> = Arc::new(LocalSourceResolver);
        let native = |builder: Arc<dyn ManifestBuilder>, repo: &std::path::Path| -> Arc<dyn PluginManager> {
            Arc::new(NativeApplier::new(
                engine.clone(),
                Arc::clone(&resolver),
                builder,
                repo,
            ))
        };

        let mut manager = Self::new()
            .with_applier(
                PluginKind::Kustomize,
                native(Arc::new(KustomizeBuilder::default()), options.kustomize_dir.as_path()),
            )
            .with_applier(
                PluginKind::Template,
                native(Arc::new(DirectoryBuilder), options.plugins_dir.as_path()),
            )
            .with_applier(
                PluginKind::Inline,
                native(Arc::new(InlineBuilder), options.plugins_dir.as_path()),
            );
        if let Some(helm) = helm {
            manager = manager.with_applier(PluginKind::Helm, helm);
        }
        manager
    }

    #[must_use]
    pub fn supports(&self, kind: PluginKind) -> bool {
        self.appliers.contains_key(&kind)
    }

    fn applier(&self, kind: PluginKind) -> Result<&Arc<dyn PluginManager>, InstallerError> {
        debug!(%kind, "Dispatching plugin");
        self.appliers
            .get(&kind)
            .ok_or_else(|| InstallerError::UnknownPluginKind(kind.to_string()))
    }
}

#[async_trait]
impl PluginManager for DelegatePluginManager {
    async fn apply(
        &self,
        plugin: &Plugin,
        status: &mut PluginStatus,
        cancel: &CancellationToken,
    ) -> Result<(), InstallerError> {
        self.applier(plugin.kind)?.apply(plugin, status, cancel).await
    }

    async fn remove(
        &self,
        plugin: &Plugin,
        status: &mut PluginStatus,
        cancel: &CancellationToken,
    ) -> Result<(), InstallerError> {
        self.applier(plugin.kind)?.remove(plugin, status, cancel).await
    }
}
