//! # Kustomize Builder
//!
//! Executes `kustomize build` on a plugin's source directory and parses the
//! rendered stream. Overlays, patches and generators are applied by kustomize
//! itself, so the installer only ever sees final manifests.

use super::yaml::parse_manifests;
use super::ManifestBuilder;
use crate::crd::Plugin;
use crate::observability::metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::api::DynamicObject;
use std::path::Path;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, error, info, info_span, Instrument};

const KUSTOMIZATION_FILES: &[&str] = &["kustomization.yaml", "kustomization.yml", "Kustomization"];

#[derive(Debug, Clone)]
pub struct KustomizeBuilder {
    binary: String,
}

impl Default for KustomizeBuilder {
    fn default() -> Self {
        Self::new("kustomize")
    }
}

impl KustomizeBuilder {
    /// Builder running `binary build <dir>`
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, dir: &Path) -> Result<Vec<DynamicObject>> {
        if !dir.exists() {
            return Err(anyhow::anyhow!(
                "Kustomize path does not exist: {}",
                dir.display()
            ));
        }
        if !KUSTOMIZATION_FILES.iter().any(|f| dir.join(f).exists()) {
            return Err(anyhow::anyhow!(
                "kustomization.yaml not found at: {}",
                dir.display()
            ));
        }

        info!("Running kustomize build on path: {}", dir.display());

        let output = Command::new(&self.binary)
            .arg("build")
            .arg(dir)
            .current_dir(dir)
            .output()
            .await
            .with_context(|| format!("Failed to execute {} build", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("Kustomize build failed: {}", stderr);
            return Err(anyhow::anyhow!("Kustomize build failed: {}", stderr.trim()));
        }

        let yaml_output = String::from_utf8(output.stdout)
            .context("Failed to decode kustomize output as UTF-8")?;

        debug!("Kustomize build succeeded, parsing output...");
        parse_manifests(&yaml_output).context("Failed to parse kustomize output")
    }
}

#[async_trait]
impl ManifestBuilder for KustomizeBuilder {
    async fn build(&self, plugin: &Plugin, dir: &Path) -> Result<Vec<DynamicObject>> {
        let span = info_span!("kustomize.build", plugin = %plugin.owner(), path = %dir.display());
        let start = Instant::now();

        let result = self.run(dir).instrument(span).await;
        match &result {
            Ok(manifests) => {
                metrics::increment_kustomize_build_total();
                metrics::observe_kustomize_build_duration(start.elapsed().as_secs_f64());
                info!(
                    plugin = %plugin.owner(),
                    manifests = manifests.len(),
                    "Rendered kustomize overlay"
                );
            }
            Err(_) => metrics::increment_kustomize_build_errors_total(),
        }
        result
    }
}
