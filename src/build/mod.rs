//! # Manifest Builders
//!
//! Produce the desired manifests of a plugin from its resolved source.
//!
//! - `inline`: resources listed in the plugin itself
//! - `kustomize`: `kustomize build` of an overlay directory
//! - `directory`: plain YAML/JSON files under a directory
//! - `yaml`: multi-document parsing shared by the builders

mod directory;
mod inline;
mod kustomize;
pub mod yaml;

pub use directory::DirectoryBuilder;
pub use inline::{inline_resources, InlineBuilder};
pub use kustomize::KustomizeBuilder;

use crate::crd::Plugin;
use async_trait::async_trait;
use kube::api::DynamicObject;
use std::path::Path;

/// Renders a plugin into manifests
#[async_trait]
pub trait ManifestBuilder: Send + Sync {
    /// `dir` is the plugin's resolved source directory
    async fn build(&self, plugin: &Plugin, dir: &Path) -> anyhow::Result<Vec<DynamicObject>>;
}
