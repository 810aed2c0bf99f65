//! # Plugin
//!
//! Desired state of a single plugin installation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Opaque configuration passed through to manifest construction
pub type Values = BTreeMap<String, serde_json::Value>;

/// Kind of plugin, selects the applier responsible for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    /// Helm chart, installed by an external Helm applier
    Helm,
    /// Kustomize overlay, rendered with `kustomize build`
    Kustomize,
    /// Directory of plain manifests
    Template,
    /// Resources listed inline in the plugin
    Inline,
}

impl PluginKind {
    /// All plugin kinds, in declaration order
    pub const ALL: [PluginKind; 4] = [
        PluginKind::Helm,
        PluginKind::Kustomize,
        PluginKind::Template,
        PluginKind::Inline,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::Helm => "helm",
            PluginKind::Kustomize => "kustomize",
            PluginKind::Template => "template",
            PluginKind::Inline => "inline",
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PluginKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown plugin kind '{s}'"))
    }
}

/// Plugin desired state
///
/// Immutable for the duration of one apply cycle; appliers work on a resolved copy.
///
/// # Example
///
/// ```yaml
/// kind: inline
/// name: demo
/// namespace: ns1
/// resources:
///   - apiVersion: v1
///     kind: ConfigMap
///     metadata:
///       name: cm-a
///     data:
///       key: value
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Plugin {
    /// Kind of plugin, selects the applier
    pub kind: PluginKind,
    /// Plugin name, part of the ownership identity
    pub name: String,
    /// Namespace the plugin installs into, part of the ownership identity
    pub namespace: String,
    /// Manifest source repository (e.g. `file:///srv/plugins`)
    /// Empty means the applier's default local source
    #[serde(default)]
    pub repo: String,
    /// Version of the manifest source
    #[serde(default)]
    pub version: String,
    /// Path inside the repository
    /// Empty means the plugin name
    #[serde(default)]
    pub path: String,
    /// Inline manifest bodies, as JSON objects or YAML strings
    #[serde(default)]
    pub resources: Vec<serde_json::Value>,
    /// Configuration passed through to manifest construction
    #[serde(default)]
    pub values: Values,
}

impl Plugin {
    /// Ownership identity of this plugin, `<namespace>/<name>`
    #[must_use]
    pub fn owner(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}
