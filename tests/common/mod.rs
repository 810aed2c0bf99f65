//! Common test utilities for installer integration tests
//!
//! Builds an installer on top of an in-memory cluster so whole apply/remove
//! cycles run without a Kubernetes API server.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use kube::api::DynamicObject;
use plugin_installer::config::InstallerConfig;
use plugin_installer::crd::{Plugin, PluginKind};
use plugin_installer::installer::cluster::{ClusterClient, InMemoryCluster};
use plugin_installer::installer::resource::ResourceKey;
use plugin_installer::runtime::{assemble, Installer};
use serde_json::{json, Value};
use std::sync::{Arc, Once};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing once per test binary (respects RUST_LOG)
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Installer wired to an in-memory cluster
pub struct Harness {
    pub cluster: Arc<InMemoryCluster>,
    pub installer: Installer,
}

/// Config with a short poll interval so multi-wave syncs finish quickly
pub fn test_config() -> InstallerConfig {
    InstallerConfig {
        sync_poll_interval_ms: 10,
        ..InstallerConfig::default()
    }
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_cluster(InMemoryCluster::new()).await
    }

    /// Assemble on top of a pre-seeded cluster; the cache syncs from it at startup
    pub async fn with_cluster(cluster: InMemoryCluster) -> Self {
        Self::with_config(cluster, test_config()).await
    }

    pub async fn with_config(cluster: InMemoryCluster, config: InstallerConfig) -> Self {
        init_tracing();
        let cluster = Arc::new(cluster);
        let client: Arc<dyn ClusterClient> = Arc::clone(&cluster) as Arc<dyn ClusterClient>;
        let installer = assemble(client, config, None).await;
        Self { cluster, installer }
    }
}

pub fn object(value: Value) -> DynamicObject {
    serde_json::from_value(value).expect("valid manifest")
}

pub fn namespace(name: &str) -> DynamicObject {
    object(json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {"name": name}}))
}

/// Inline ConfigMap manifest without a namespace
pub fn config_map(name: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {"name": name},
        "data": {"key": name}
    })
}

/// ConfigMap already living in the cluster, optionally owned by `owner`
pub fn live_config_map(namespace: &str, name: &str, owner: Option<&str>) -> DynamicObject {
    let mut metadata = json!({"name": name, "namespace": namespace});
    if let Some(owner) = owner {
        metadata["annotations"] = json!({"plugin-installer.io/owner": owner});
    }
    object(json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": metadata,
        "data": {"key": name}
    }))
}

pub fn inline_plugin(namespace: &str, name: &str, resources: Vec<Value>) -> Plugin {
    Plugin {
        kind: PluginKind::Inline,
        name: name.to_string(),
        namespace: namespace.to_string(),
        repo: String::new(),
        version: String::new(),
        path: String::new(),
        resources,
        values: Default::default(),
    }
}

/// The `demo` plugin in `ns1` with a single ConfigMap `cm-a`
pub fn demo_plugin() -> Plugin {
    inline_plugin("ns1", "demo", vec![config_map("cm-a")])
}

pub fn config_map_key(namespace: &str, name: &str) -> ResourceKey {
    ResourceKey::new("", "ConfigMap", namespace, name)
}

pub fn namespace_key(name: &str) -> ResourceKey {
    ResourceKey::new("", "Namespace", "", name)
}
