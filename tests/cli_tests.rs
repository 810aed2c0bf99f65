//! # CLI Integration Tests
//!
//! Exercises the operation runner used by the `plugin-installer` binary,
//! including status file persistence and failure recording.

mod common;

use common::*;
use plugin_installer::cli::{execute, read_plugin, read_status, write_status, Operation};
use plugin_installer::crd::PluginPhase;
use plugin_installer::installer::cluster::InMemoryCluster;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_apply_from_files_and_persist_status() {
    let dir = tempfile::tempdir().unwrap();
    let plugin_file = dir.path().join("demo.yaml");
    let status_file = dir.path().join("demo.status.yaml");
    std::fs::write(
        &plugin_file,
        r#"
kind: inline
name: demo
namespace: ns1
resources:
  - |
    apiVersion: v1
    kind: ConfigMap
    metadata:
      name: cm-a
    data:
      key: value
"#,
    )
    .unwrap();

    let harness = Harness::new().await;
    let plugin = read_plugin(&plugin_file).unwrap();
    let mut status = read_status(&status_file).unwrap();

    execute(
        &harness.installer.manager,
        Operation::Apply,
        &plugin,
        &mut status,
        Duration::from_secs(60),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    write_status(&status_file, &status).unwrap();

    let persisted = read_status(&status_file).unwrap();
    assert_eq!(persisted.phase, Some(PluginPhase::Installed));
    assert!(persisted.notes.contains("/ConfigMap/ns1/cm-a"));
    assert!(harness.cluster.contains(&config_map_key("ns1", "cm-a")));
}

#[tokio::test]
async fn test_failed_apply_is_recorded_on_status() {
    let cluster = InMemoryCluster::new();
    cluster.reject_apply("cm-a", "forbidden");
    let harness = Harness::with_cluster(cluster).await;
    let mut status = Default::default();

    let err = execute(
        &harness.installer.manager,
        Operation::Apply,
        &demo_plugin(),
        &mut status,
        Duration::from_secs(60),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert_eq!(status.phase, Some(PluginPhase::Failed));
    assert_eq!(status.message, err.to_string());
}

#[tokio::test]
async fn test_failed_remove_keeps_phase() {
    let cluster = InMemoryCluster::new();
    cluster.fail_discovery(true);
    let harness = Harness::with_cluster(cluster).await;
    let mut status = plugin_installer::crd::PluginStatus {
        phase: Some(PluginPhase::Installed),
        ..Default::default()
    };

    assert!(execute(
        &harness.installer.manager,
        Operation::Remove,
        &demo_plugin(),
        &mut status,
        Duration::from_secs(60),
        &CancellationToken::new(),
    )
    .await
    .is_err());
    assert_eq!(status.phase, Some(PluginPhase::Installed));
}
