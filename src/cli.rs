//! # Command Line
//!
//! `plugin-installer apply|remove --plugin FILE --status FILE`
//!
//! The plugin file holds a [`Plugin`] (YAML or JSON). The status file holds the
//! previous [`PluginStatus`]; a missing file means the plugin was never
//! reconciled. The updated status is written back after every run, including
//! failed ones.

use crate::config::parse_kubernetes_duration;
use crate::constants::DEFAULT_OPERATION_TIMEOUT;
use crate::crd::{Plugin, PluginStatus};
use crate::installer::delegate::PluginManager;
use crate::installer::error::InstallerError;
use crate::observability::metrics;
use crate::runtime::Installer;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_GIT_HASH"),
    ", built ",
    env!("BUILD_DATETIME"),
    ")"
);

/// Install and remove Kubernetes plugin bundles
#[derive(Debug, Parser)]
#[command(name = "plugin-installer", version, long_version = LONG_VERSION)]
#[command(
    about = "Install and remove Kubernetes plugin bundles",
    long_about = None,
    after_help = "\
Examples:
  plugin-installer apply --plugin demo.yaml --status demo.status.yaml
  plugin-installer remove --plugin demo.yaml --status demo.status.yaml --timeout 2m
"
)]
pub struct Cli {
    /// Log level (ERROR, WARN, INFO, DEBUG, TRACE); overrides LOG_LEVEL
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Install or upgrade a plugin
    Apply(OperationArgs),
    /// Remove everything a plugin installed
    Remove(OperationArgs),
}

#[derive(Debug, Args)]
pub struct OperationArgs {
    /// Plugin definition (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    pub plugin: PathBuf,

    /// Plugin status, read before and written after the operation
    #[arg(long, value_name = "FILE")]
    pub status: PathBuf,

    /// Give up after this long (e.g. 30s, 5m, 1h)
    #[arg(long, default_value = DEFAULT_OPERATION_TIMEOUT)]
    pub timeout: String,

    /// Write Prometheus metrics here when done
    #[arg(long, value_name = "FILE")]
    pub metrics_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Apply,
    Remove,
}

pub fn read_plugin(path: &Path) -> Result<Plugin> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read plugin file {}", path.display()))?;
    serde_yaml::from_str(&text)
        .with_context(|| format!("Failed to parse plugin file {}", path.display()))
}

/// Previous status; a missing or empty file is a never-reconciled plugin
pub fn read_status(path: &Path) -> Result<PluginStatus> {
    if !path.exists() {
        return Ok(PluginStatus::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read status file {}", path.display()))?;
    if text.trim().is_empty() {
        return Ok(PluginStatus::default());
    }
    serde_yaml::from_str(&text)
        .with_context(|| format!("Failed to parse status file {}", path.display()))
}

pub fn write_status(path: &Path, status: &PluginStatus) -> Result<()> {
    let text = serde_yaml::to_string(status).context("Failed to serialize status")?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write status file {}", path.display()))
}

/// Run one operation, cancelling it when `timeout` elapses or `cancel` fires
///
/// A failed apply is recorded on the status as `Failed`.
pub async fn execute(
    manager: &dyn PluginManager,
    operation: Operation,
    plugin: &Plugin,
    status: &mut PluginStatus,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), InstallerError> {
    let token = cancel.child_token();
    let timer = tokio::spawn({
        let token = token.clone();
        async move {
            tokio::time::sleep(timeout).await;
            token.cancel();
        }
    });

    let outcome = match operation {
        Operation::Apply => manager.apply(plugin, status, &token).await,
        Operation::Remove => manager.remove(plugin, status, &token).await,
    };
    timer.abort();

    if let Err(e) = &outcome {
        error!(plugin = %plugin.owner(), error = %e, ?operation, "Operation failed");
        if operation == Operation::Apply {
            status.record_failure(e.to_string());
        }
    }
    outcome
}

/// Entry point of the binary once tracing and the installer are set up
pub async fn run(cli: Cli, installer: &Installer) -> Result<()> {
    let (operation, args) = match cli.command {
        Command::Apply(args) => (Operation::Apply, args),
        Command::Remove(args) => (Operation::Remove, args),
    };
    let timeout = parse_kubernetes_duration(&args.timeout).context("Invalid --timeout")?;
    let plugin = read_plugin(&args.plugin)?;
    let mut status = read_status(&args.status)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling operation");
                cancel.cancel();
            }
        }
    });

    info!(plugin = %plugin.owner(), kind = %plugin.kind, ?operation, "Starting operation");
    let outcome = execute(
        &installer.manager,
        operation,
        &plugin,
        &mut status,
        timeout,
        &cancel,
    )
    .await;

    write_status(&args.status, &status)?;
    if let Some(path) = &args.metrics_file {
        std::fs::write(path, metrics::render_metrics()?)
            .with_context(|| format!("Failed to write metrics file {}", path.display()))?;
    }

    outcome.with_context(|| format!("{operation:?} of plugin {} failed", plugin.owner()))?;
    info!(plugin = %plugin.owner(), phase = ?status.phase, "Operation complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::PluginPhase;

    #[test]
    fn test_cli_parses_apply() {
        let cli = Cli::try_parse_from([
            "plugin-installer",
            "--log-level",
            "debug",
            "apply",
            "--plugin",
            "demo.yaml",
            "--status",
            "demo.status.yaml",
            "--timeout",
            "2m",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.plugin, PathBuf::from("demo.yaml"));
        assert_eq!(args.timeout, "2m");
        assert!(args.metrics_file.is_none());
    }

    #[test]
    fn test_cli_default_timeout() {
        let cli = Cli::try_parse_from(["plugin-installer", "remove", "--plugin", "p", "--status", "s"]).unwrap();
        let Command::Remove(args) = cli.command else {
            panic!("expected remove");
        };
        assert_eq!(args.timeout, DEFAULT_OPERATION_TIMEOUT);
    }

    #[test]
    fn test_missing_status_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let status = read_status(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(status.phase, None);
    }

    #[test]
    fn test_status_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.yaml");
        let mut status = PluginStatus::default();
        status.record_failure("boom");
        write_status(&path, &status).unwrap();

        let read = read_status(&path).unwrap();
        assert_eq!(read.phase, Some(PluginPhase::Failed));
        assert_eq!(read.message, "boom");
    }

    #[test]
    fn test_read_plugin_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugin.yaml");
        std::fs::write(&path, "kind: inline\nname: demo\nnamespace: ns1\n").unwrap();
        let plugin = read_plugin(&path).unwrap();
        assert_eq!(plugin.owner(), "ns1/demo");
    }
}
