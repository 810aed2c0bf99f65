//! # Plugin Installer
//!
//! Installs and removes Kubernetes plugin bundles (kustomize overlays,
//! manifest directories and inline resources) by converging the cluster to
//! the plugin's desired manifests and recording the outcome in a
//! [`crd::PluginStatus`].
//!
//! ## Modules
//!
//! - `crd`: plugin and status types
//! - `installer`: ownership, cluster cache, reconciler, sync engine and appliers
//! - `source`: local source resolution
//! - `build`: manifest builders
//! - `config`: environment configuration
//! - `observability`: Prometheus metrics
//! - `runtime`: startup wiring
//! - `cli`: command-line front end

pub mod build;
pub mod cli;
pub mod config;
pub mod constants;
pub mod crd;
pub mod installer;
pub mod observability;
pub mod runtime;
pub mod source;
