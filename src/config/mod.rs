//! # Configuration
//!
//! - `installer`: installer settings loaded from environment variables
//! - `duration`: Kubernetes-style duration strings (`30s`, `5m`, `1h`, `1d`)

pub mod duration;
pub mod installer;

pub use duration::parse_kubernetes_duration;
pub use installer::{InstallerConfig, PluginOptions};
