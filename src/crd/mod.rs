//! # Plugin Types
//!
//! Desired-state and status types for plugins.
//!
//! These types are the boundary between the installer and whatever persists
//! plugins (a CRD, a file, a database). They derive `JsonSchema` so they can be
//! embedded in a CustomResourceDefinition by the surrounding system.
//!
//! ## Module Structure
//!
//! - `plugin.rs` - Plugin desired state and plugin kinds
//! - `status.rs` - Plugin status and lifecycle phase

mod plugin;
mod status;

// Re-export all public types
pub use plugin::{Plugin, PluginKind, Values};
pub use status::{PluginPhase, PluginStatus};
