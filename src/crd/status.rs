//! # Plugin Status
//!
//! Persisted status of a plugin installation.
//!
//! The status is owned by the caller and handed to appliers by mutable
//! reference; appliers update it in place and never construct a fresh one
//! mid-cycle.

use crate::crd::Values;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of a plugin
///
/// Serialised as the variant name and must round-trip unchanged through persistence.
/// An unset phase (never reconciled) is represented by `Option::None` on
/// [`PluginStatus::phase`], distinct from [`PluginPhase::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum PluginPhase {
    /// Not installed
    None,
    /// Last apply completed without resource failures
    Installed,
    /// Last operation failed
    Failed,
    /// Removed from the cluster
    Removed,
}

impl PluginPhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginPhase::None => "None",
            PluginPhase::Installed => "Installed",
            PluginPhase::Failed => "Failed",
            PluginPhase::Removed => "Removed",
        }
    }
}

impl fmt::Display for PluginPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a plugin installation
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PluginStatus {
    /// Plugin name recorded by the last successful operation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Namespace recorded by the last successful operation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Lifecycle phase, unset until the first operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<PluginPhase>,
    /// Values applied by the last successful apply
    #[serde(default, skip_serializing_if = "Values::is_empty")]
    pub values: Values,
    /// Version applied by the last successful apply
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Human-readable message from the last operation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// YAML list of per-resource sync outcomes from the last completed sync
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    /// First successful apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Most recent successful apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgraded_at: Option<DateTime<Utc>>,
    /// Most recent successful removal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl PluginStatus {
    /// Whether the last apply left the plugin installed
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.phase == Some(PluginPhase::Installed)
    }

    /// Record a failed operation
    ///
    /// Appliers leave the phase untouched on failure; callers that persist status
    /// use this to surface the failure.
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.phase = Some(PluginPhase::Failed);
        self.message = message.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_round_trips_through_yaml() {
        for phase in [
            PluginPhase::None,
            PluginPhase::Installed,
            PluginPhase::Failed,
            PluginPhase::Removed,
        ] {
            let status = PluginStatus {
                phase: Some(phase),
                ..Default::default()
            };
            let yaml = serde_yaml::to_string(&status).unwrap();
            assert!(yaml.contains(&format!("phase: {}", phase.as_str())));
            let back: PluginStatus = serde_yaml::from_str(&yaml).unwrap();
            assert_eq!(back.phase, Some(phase));
        }
    }

    #[test]
    fn test_unset_phase_is_not_serialized() {
        let yaml = serde_yaml::to_string(&PluginStatus::default()).unwrap();
        assert!(!yaml.contains("phase"));
        let back: PluginStatus = serde_yaml::from_str("{}").unwrap();
        assert_eq!(back.phase, None);
    }

    #[test]
    fn test_timestamps_use_camel_case() {
        let status = PluginStatus {
            created_at: Some(Utc::now()),
            ..Default::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("upgradedAt").is_none());
    }

    #[test]
    fn test_record_failure() {
        let mut status = PluginStatus::default();
        status.record_failure("boom");
        assert_eq!(status.phase, Some(PluginPhase::Failed));
        assert_eq!(status.message, "boom");
        assert!(!status.is_installed());
    }
}
