//! # Installer Configuration
//!
//! Installer-level settings loaded from environment variables.

use crate::installer::sync::PollPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Installer-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerConfig {
    /// Default local source for template and inline plugins
    pub plugins_dir: String,
    /// Default local source for kustomize plugins
    pub kustomize_dir: String,
    /// Default chart directory, handed to an external Helm applier
    pub charts_dir: String,
    /// Interval between sync steps (milliseconds)
    pub sync_poll_interval_ms: u64,
    /// Random jitter added to each poll wait (milliseconds)
    pub sync_poll_jitter_ms: u64,
    /// Maximum time a sync may run (seconds), 0 for no limit
    pub sync_max_wait_secs: u64,
    /// Cluster cache resync interval (seconds), 0 to never resync automatically
    pub cache_resync_secs: u64,
    /// Field manager for server-side apply
    pub field_manager: String,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
}

/// Local source directories for the native appliers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginOptions {
    pub plugins_dir: PathBuf,
    pub kustomize_dir: PathBuf,
    pub charts_dir: PathBuf,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            plugins_dir: DEFAULT_PLUGINS_DIR.to_string(),
            kustomize_dir: DEFAULT_KUSTOMIZE_DIR.to_string(),
            charts_dir: DEFAULT_CHARTS_DIR.to_string(),
            sync_poll_interval_ms: DEFAULT_SYNC_POLL_INTERVAL_MS,
            sync_poll_jitter_ms: DEFAULT_SYNC_POLL_JITTER_MS,
            sync_max_wait_secs: DEFAULT_SYNC_MAX_WAIT_SECS,
            cache_resync_secs: DEFAULT_CACHE_RESYNC_SECS,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            log_level: "INFO".to_string(),
        }
    }
}

impl InstallerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            plugins_dir: env_var_or_default_str("PLUGINS_DIR", DEFAULT_PLUGINS_DIR),
            kustomize_dir: env_var_or_default_str("KUSTOMIZE_DIR", DEFAULT_KUSTOMIZE_DIR),
            charts_dir: env_var_or_default_str("CHARTS_DIR", DEFAULT_CHARTS_DIR),
            sync_poll_interval_ms: env_var_or_default(
                "SYNC_POLL_INTERVAL_MS",
                DEFAULT_SYNC_POLL_INTERVAL_MS,
            ),
            sync_poll_jitter_ms: env_var_or_default("SYNC_POLL_JITTER_MS", DEFAULT_SYNC_POLL_JITTER_MS),
            sync_max_wait_secs: env_var_or_default("SYNC_MAX_WAIT_SECS", DEFAULT_SYNC_MAX_WAIT_SECS),
            cache_resync_secs: env_var_or_default("CACHE_RESYNC_SECS", DEFAULT_CACHE_RESYNC_SECS),
            field_manager: env_var_or_default_str("FIELD_MANAGER", DEFAULT_FIELD_MANAGER),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
        }
    }

    /// Get poll policy for the sync loop
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            // A zero interval would spin
            interval: Duration::from_millis(self.sync_poll_interval_ms.max(1)),
            jitter: Duration::from_millis(self.sync_poll_jitter_ms),
            max_wait: (self.sync_max_wait_secs > 0).then(|| Duration::from_secs(self.sync_max_wait_secs)),
        }
    }

    /// Get cluster cache resync interval
    pub fn cache_resync_interval(&self) -> Option<Duration> {
        (self.cache_resync_secs > 0).then(|| Duration::from_secs(self.cache_resync_secs))
    }

    pub fn plugin_options(&self) -> PluginOptions {
        PluginOptions {
            plugins_dir: PathBuf::from(&self.plugins_dir),
            kustomize_dir: PathBuf::from(&self.kustomize_dir),
            charts_dir: PathBuf::from(&self.charts_dir),
        }
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InstallerConfig::default();
        let policy = config.poll_policy();
        assert_eq!(policy.interval, Duration::from_secs(1));
        assert_eq!(policy.max_wait, None);
        assert_eq!(config.cache_resync_interval(), None);
        assert_eq!(config.field_manager, "plugin-installer");
    }

    #[test]
    fn test_max_wait_and_resync_enabled() {
        let config = InstallerConfig {
            sync_max_wait_secs: 300,
            cache_resync_secs: 60,
            ..InstallerConfig::default()
        };
        assert_eq!(config.poll_policy().max_wait, Some(Duration::from_secs(300)));
        assert_eq!(config.cache_resync_interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_env_var_parsing_falls_back_on_garbage() {
        std::env::set_var("PLUGIN_INSTALLER_TEST_GARBAGE_MS", "soon");
        assert_eq!(env_var_or_default("PLUGIN_INSTALLER_TEST_GARBAGE_MS", 42_u64), 42);
        std::env::set_var("PLUGIN_INSTALLER_TEST_VALID_MS", "250");
        assert_eq!(env_var_or_default("PLUGIN_INSTALLER_TEST_VALID_MS", 42_u64), 250);
        assert_eq!(env_var_or_default_str("PLUGIN_INSTALLER_TEST_UNSET_DIR", "plugins"), "plugins");
    }

    #[test]
    fn test_plugin_options_paths() {
        let options = InstallerConfig::default().plugin_options();
        assert_eq!(options.kustomize_dir, PathBuf::from("kustomize"));
        assert_eq!(options.plugins_dir, PathBuf::from("plugins"));
    }
}
