//! # Constants
//!
//! Shared constants used throughout the installer.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Annotation stamped on every manifest owned by a plugin.
///
/// The value is `<namespace>/<name>` of the owning plugin. It is the only link
/// between live cluster objects and a plugin; there is no separate index.
pub const MANAGED_PLUGIN_ANNOTATION: &str = "plugin-installer.io/owner";

/// Field manager used for server-side apply
pub const DEFAULT_FIELD_MANAGER: &str = "plugin-installer";

/// Default interval between sync steps while an operation is running (milliseconds)
pub const DEFAULT_SYNC_POLL_INTERVAL_MS: u64 = 1000;

/// Default random jitter added to each poll wait (milliseconds)
pub const DEFAULT_SYNC_POLL_JITTER_MS: u64 = 0;

/// Default maximum wait for a sync to converge (seconds)
/// Zero means the loop is bounded only by the caller's cancellation token
pub const DEFAULT_SYNC_MAX_WAIT_SECS: u64 = 0;

/// Default cluster cache resync interval (seconds)
/// Zero disables automatic resync; the cache is then only refreshed explicitly
pub const DEFAULT_CACHE_RESYNC_SECS: u64 = 0;

/// Default local source directory for template and inline plugins
pub const DEFAULT_PLUGINS_DIR: &str = "plugins";

/// Default local source directory for kustomize plugins
pub const DEFAULT_KUSTOMIZE_DIR: &str = "kustomize";

/// Default local chart directory handed to an external Helm applier
pub const DEFAULT_CHARTS_DIR: &str = "charts";

/// Default timeout for a single CLI apply/remove
pub const DEFAULT_OPERATION_TIMEOUT: &str = "10m";

/// Version recorded for plugins that do not declare one
pub const DEFAULT_PLUGIN_VERSION: &str = "0.0.0";
