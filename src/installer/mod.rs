//! # Installer
//!
//! The native reconciliation engine that installs and removes plugins.
//!
//! ```text
//! DelegatePluginManager ──► NativeApplier ──► SyncEngine ──► ClusterClient
//!        (kind)              (build, stamp)     (plan, waves)    (apply, delete)
//!                                   │                 │
//!                                   └── classify ◄────┴── ClusterCache
//! ```
//!
//! Ownership of live objects is tracked solely by the annotation written by
//! [`ownership::stamp_ownership`]; selection and pruning are scoped by the
//! matching [`ownership::ResourceSelector`].

pub mod cache;
pub mod classify;
pub mod cluster;
pub mod delegate;
pub mod diff;
pub mod error;
pub mod native;
pub mod ownership;
pub mod reconcile;
pub mod resource;
pub mod sync;
pub mod values;

pub use cache::{CacheError, ClusterCache};
pub use classify::classify_result;
pub use cluster::{ClusterClient, ClusterError, InMemoryCluster, KubeCluster};
pub use delegate::{DelegatePluginManager, PluginManager};
pub use error::InstallerError;
pub use native::NativeApplier;
pub use ownership::{stamp_ownership, ResourceSelector};
pub use resource::ResourceKey;
pub use sync::{PollPolicy, SyncEngine, SyncError, SyncOptions, SyncResult};
