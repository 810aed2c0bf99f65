//! Outcome of a sync run, as observed by the poll loop.

use crate::installer::resource::ResourceKey;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationPhase {
    Running,
    Succeeded,
    Failed,
}

impl OperationPhase {
    #[must_use]
    pub fn completed(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for OperationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        })
    }
}

/// Per-resource outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResultCode {
    Synced,
    SyncFailed,
    Pruned,
    PruneSkipped,
}

impl ResultCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "Synced",
            Self::SyncFailed => "SyncFailed",
            Self::Pruned => "Pruned",
            Self::PruneSkipped => "PruneSkipped",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSyncResult {
    pub key: ResourceKey,
    pub status: ResultCode,
    pub message: String,
}

impl ResourceSyncResult {
    pub fn new(key: ResourceKey, status: ResultCode, message: impl Into<String>) -> Self {
        Self {
            key,
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    pub phase: OperationPhase,
    pub message: String,
    pub resources: Vec<ResourceSyncResult>,
}

impl Default for SyncResult {
    fn default() -> Self {
        Self {
            phase: OperationPhase::Running,
            message: String::new(),
            resources: Vec::new(),
        }
    }
}

impl SyncResult {
    pub fn failures(&self) -> impl Iterator<Item = &ResourceSyncResult> {
        self.resources
            .iter()
            .filter(|r| r.status == ResultCode::SyncFailed)
    }

    pub fn count(&self, status: ResultCode) -> usize {
        self.resources.iter().filter(|r| r.status == status).count()
    }
}
