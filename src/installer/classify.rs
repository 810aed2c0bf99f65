//! # Result Classification
//!
//! Projects a completed [`SyncResult`] onto a [`PluginStatus`] and decides
//! whether the operation succeeded.

use crate::crd::PluginStatus;
use crate::installer::error::InstallerError;
use crate::installer::sync::{OperationPhase, ResultCode, SyncResult};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Note<'a> {
    resource: String,
    status: ResultCode,
    #[serde(skip_serializing_if = "str::is_empty")]
    message: &'a str,
}

/// Render per-resource outcomes as a YAML list
pub fn render_notes(result: &SyncResult) -> Result<String, serde_yaml::Error> {
    let notes: Vec<Note<'_>> = result
        .resources
        .iter()
        .map(|r| Note {
            resource: r.key.to_string(),
            status: r.status,
            message: &r.message,
        })
        .collect();
    serde_yaml::to_string(&notes)
}

/// Record the outcome of `result` in `status.notes` and classify it
///
/// Notes are written for every completed run, failed or not. A run that is
/// still in progress leaves the status untouched.
pub fn classify_result(result: &SyncResult, status: &mut PluginStatus) -> Result<(), InstallerError> {
    if !result.phase.completed() {
        return Err(InstallerError::SyncRunning {
            message: result.message.clone(),
        });
    }

    status.notes = render_notes(result)?;

    let failures: Vec<String> = result
        .failures()
        .map(|r| format!("{}: {}", r.key, r.message))
        .collect();
    if result.phase == OperationPhase::Failed {
        return Err(InstallerError::SyncFailed {
            message: result.message.clone(),
            failures,
        });
    }
    if !failures.is_empty() {
        return Err(InstallerError::ResourcesFailed(failures));
    }
    Ok(())
}
