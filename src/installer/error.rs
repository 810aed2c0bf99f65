use crate::installer::cache::CacheError;
use crate::installer::sync::SyncError;
use crate::source::SourceError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by plugin appliers
#[derive(Debug, Error)]
pub enum InstallerError {
    #[error("unknown plugin kind: {0}")]
    UnknownPluginKind(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("build manifests: {0:#}")]
    Build(#[source] anyhow::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("sync is still running: {message}")]
    SyncRunning { message: String },

    #[error("{}", sync_failed_message(.message, .failures))]
    SyncFailed {
        message: String,
        failures: Vec<String>,
    },

    #[error("{}", .0.join("\n"))]
    ResourcesFailed(Vec<String>),

    #[error("sync cancelled: {last_message}")]
    Cancelled { last_message: String },

    #[error("sync did not complete within {waited:?}: {last_message}")]
    Timeout {
        waited: Duration,
        last_message: String,
    },

    #[error("serialize sync notes: {0}")]
    Notes(#[from] serde_yaml::Error),
}

fn sync_failed_message(message: &str, failures: &[String]) -> String {
    let mut out = format!("sync failed: {message}");
    for failure in failures {
        out.push('\n');
        out.push_str(failure);
    }
    out
}

impl From<SyncError> for InstallerError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Cache(e) => Self::Cache(e),
            SyncError::Cancelled { last } => Self::Cancelled {
                last_message: last.message,
            },
            SyncError::Timeout { waited, last } => Self::Timeout {
                waited,
                last_message: last.message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_failed_lists_each_failure() {
        let err = InstallerError::SyncFailed {
            message: "one or more objects failed to apply".to_string(),
            failures: vec!["/ConfigMap/ns1/bad: denied".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "sync failed: one or more objects failed to apply\n/ConfigMap/ns1/bad: denied"
        );
    }

    #[test]
    fn test_build_error_keeps_context_chain() {
        let inner = anyhow::anyhow!("file not found").context("read kustomization");
        let err = InstallerError::Build(inner);
        assert_eq!(err.to_string(), "build manifests: read kustomization: file not found");
    }
}
