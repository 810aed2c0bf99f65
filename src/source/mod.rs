//! # Source Resolution
//!
//! Turns a plugin's `repo`, `version` and `path` into a local directory the
//! manifest builders can read.
//!
//! Only local sources are supported: `file://<dir>` URLs and bare directory
//! paths. Remote schemes (HTTP, Git, OCI) are rejected with
//! [`SourceError::UnsupportedScheme`].

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const MAX_PATH_LENGTH: usize = 4096;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unsupported source scheme '{0}', only file:// and local paths are supported")]
    UnsupportedScheme(String),

    #[error("invalid source path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}

/// Locates plugin manifests on the local filesystem
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(&self, repo: &str, version: &str, path: &str) -> Result<PathBuf, SourceError>;
}

/// Resolver for `file://` repositories and bare local paths
///
/// Resolution is lexical; a missing directory surfaces when the builder reads it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSourceResolver;

#[async_trait]
impl SourceResolver for LocalSourceResolver {
    async fn resolve(&self, repo: &str, version: &str, path: &str) -> Result<PathBuf, SourceError> {
        let base = local_base(repo)?;
        validate_relative_path(path)?;
        if !version.is_empty() {
            debug!(%repo, %version, "Local sources are not versioned, ignoring version");
        }
        Ok(base.join(path))
    }
}

/// Directory a repository URL points at
pub fn local_base(repo: &str) -> Result<PathBuf, SourceError> {
    let repo = repo.trim();
    let dir = match repo.split_once("://") {
        Some(("file", rest)) => rest,
        Some((scheme, _)) => return Err(SourceError::UnsupportedScheme(scheme.to_string())),
        None => repo,
    };
    check_characters(dir)?;
    Ok(PathBuf::from(dir))
}

fn invalid(path: &str, reason: impl Into<String>) -> SourceError {
    SourceError::InvalidPath {
        path: path.to_string(),
        reason: reason.into(),
    }
}

fn check_characters(path: &str) -> Result<(), SourceError> {
    if path.len() > MAX_PATH_LENGTH {
        return Err(invalid(
            path,
            format!("exceeds maximum length of {MAX_PATH_LENGTH} characters"),
        ));
    }
    if path.chars().any(char::is_control) {
        return Err(invalid(path, "contains control characters"));
    }
    Ok(())
}

/// Path inside a repository: relative, no `..`, no control characters
pub fn validate_relative_path(path: &str) -> Result<(), SourceError> {
    check_characters(path)?;
    for component in Path::new(path).components() {
        match component {
            Component::ParentDir => return Err(invalid(path, "must not contain '..'")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid(path, "must be relative to the repository"))
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    Ok(())
}
