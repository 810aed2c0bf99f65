use super::yaml::parse_manifests;
use super::ManifestBuilder;
use crate::crd::Plugin;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use kube::api::DynamicObject;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Loads every YAML/JSON manifest under a directory, in path order
///
/// Hidden files and directories are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryBuilder;

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn manifest_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.with_context(|| format!("walk {}", dir.display()))?;
        let is_manifest = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext));
        if is_manifest {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[async_trait]
impl ManifestBuilder for DirectoryBuilder {
    async fn build(&self, plugin: &Plugin, dir: &Path) -> Result<Vec<DynamicObject>> {
        if !dir.is_dir() {
            return Err(anyhow!("manifest directory not found: {}", dir.display()));
        }
        let mut manifests = Vec::new();
        for file in manifest_files(dir)? {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("read {}", file.display()))?;
            let parsed = parse_manifests(&text).with_context(|| format!("parse {}", file.display()))?;
            debug!(plugin = %plugin.owner(), file = %file.display(), manifests = parsed.len(), "Loaded manifests");
            manifests.extend(parsed);
        }
        Ok(manifests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::PluginKind;

    fn plugin() -> Plugin {
        Plugin {
            kind: PluginKind::Template,
            name: "demo".to_string(),
            namespace: "ns1".to_string(),
            repo: String::new(),
            version: String::new(),
            path: String::new(),
            resources: Vec::new(),
            values: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_loads_nested_manifests_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(
            dir.path().join("a.yaml"),
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: first\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b/c.json"),
            r#"{"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "second"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "# not a manifest").unwrap();
        std::fs::write(
            dir.path().join(".git/config.yaml"),
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: hidden\n",
        )
        .unwrap();

        let manifests = DirectoryBuilder.build(&plugin(), dir.path()).await.unwrap();
        let names: Vec<_> = manifests.iter().filter_map(|m| m.metadata.name.clone()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirectoryBuilder
            .build(&plugin(), &dir.path().join("absent"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("manifest directory not found"));
    }

    #[tokio::test]
    async fn test_invalid_file_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.yaml"), "kind: [unterminated\n").unwrap();
        let err = DirectoryBuilder.build(&plugin(), dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("bad.yaml"));
    }
}
