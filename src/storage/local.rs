//! Локальное хранилище: директория с той же структурой, что и бакет.
//! Используется для офлайн-запусков и проверки конвейера без облака.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use walkdir::WalkDir;

use super::ObjectStore;
use crate::error::{PipelineError, Result};

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        if path.split('/').any(|part| part == "..") {
            return Err(PipelineError::Storage(format!(
                "Object path escapes the store root: {}",
                path
            )));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn list_objects(&self, prefix: &str) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        if !self.root.exists() {
            return Ok(names);
        }

        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|e| PipelineError::Storage(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = match entry.path().strip_prefix(&self.root) {
                Ok(relative) => relative,
                Err(_) => continue,
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if name.starts_with(prefix) {
                names.insert(name);
            }
        }
        Ok(names)
    }

    async fn put_object(&self, path: &str, bytes: Bytes) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &bytes).await?;
        Ok(())
    }

    async fn get_object(&self, path: &str) -> Result<Bytes> {
        let target = self.resolve(path)?;
        let data = tokio::fs::read(&target).await.map_err(|e| {
            PipelineError::Storage(format!("Failed to read {}: {}", target.display(), e))
        })?;
        Ok(Bytes::from(data))
    }
}
