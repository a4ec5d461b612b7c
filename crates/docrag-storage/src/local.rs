//! Local directory storage.

use async_trait::async_trait;
use docrag_core::{FileStorage, StorageError};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Serves the regular files directly inside one directory.
///
/// Subdirectories are not listed, and names that would resolve outside the
/// root are reported as not found.
#[derive(Debug, Clone)]
pub struct LocalDirStorage {
    root: PathBuf,
}

impl LocalDirStorage {
    /// Create storage rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(file)), None) => Some(self.root.join(file)),
            _ => None,
        }
    }
}

#[async_trait]
impl FileStorage for LocalDirStorage {
    fn name(&self) -> &str {
        "local"
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }

        names.sort();
        debug!("Listed {} files in {:?}", names.len(), self.root);
        Ok(names)
    }

    async fn fetch(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self
            .resolve(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) if path.is_dir() => {
                debug!("{:?} is a directory: {}", path, e);
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}
