use crate::cache::BlobStore;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Filesystem-backed [`BlobStore`] rooted at a directory.
///
/// Writes go to a uniquely named sibling first and are renamed into place,
/// so readers only ever see complete files.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DiskStore { root: root.into() }
    }

    /// Map a key onto a path below the root. Empty, `.` and `..` segments
    /// are dropped and unusual characters replaced, so no key can leave the
    /// root directory.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in key.split(['/', '\\']) {
            if segment.is_empty() || segment == "." || segment == ".." {
                continue;
            }
            let clean: String = segment
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                        c
                    } else {
                        '_'
                    }
                })
                .collect();
            path.push(clean);
        }
        path
    }
}

/// Create every missing ancestor of `path`. Safe to race: a directory that
/// appears concurrently is not an error.
pub async fn ensure_parent_dirs(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            match tokio::fs::create_dir_all(parent).await {
                Err(e) if e.kind() != std::io::ErrorKind::AlreadyExists => Err(e),
                _ => Ok(()),
            }
        }
        _ => Ok(()),
    }
}

#[async_trait]
impl BlobStore for DiskStore {
    async fn exists(&self, key: &str) -> bool {
        tokio::fs::metadata(self.path_for(key))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.path_for(key)).await?)
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        if path == self.root {
            return Err(AppError::Cache(format!("Empty cache key: {:?}", key)));
        }
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!("Cache entry already present: {}", path.display());
            return Ok(());
        }

        ensure_parent_dirs(&path).await?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        if let Err(e) = tokio::fs::write(&tmp, data).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!("Cached {} bytes at {}", data.len(), path.display());
        Ok(())
    }

    async fn modified(&self, key: &str) -> Option<SystemTime> {
        tokio::fs::metadata(self.path_for(key))
            .await
            .and_then(|m| m.modified())
            .ok()
    }

    fn backend_name(&self) -> &'static str {
        "disk"
    }
}
