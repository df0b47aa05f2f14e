use crate::constants::ASSET_CACHE_MAX_ENTRIES;
use image::RgbaImage;
use moka::future::Cache;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Decoded marker icons and overlay images, loaded from disk once and kept
/// in memory.
///
/// Missing or undecodable files are reported as `None`; callers decide on
/// a fallback. Misses are not cached, so an icon dropped into the directory
/// later is picked up without a restart.
#[derive(Clone)]
pub struct AssetStore {
    marker_dir: PathBuf,
    cache: Cache<PathBuf, Arc<RgbaImage>>,
}

impl AssetStore {
    pub fn new(marker_dir: impl Into<PathBuf>) -> Self {
        AssetStore {
            marker_dir: marker_dir.into(),
            cache: Cache::builder().max_capacity(ASSET_CACHE_MAX_ENTRIES).build(),
        }
    }

    pub fn marker_dir(&self) -> &Path {
        &self.marker_dir
    }

    /// Load an icon by file name, relative to the marker directory.
    pub async fn marker(&self, file_name: &str) -> Option<Arc<RgbaImage>> {
        self.load(&self.marker_dir.join(file_name)).await
    }

    /// Load an image from an arbitrary path.
    pub async fn load(&self, path: &Path) -> Option<Arc<RgbaImage>> {
        if let Some(image) = self.cache.get(path).await {
            return Some(image);
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!("Asset {} not available: {}", path.display(), e);
                return None;
            }
        };
        let image = match image::load_from_memory(&bytes) {
            Ok(image) => Arc::new(image.to_rgba8()),
            Err(e) => {
                tracing::warn!("Asset {} is not a readable image: {}", path.display(), e);
                return None;
            }
        };

        self.cache.insert(path.to_path_buf(), Arc::clone(&image)).await;
        Some(image)
    }
}
