use crate::cache::{tile_cache_key, BlobStore};
use crate::config::FetchConfig;
use crate::error::{AppError, Result};
use crate::models::TileCoord;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Source of raw tile bytes.
///
/// Implementations own their failure policy: they enforce timeouts and never
/// retry indefinitely. Callers treat any error as "no tile".
#[async_trait]
pub trait TileSource: Send + Sync {
    async fn fetch_tile(&self, template: &str, tile: TileCoord) -> Result<Vec<u8>>;
}

/// Substitute a tile address into a URL template. Both `{Z}/{X}/{Y}` and
/// `{z}/{x}/{y}` are understood.
pub fn tile_url(template: &str, tile: TileCoord) -> String {
    let (z, x, y) = (tile.zoom.to_string(), tile.x.to_string(), tile.y.to_string());
    template
        .replace("{Z}", &z)
        .replace("{z}", &z)
        .replace("{X}", &x)
        .replace("{x}", &x)
        .replace("{Y}", &y)
        .replace("{y}", &y)
}

/// Fetches tiles over HTTP, backed by an optional on-disk tile cache.
#[derive(Clone)]
pub struct HttpTileSource {
    client: Client,
    cache: Option<Arc<dyn BlobStore>>,
}

impl HttpTileSource {
    /// Build the HTTP client. Failure here means no tile can ever be fetched,
    /// so it is reported rather than degraded.
    pub fn new(fetch: &FetchConfig, cache: Option<Arc<dyn BlobStore>>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(fetch.user_agent.clone())
            .connect_timeout(Duration::from_secs(fetch.connect_timeout_secs))
            .timeout(Duration::from_secs(fetch.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpTileSource { client, cache })
    }

    async fn cached(&self, key: &str) -> Option<Vec<u8>> {
        let cache = self.cache.as_ref()?;
        if !cache.exists(key).await {
            tracing::debug!("Tile cache miss: {}", key);
            return None;
        }
        match cache.read(key).await {
            Ok(bytes) if !bytes.is_empty() => {
                tracing::debug!("Tile cache hit: {}", key);
                Some(bytes)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Failed to read cached tile {}: {}", key, e);
                None
            }
        }
    }
}

#[async_trait]
impl TileSource for HttpTileSource {
    async fn fetch_tile(&self, template: &str, tile: TileCoord) -> Result<Vec<u8>> {
        let url = tile_url(template, tile);
        let key = tile_cache_key(&url);

        if let Some(bytes) = self.cached(&key).await {
            return Ok(bytes);
        }

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::TileFetch(format!("Timed out fetching {}", url))
            } else {
                AppError::TileFetch(format!("Request for {} failed: {}", url, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::TileFetch(format!("HTTP {} from {}", status, url)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::TileFetch(format!("Failed to read body of {}: {}", url, e)))?;

        if bytes.is_empty() {
            return Err(AppError::TileFetch(format!("Empty tile from {}", url)));
        }
        if image::guess_format(&bytes).is_err() {
            return Err(AppError::TileFetch(format!("Non-image response from {}", url)));
        }

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.write(&key, &bytes).await {
                tracing::warn!(
                    "Failed to cache tile {} in {}: {}",
                    key,
                    cache.backend_name(),
                    e
                );
            }
        }

        Ok(bytes.to_vec())
    }
}
