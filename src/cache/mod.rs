use crate::constants::MAP_CACHE_SHARD_WIDTH;
use crate::error::Result;
use crate::models::{MarkerSpec, RenderRequest};
use async_trait::async_trait;
use std::time::SystemTime;

pub mod disk;
pub mod http;

pub use disk::DiskStore;
pub use http::{CachePolicy, ConditionalHeaders};

/// Hierarchical byte store shared by the tile and map cache tiers.
///
/// Keys are `/`-separated relative paths. Entries are write-once: writing
/// an existing key is a no-op, so concurrent writers never clobber a file a
/// reader is looking at.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn exists(&self, key: &str) -> bool;

    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Persist `data`, creating any missing parent levels first.
    async fn write(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Last modification time, used as the freshness timestamp.
    async fn modified(&self, key: &str) -> Option<SystemTime>;

    /// Human-readable name for logging
    fn backend_name(&self) -> &'static str;
}

/// Identity of a composed map: a 128-bit xxh3 over the canonical parameter
/// tuple, as 32 lowercase hex characters. Also serves as the ETag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key of a resolved request.
    ///
    /// Markers are serialized in sorted order, so two requests naming the
    /// same marker multiset in a different order share a key.
    pub fn derive(request: &RenderRequest) -> Self {
        let vp = &request.viewport;
        let mut markers: Vec<String> = request.markers.iter().map(MarkerSpec::canonical).collect();
        markers.sort();

        let canonical = format!(
            "{}&{}&{}&{}&{}&{}&{}&{}&{}",
            vp.zoom,
            vp.center.lat,
            vp.center.lon,
            vp.width,
            vp.height,
            vp.scale,
            vp.format,
            request.maptype,
            markers.join("|")
        );

        CacheKey(format!(
            "{:032x}",
            xxhash_rust::xxh3::xxh3_128(canonical.as_bytes())
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Map cache location: `<maptype>/<zoom>/<ab>/<cd>/<rest>.<ext>`. The two
    /// shard levels keep every directory small.
    pub fn map_path(&self, request: &RenderRequest) -> String {
        let (first, rest) = self.0.split_at(MAP_CACHE_SHARD_WIDTH);
        let (second, rest) = rest.split_at(MAP_CACHE_SHARD_WIDTH);
        format!(
            "{}/{}/{}/{}/{}.{}",
            request.maptype,
            request.viewport.zoom,
            first,
            second,
            rest,
            request.viewport.format.extension()
        )
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tile cache location: the tile URL without its scheme, so
/// `https://a.tile.org/3/4/5.png` lives at `a.tile.org/3/4/5.png`.
pub fn tile_cache_key(url: &str) -> String {
    match url.split_once("://") {
        Some((_, rest)) => rest.to_string(),
        None => url.to_string(),
    }
}
