use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use staticmap::cache::{BlobStore, DiskStore};
use staticmap::config::{CacheConfig, Config, FetchConfig, MapSource, RenderConfig};
use staticmap::error::{AppError, Result};
use staticmap::models::TileCoord;
use staticmap::services::TileSource;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;

/// Color of every tile served by [`StubTileSource`].
#[allow(dead_code)]
pub const TILE_COLOR: Rgba<u8> = Rgba([40, 120, 200, 255]);

/// Color of the `lightblue1.png` icon installed by [`test_config`].
#[allow(dead_code)]
pub const MARKER_COLOR: Rgba<u8> = Rgba([220, 20, 60, 255]);

/// Encode a solid-color PNG.
#[allow(dead_code)]
pub fn png_bytes(width: u32, height: u32, color: Rgba<u8>) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    RgbaImage::from_pixel(width, height, color)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

/// In-process tile source: serves one solid tile, records requests and
/// fails for chosen tiles.
#[allow(dead_code)]
pub struct StubTileSource {
    tile: Vec<u8>,
    failing: Vec<(i64, i64)>,
    calls: AtomicUsize,
    requested: Mutex<Vec<TileCoord>>,
}

#[allow(dead_code)]
impl StubTileSource {
    pub fn new() -> Self {
        Self::failing_at(Vec::new())
    }

    pub fn failing_at(failing: Vec<(i64, i64)>) -> Self {
        StubTileSource {
            tile: png_bytes(256, 256, TILE_COLOR),
            failing,
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<TileCoord> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl TileSource for StubTileSource {
    async fn fetch_tile(&self, _template: &str, tile: TileCoord) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(tile);
        if self.failing.contains(&(tile.x, tile.y)) {
            return Err(AppError::TileFetch(format!("stub timeout at {:?}", tile)));
        }
        Ok(self.tile.clone())
    }
}

/// Disk store that counts writes that reach it.
#[allow(dead_code)]
pub struct CountingStore {
    inner: DiskStore,
    writes: AtomicUsize,
}

#[allow(dead_code)]
impl CountingStore {
    pub fn new(root: &Path) -> Self {
        CountingStore {
            inner: DiskStore::new(root),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for CountingStore {
    async fn exists(&self, key: &str) -> bool {
        self.inner.exists(key).await
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(key, data).await
    }

    async fn modified(&self, key: &str) -> Option<SystemTime> {
        self.inner.modified(key).await
    }

    fn backend_name(&self) -> &'static str {
        "counting-disk"
    }
}

/// Configuration rooted in `root`: both disk caches and a marker directory
/// holding a single `lightblue1.png` icon.
#[allow(dead_code)]
pub fn test_config(root: &Path) -> Config {
    let marker_dir = root.join("markers");
    std::fs::create_dir_all(&marker_dir).unwrap();
    std::fs::write(marker_dir.join("lightblue1.png"), png_bytes(10, 10, MARKER_COLOR)).unwrap();

    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        map_sources: vec![
            MapSource {
                name: "mapnik".to_string(),
                url_template: "http://tiles.test/mapnik/{Z}/{X}/{Y}.png".to_string(),
            },
            MapSource {
                name: "cycle".to_string(),
                url_template: "http://tiles.test/cycle/{Z}/{X}/{Y}.png".to_string(),
            },
        ],
        cache: CacheConfig {
            tile_cache_dir: root.join("tiles"),
            map_cache_dir: root.join("maps"),
            ..CacheConfig::default()
        },
        render: RenderConfig {
            marker_dir,
            ..RenderConfig::default()
        },
        fetch: FetchConfig::default(),
    }
}

/// Build query pairs from literals.
#[allow(dead_code)]
pub fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
