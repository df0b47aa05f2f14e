use crate::cache::{BlobStore, CacheKey, CachePolicy, ConditionalHeaders, DiskStore};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{MapQuery, OutputFormat, RenderRequest};
use crate::services::assets::AssetStore;
use crate::services::compositor::Compositor;
use crate::services::markers::MarkerPainter;
use crate::services::output;
use crate::services::tile_source::{HttpTileSource, TileSource};
use image::{imageops, RgbaImage};
use std::sync::Arc;
use std::time::SystemTime;

/// Outcome of a map request.
#[derive(Debug)]
pub enum MapResponse {
    /// The client already holds this exact image.
    NotModified { key: CacheKey },
    Image {
        key: CacheKey,
        format: OutputFormat,
        body: Vec<u8>,
        /// Timestamp of the map cache entry; `None` when the map is not cached.
        last_modified: Option<SystemTime>,
        from_cache: bool,
    },
}

/// Serves static maps: resolves requests, consults the cache tiers and runs
/// the render pipeline on a miss.
pub struct StaticMapService {
    config: Config,
    compositor: Compositor,
    markers: MarkerPainter,
    assets: AssetStore,
    map_cache: Option<Arc<dyn BlobStore>>,
}

impl StaticMapService {
    /// Build the service with the HTTP tile source and disk caches described
    /// by `config`.
    pub fn new(config: Config) -> Result<Self> {
        let tile_cache: Option<Arc<dyn BlobStore>> = config
            .cache
            .use_tile_cache
            .then(|| Arc::new(DiskStore::new(&config.cache.tile_cache_dir)) as Arc<dyn BlobStore>);
        let map_cache: Option<Arc<dyn BlobStore>> = config
            .cache
            .use_map_cache
            .then(|| Arc::new(DiskStore::new(&config.cache.map_cache_dir)) as Arc<dyn BlobStore>);

        let source = Arc::new(HttpTileSource::new(&config.fetch, tile_cache)?);
        Self::with_stores(config, source, map_cache)
    }

    /// Build the service around a custom tile source, keeping the configured
    /// map cache.
    pub fn with_tile_source(config: Config, source: Arc<dyn TileSource>) -> Result<Self> {
        let map_cache: Option<Arc<dyn BlobStore>> = config
            .cache
            .use_map_cache
            .then(|| Arc::new(DiskStore::new(&config.cache.map_cache_dir)) as Arc<dyn BlobStore>);
        Self::with_stores(config, source, map_cache)
    }

    /// Fails when `config` names no map source, since no request could be
    /// resolved against it.
    pub fn with_stores(
        config: Config,
        source: Arc<dyn TileSource>,
        map_cache: Option<Arc<dyn BlobStore>>,
    ) -> Result<Self> {
        if config.map_sources.is_empty() {
            return Err(AppError::Internal("No map sources configured".to_string()));
        }

        let assets = AssetStore::new(&config.render.marker_dir);
        Ok(StaticMapService {
            compositor: Compositor::new(source, config.fetch.concurrency),
            markers: MarkerPainter::new(assets.clone()),
            assets,
            map_cache,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            enabled: self.config.cache.use_http_cache,
            expire_days: self.config.cache.expire_days,
        }
    }

    /// Answer a map request.
    ///
    /// Cache tiers are consulted cheapest first: a matching `If-None-Match`
    /// short-circuits before any IO, then the map cache is checked (and
    /// `If-Modified-Since` honoured against its timestamp), and only then is
    /// the map rendered.
    pub async fn handle(&self, query: &MapQuery, conditional: &ConditionalHeaders) -> Result<MapResponse> {
        let request = RenderRequest::resolve(query, &self.config);
        let key = CacheKey::derive(&request);
        let http_cache = self.config.cache.use_http_cache;

        if http_cache && conditional.etag_matches(&key) {
            tracing::debug!("ETag match for {}", key);
            return Ok(MapResponse::NotModified { key });
        }

        let format = request.viewport.format;
        let path = key.map_path(&request);

        if let Some(cache) = &self.map_cache {
            if cache.exists(&path).await {
                let modified = cache.modified(&path).await;
                if http_cache && modified.is_some_and(|m| conditional.not_modified_since(m)) {
                    tracing::debug!("Not modified since client copy: {}", path);
                    return Ok(MapResponse::NotModified { key });
                }
                match cache.read(&path).await {
                    Ok(body) => {
                        tracing::debug!("Map cache hit: {}", path);
                        return Ok(MapResponse::Image {
                            key,
                            format,
                            body,
                            last_modified: modified,
                            from_cache: true,
                        });
                    }
                    Err(e) => tracing::warn!(
                        "Failed to read cached map {} from {}: {}",
                        path,
                        cache.backend_name(),
                        e
                    ),
                }
            }
        }

        let body = self.render(&request).await?;

        let mut last_modified = None;
        if let Some(cache) = &self.map_cache {
            match cache.write(&path, &body).await {
                Ok(()) => last_modified = cache.modified(&path).await,
                Err(e) => tracing::warn!(
                    "Failed to cache map {} in {}: {}",
                    path,
                    cache.backend_name(),
                    e
                ),
            }
        }

        Ok(MapResponse::Image {
            key,
            format,
            body,
            last_modified,
            from_cache: false,
        })
    }

    /// Run the full pipeline for a resolved request and return the encoded
    /// image. Tile and icon problems degrade the picture but never fail it.
    pub async fn render(&self, request: &RenderRequest) -> Result<Vec<u8>> {
        let vp = request.viewport;
        tracing::info!(
            zoom = vp.zoom,
            lat = vp.center.lat,
            lon = vp.center.lon,
            markers = request.markers.len(),
            output = ?vp.output_size(),
            "Rendering {}x{}@{}x {} map from {}",
            vp.width,
            vp.height,
            vp.scale,
            vp.format,
            request.maptype
        );

        let mut canvas = self.compositor.compose(request).await;
        self.markers.draw(&mut canvas, request).await;
        self.draw_logo(&mut canvas).await;

        let quality = self.config.render.jpeg_quality;
        tokio::task::spawn_blocking(move || output::finish(canvas, vp.scale, vp.format, quality))
            .await
            .map_err(|e| AppError::Internal(format!("Encoder task failed: {}", e)))?
    }

    async fn draw_logo(&self, canvas: &mut RgbaImage) {
        let Some(path) = &self.config.render.logo_path else {
            return;
        };
        match self.assets.load(path).await {
            Some(logo) => {
                let x = i64::from(canvas.width()) - i64::from(logo.width());
                let y = i64::from(canvas.height()) - i64::from(logo.height());
                imageops::overlay(canvas, &*logo, x, y);
            }
            None => tracing::warn!("Attribution logo {} could not be loaded", path.display()),
        }
    }
}
