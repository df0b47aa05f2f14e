//! Stable application-wide constants.
//!
//! Values here are structural invariants of the tile ecosystem and default
//! fallbacks for env-var-based configuration. They should rarely change.
//! Deployment knobs live in [`Config`](crate::config::Config) instead.

// --- Server defaults (used when HOST / PORT env vars are absent) ---

/// Default bind address for the HTTP server.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default port for the HTTP server.
pub const DEFAULT_PORT: &str = "3000";

// --- Tile ecosystem invariants ---

/// Edge length of a raster tile in pixels. Must match the tile sources.
pub const TILE_SIZE: u32 = 256;
/// Highest zoom level served by the tile sources.
pub const MAX_ZOOM: u8 = 18;

/// Default map source, used when `STATICMAP_SOURCES` is absent.
pub const DEFAULT_MAP_SOURCES: &str = "mapnik=https://tile.openstreetmap.org/{Z}/{X}/{Y}.png";

// --- Canvas defaults ---

/// Default canvas width when the request has no usable `size`.
pub const DEFAULT_WIDTH: u32 = 500;
/// Default canvas height when the request has no usable `size`.
pub const DEFAULT_HEIGHT: u32 = 350;
/// Upper bound on either logical canvas dimension.
pub const MAX_CANVAS_DIMENSION: u32 = 2048;

// --- Auto-zoom ---

/// Pixels subtracted from each canvas dimension before fitting markers,
/// so markers never touch the edge.
pub const AUTOZOOM_MARGIN_PX: u32 = 20;
/// Default lower auto-zoom bound. Overridden by `STATICMAP_MIN_ZOOM`.
pub const DEFAULT_MIN_ZOOM: u8 = 12;
/// Default upper auto-zoom bound. Overridden by `STATICMAP_MAX_ZOOM`.
pub const DEFAULT_MAX_ZOOM: u8 = 18;

// --- Tile fetching ---

/// Connect timeout per tile request (seconds).
pub const DEFAULT_TILE_CONNECT_TIMEOUT_SECONDS: u64 = 3;
/// Total timeout per tile request (seconds).
pub const DEFAULT_TILE_TIMEOUT_SECONDS: u64 = 5;
/// Tiles fetched in parallel for a single map.
pub const DEFAULT_TILE_CONCURRENCY: usize = 8;

// --- Cache defaults ---

pub const DEFAULT_TILE_CACHE_DIR: &str = "cache/tiles";
pub const DEFAULT_MAP_CACHE_DIR: &str = "cache/maps";
/// Browser cache horizon: 14 days. Overridden by `STATICMAP_EXPIRE_DAYS`.
pub const DEFAULT_EXPIRE_DAYS: u64 = 14;
/// Hex characters per shard directory in the map cache path.
pub const MAP_CACHE_SHARD_WIDTH: usize = 2;
/// Maximum decoded marker/logo images memoised in-process.
pub const ASSET_CACHE_MAX_ENTRIES: u64 = 256;

// --- Output ---

/// Default JPEG quality. Overridden by `STATICMAP_JPEG_QUALITY`.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;
/// GIF quantizer speed (1 = best palette, 30 = fastest).
pub const GIF_QUANTIZER_SPEED: i32 = 10;

// --- Markers ---

pub const DEFAULT_MARKER_DIR: &str = "images/markers";
/// Number of auto-numbered default icons (`lightblue1` .. `lightblueN`).
/// Marker indexes beyond this wrap around.
pub const DEFAULT_MARKER_CYCLE: usize = 99;
/// Family prefix of the auto-numbered default icons.
pub const DEFAULT_MARKER_FAMILY: &str = "lightblue";
