use crate::constants::*;
use crate::models::OutputFormat;
use std::env;
use std::path::PathBuf;

/// A named tile source. The template carries `{Z}`, `{X}` and `{Y}`
/// placeholders (lowercase accepted too).
#[derive(Debug, Clone, PartialEq)]
pub struct MapSource {
    pub name: String,
    pub url_template: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Ordered; the first entry is the default map type.
    pub map_sources: Vec<MapSource>,
    pub cache: CacheConfig,
    pub render: RenderConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Send caching headers and answer conditional requests.
    pub use_http_cache: bool,
    /// Keep fetched tiles on disk.
    pub use_tile_cache: bool,
    /// Keep composed maps on disk.
    pub use_map_cache: bool,
    pub tile_cache_dir: PathBuf,
    pub map_cache_dir: PathBuf,
    /// Browser cache horizon for `Cache-Control` / `Expires`.
    pub expire_days: u64,
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Lower auto-zoom bound; `None` disables auto-zoom.
    pub min_zoom: Option<u8>,
    /// Upper auto-zoom bound; `None` disables auto-zoom.
    pub max_zoom: Option<u8>,
    pub default_width: u32,
    pub default_height: u32,
    pub default_format: OutputFormat,
    pub allowed_formats: Vec<OutputFormat>,
    pub allowed_scales: Vec<u32>,
    pub jpeg_quality: u8,
    pub marker_dir: PathBuf,
    /// Attribution image drawn in the bottom-right corner.
    pub logo_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    /// Tiles of one map fetched in parallel.
    pub concurrency: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            use_http_cache: true,
            use_tile_cache: true,
            use_map_cache: true,
            tile_cache_dir: PathBuf::from(DEFAULT_TILE_CACHE_DIR),
            map_cache_dir: PathBuf::from(DEFAULT_MAP_CACHE_DIR),
            expire_days: DEFAULT_EXPIRE_DAYS,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            min_zoom: Some(DEFAULT_MIN_ZOOM),
            max_zoom: Some(DEFAULT_MAX_ZOOM),
            default_width: DEFAULT_WIDTH,
            default_height: DEFAULT_HEIGHT,
            default_format: OutputFormat::Png,
            allowed_formats: vec![OutputFormat::Png, OutputFormat::Jpeg, OutputFormat::Gif],
            allowed_scales: vec![1, 2, 4],
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            marker_dir: PathBuf::from(DEFAULT_MARKER_DIR),
            logo_path: None,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("staticmap/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout_secs: DEFAULT_TILE_CONNECT_TIMEOUT_SECONDS,
            timeout_secs: DEFAULT_TILE_TIMEOUT_SECONDS,
            concurrency: DEFAULT_TILE_CONCURRENCY,
        }
    }
}

impl RenderConfig {
    /// Auto-zoom bounds, only when both are set and ordered.
    pub fn autozoom_bounds(&self) -> Option<(u8, u8)> {
        match (self.min_zoom, self.max_zoom) {
            (Some(min), Some(max)) if min <= max => Some((min, max.min(MAX_ZOOM))),
            _ => None,
        }
    }

    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let (default_width, default_height) = match env::var("STATICMAP_DEFAULT_SIZE") {
            Ok(raw) => parse_size(&raw).ok_or("Invalid STATICMAP_DEFAULT_SIZE")?,
            Err(_) => (defaults.default_width, defaults.default_height),
        };

        let allowed_formats: Vec<OutputFormat> = match env::var("STATICMAP_FORMATS") {
            Ok(raw) => raw
                .split(',')
                .map(|f| f.parse::<OutputFormat>())
                .collect::<Result<_, _>>()?,
            Err(_) => defaults.allowed_formats,
        };
        let default_format = *allowed_formats
            .first()
            .ok_or("STATICMAP_FORMATS must name at least one format")?;

        let allowed_scales: Vec<u32> = match env::var("STATICMAP_SCALES") {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim().parse::<u32>())
                .collect::<Result<_, _>>()
                .map_err(|_| "Invalid STATICMAP_SCALES")?,
            Err(_) => defaults.allowed_scales,
        };
        if allowed_scales.iter().any(|s| ![1, 2, 4].contains(s)) {
            return Err("STATICMAP_SCALES may only contain 1, 2 and 4".to_string());
        }

        Ok(Self {
            min_zoom: optional_zoom("STATICMAP_MIN_ZOOM", defaults.min_zoom)?,
            max_zoom: optional_zoom("STATICMAP_MAX_ZOOM", defaults.max_zoom)?,
            default_width,
            default_height,
            default_format,
            allowed_formats,
            allowed_scales,
            jpeg_quality: env::var("STATICMAP_JPEG_QUALITY")
                .unwrap_or_else(|_| defaults.jpeg_quality.to_string())
                .parse()
                .map_err(|_| "Invalid STATICMAP_JPEG_QUALITY")?,
            marker_dir: env::var("STATICMAP_MARKER_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.marker_dir),
            logo_path: env::var("STATICMAP_LOGO").ok().map(PathBuf::from),
        })
    }
}

impl CacheConfig {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        Ok(Self {
            use_http_cache: flag("STATICMAP_HTTP_CACHE", defaults.use_http_cache)?,
            use_tile_cache: flag("STATICMAP_TILE_CACHE", defaults.use_tile_cache)?,
            use_map_cache: flag("STATICMAP_MAP_CACHE", defaults.use_map_cache)?,
            tile_cache_dir: env::var("STATICMAP_TILE_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.tile_cache_dir),
            map_cache_dir: env::var("STATICMAP_MAP_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.map_cache_dir),
            expire_days: env::var("STATICMAP_EXPIRE_DAYS")
                .unwrap_or_else(|_| defaults.expire_days.to_string())
                .parse()
                .map_err(|_| "Invalid STATICMAP_EXPIRE_DAYS")?,
        })
    }
}

impl FetchConfig {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let concurrency: usize = env::var("STATICMAP_TILE_CONCURRENCY")
            .unwrap_or_else(|_| defaults.concurrency.to_string())
            .parse()
            .map_err(|_| "Invalid STATICMAP_TILE_CONCURRENCY")?;
        if concurrency == 0 {
            return Err("STATICMAP_TILE_CONCURRENCY must be at least 1".to_string());
        }

        Ok(Self {
            user_agent: env::var("STATICMAP_USER_AGENT").unwrap_or(defaults.user_agent),
            connect_timeout_secs: env::var("STATICMAP_CONNECT_TIMEOUT_SECS")
                .unwrap_or_else(|_| defaults.connect_timeout_secs.to_string())
                .parse()
                .map_err(|_| "Invalid STATICMAP_CONNECT_TIMEOUT_SECS")?,
            timeout_secs: env::var("STATICMAP_TIMEOUT_SECS")
                .unwrap_or_else(|_| defaults.timeout_secs.to_string())
                .parse()
                .map_err(|_| "Invalid STATICMAP_TIMEOUT_SECS")?,
            concurrency,
        })
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenv::dotenv().ok();

        let map_sources = parse_map_sources(
            &env::var("STATICMAP_SOURCES").unwrap_or_else(|_| DEFAULT_MAP_SOURCES.to_string()),
        )?;

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| "Invalid PORT")?,
            map_sources,
            cache: CacheConfig::from_env()?,
            render: RenderConfig::from_env()?,
            fetch: FetchConfig::from_env()?,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn map_source(&self, name: &str) -> Option<&MapSource> {
        self.map_sources.iter().find(|s| s.name == name)
    }

    /// First configured source. `from_env` and the `StaticMapService`
    /// constructors reject configs without one.
    pub fn default_map_source(&self) -> &MapSource {
        &self.map_sources[0]
    }
}

/// Parse `name=template;name=template`. Order is preserved.
pub fn parse_map_sources(raw: &str) -> Result<Vec<MapSource>, String> {
    let sources: Vec<MapSource> = raw
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, template) = entry
                .split_once('=')
                .ok_or_else(|| format!("Invalid map source '{}': expected name=template", entry))?;
            let (name, template) = (name.trim(), template.trim());
            if name.is_empty() || template.is_empty() {
                return Err(format!("Invalid map source '{}'", entry));
            }
            Ok(MapSource {
                name: name.to_string(),
                url_template: template.to_string(),
            })
        })
        .collect::<Result<_, String>>()?;

    if sources.is_empty() {
        return Err("STATICMAP_SOURCES must define at least one map source".to_string());
    }
    Ok(sources)
}

fn flag(name: &str, default: bool) -> Result<bool, String> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(format!("Invalid {}", name)),
        },
        Err(_) => Ok(default),
    }
}

fn optional_zoom(name: &str, default: Option<u8>) -> Result<Option<u8>, String> {
    match env::var(name) {
        Ok(raw) if matches!(raw.trim(), "off" | "none" | "") => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|z| *z <= MAX_ZOOM)
            .map(Some)
            .ok_or_else(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}

fn parse_size(raw: &str) -> Option<(u32, u32)> {
    let (w, h) = raw.trim().split_once('x')?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    (w > 0 && h > 0 && w <= MAX_CANVAS_DIMENSION && h <= MAX_CANVAS_DIMENSION).then_some((w, h))
}
