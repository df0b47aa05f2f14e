use crate::config::Config;
use crate::constants::{AUTOZOOM_MARGIN_PX, MAX_CANVAS_DIMENSION, MAX_ZOOM};
use crate::models::marker::parse_marker_set;
use crate::models::{BoundingBox, GeoPoint, MarkerSpec, OutputFormat, Viewport};
use crate::services::autozoom;

/// Raw query parameters of a map request, before any interpretation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapQuery {
    pub center: Option<String>,
    pub zoom: Option<String>,
    pub size: Option<String>,
    pub scale: Option<String>,
    pub format: Option<String>,
    pub maptype: Option<String>,
    /// One entry per `markers` parameter; each is an independent marker set.
    pub markers: Vec<String>,
}

impl MapQuery {
    /// Collect query pairs. Scalar parameters keep their last occurrence,
    /// `markers` accumulates.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut query = MapQuery::default();
        for (key, value) in pairs {
            let value = Some(value).filter(|v| !v.trim().is_empty());
            match key.as_str() {
                "center" => query.center = value,
                "zoom" => query.zoom = value,
                "size" => query.size = value,
                "scale" => query.scale = value,
                "format" => query.format = value,
                "maptype" => query.maptype = value,
                "markers" => query.markers.extend(value),
                _ => {}
            }
        }
        query
    }
}

/// Everything the render pipeline needs, resolved once per request.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub viewport: Viewport,
    pub maptype: String,
    pub tile_template: String,
    /// Markers in draw order.
    pub markers: Vec<MarkerSpec>,
}

impl RenderRequest {
    /// Interpret a raw query against the configuration.
    ///
    /// Pure: no IO happens here, so the cache identity can be derived before
    /// any disk or network access. Malformed fields are defaulted or clamped,
    /// never rejected.
    pub fn resolve(query: &MapQuery, config: &Config) -> Self {
        let render = &config.render;

        let (width, height) = query
            .size
            .as_deref()
            .and_then(parse_size)
            .unwrap_or((render.default_width, render.default_height));

        let mut markers: Vec<MarkerSpec> = query
            .markers
            .iter()
            .flat_map(|raw| parse_marker_set(raw))
            .collect();
        markers.sort_by(MarkerSpec::draw_order);

        let requested_zoom = query.zoom.as_deref().map(parse_zoom);

        let (center, zoom) = match query.center.as_deref() {
            Some(raw) => (parse_center(raw), requested_zoom.unwrap_or(0)),
            None => match BoundingBox::from_points(markers.iter().map(|m| &m.geo)) {
                Some(bbox) => match render.autozoom_bounds() {
                    Some((min_zoom, max_zoom)) => {
                        let fit = autozoom::solve(
                            &bbox,
                            width.saturating_sub(AUTOZOOM_MARGIN_PX),
                            height.saturating_sub(AUTOZOOM_MARGIN_PX),
                            min_zoom,
                            max_zoom,
                        );
                        (fit.center, requested_zoom.unwrap_or(fit.zoom))
                    }
                    None => (bbox.center(), requested_zoom.unwrap_or(0)),
                },
                None => (GeoPoint::new(0.0, 0.0), requested_zoom.unwrap_or(0)),
            },
        };

        let source = query
            .maptype
            .as_deref()
            .and_then(|name| config.map_source(name))
            .unwrap_or_else(|| config.default_map_source());

        let format = query
            .format
            .as_deref()
            .and_then(|f| f.parse::<OutputFormat>().ok())
            .filter(|f| render.allowed_formats.contains(f))
            .unwrap_or(render.default_format);

        let scale = query
            .scale
            .as_deref()
            .map(leading_i64)
            .and_then(|s| u32::try_from(s).ok())
            .filter(|s| render.allowed_scales.contains(s))
            .unwrap_or(1);

        RenderRequest {
            viewport: Viewport {
                center,
                zoom,
                width,
                height,
                scale,
                format,
            },
            maptype: source.name.clone(),
            tile_template: source.url_template.clone(),
            markers,
        }
    }
}

fn parse_size(raw: &str) -> Option<(u32, u32)> {
    let (w, h) = raw.split_once(['x', 'X'])?;
    let (w, h) = (leading_i64(w), leading_i64(h));
    if w <= 0 || h <= 0 {
        return None;
    }
    let clamp = |v: i64| v.min(i64::from(MAX_CANVAS_DIMENSION)) as u32;
    Some((clamp(w), clamp(h)))
}

fn parse_center(raw: &str) -> GeoPoint {
    let mut fields = raw.splitn(2, ',');
    let lat = fields.next().map(leading_f64).unwrap_or(0.0);
    let lon = fields.next().map(leading_f64).unwrap_or(0.0);
    GeoPoint::new(lat, lon)
}

fn parse_zoom(raw: &str) -> u8 {
    leading_i64(raw).clamp(0, i64::from(MAX_ZOOM)) as u8
}

/// Read the longest numeric prefix of `raw` (`"12.5abc"` → 12.5), or 0 when
/// there is none.
pub(crate) fn leading_f64(raw: &str) -> f64 {
    let s = raw.trim();
    let bytes = s.as_bytes();
    let digits_in = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_digits = digits_in(end);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digits_in(end + 1);
        end += 1 + frac_digits;
    }
    if int_digits + frac_digits == 0 {
        return 0.0;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_digits = digits_in(end + 1 + sign);
        if exp_digits > 0 {
            end += 1 + sign + exp_digits;
        }
    }

    s[..end].parse().unwrap_or(0.0)
}

/// Integer flavour of [`leading_f64`], truncating toward zero.
pub(crate) fn leading_i64(raw: &str) -> i64 {
    leading_f64(raw).trunc() as i64
}
