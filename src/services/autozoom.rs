//! Best-fit center and zoom for a set of markers.

use crate::models::{BoundingBox, GeoPoint};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoZoom {
    pub center: GeoPoint,
    pub zoom: u8,
}

/// Degrees of longitude spanned by `width_px` at `zoom`.
pub fn degrees_width(width_px: u32, zoom: u8) -> f64 {
    f64::from(width_px) * 360.0 / 2_f64.powi(i32::from(zoom) + 8)
}

/// Degrees of latitude spanned by `height_px` at `zoom` around `lat_center`.
///
/// Corrected for Mercator foreshortening; without the cosine term the result
/// is only right on the equator.
pub fn degrees_height(height_px: u32, zoom: u8, lat_center: f64) -> f64 {
    let lat_correction = 360.0 * lat_center.to_radians().cos();
    lat_correction / 2_f64.powi(i32::from(zoom) + 8) * f64::from(height_px)
}

/// Whether a `width_px` x `height_px` window at `zoom` covers `bbox`.
pub fn covers(bbox: &BoundingBox, width_px: u32, height_px: u32, zoom: u8) -> bool {
    degrees_width(width_px, zoom) >= bbox.lon_size
        && degrees_height(height_px, zoom, bbox.lat_center) >= bbox.lat_size
}

/// Pick the highest zoom in `[min_zoom, max_zoom]` whose window covers the
/// marker box, centered on the box. When nothing fits, `min_zoom` is used
/// anyway.
pub fn solve(
    bbox: &BoundingBox,
    width_px: u32,
    height_px: u32,
    min_zoom: u8,
    max_zoom: u8,
) -> AutoZoom {
    let zoom = (min_zoom..=max_zoom)
        .rev()
        .find(|&z| covers(bbox, width_px, height_px, z))
        .unwrap_or(min_zoom);

    tracing::debug!(
        zoom,
        lat_size = bbox.lat_size,
        lon_size = bbox.lon_size,
        "Auto-zoom picked zoom {} for {}x{} px",
        zoom,
        width_px,
        height_px
    );

    AutoZoom {
        center: bbox.center(),
        zoom,
    }
}
