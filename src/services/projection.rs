//! Web-Mercator conversion between geographic and fractional tile coordinates.

use crate::constants::TILE_SIZE;
use crate::models::{GeoPoint, Viewport};
use std::f64::consts::PI;

/// Fractional tile column of a longitude.
pub fn lon_to_tile(lon: f64, zoom: u8) -> f64 {
    (lon + 180.0) / 360.0 * 2_f64.powi(i32::from(zoom))
}

/// Fractional tile row of a latitude.
pub fn lat_to_tile(lat: f64, zoom: u8) -> f64 {
    let rad = lat * PI / 180.0;
    (1.0 - (rad.tan() + 1.0 / rad.cos()).ln() / PI) / 2.0 * 2_f64.powi(i32::from(zoom))
}

/// The viewport center expressed in tile space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterCoords {
    /// Fractional tile column of the center.
    pub x: f64,
    /// Fractional tile row of the center.
    pub y: f64,
    /// Pixel offset of the center tile's origin from the center point
    /// (always in `(-TILE_SIZE, 0]`).
    pub offset_x: i64,
    pub offset_y: i64,
}

impl CenterCoords {
    pub fn of(viewport: &Viewport) -> Self {
        let x = lon_to_tile(viewport.center.lon, viewport.zoom);
        let y = lat_to_tile(viewport.center.lat, viewport.zoom);
        let tile = f64::from(TILE_SIZE);
        CenterCoords {
            x,
            y,
            offset_x: ((x.floor() - x) * tile).floor() as i64,
            offset_y: ((y.floor() - y) * tile).floor() as i64,
        }
    }
}

/// Bound on projected pixel coordinates. Points far outside the world still
/// land off canvas, and offsets applied to them cannot overflow.
const PIXEL_LIMIT: f64 = i32::MAX as f64;

/// Canvas pixel position of a geographic point, relative to the top-left
/// corner of the logical canvas.
pub fn geo_to_pixel(point: &GeoPoint, viewport: &Viewport, center: &CenterCoords) -> (i64, i64) {
    let tile = f64::from(TILE_SIZE);
    let px = f64::from(viewport.width) / 2.0
        - tile * (center.x - lon_to_tile(point.lon, viewport.zoom));
    let py = f64::from(viewport.height) / 2.0
        - tile * (center.y - lat_to_tile(point.lat, viewport.zoom));
    (
        px.floor().clamp(-PIXEL_LIMIT, PIXEL_LIMIT) as i64,
        py.floor().clamp(-PIXEL_LIMIT, PIXEL_LIMIT) as i64,
    )
}
