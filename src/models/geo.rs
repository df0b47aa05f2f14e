use geo::{BoundingRect, MultiPoint, Point};

/// Geographic position in degrees.
///
/// No range validation: out-of-range input is accepted and simply projects
/// to tile indices outside the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoPoint { lat, lon }
    }
}

/// Integer tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: i64,
    pub y: i64,
    pub zoom: u8,
}

impl TileCoord {
    pub fn new(x: i64, y: i64, zoom: u8) -> Self {
        TileCoord { x, y, zoom }
    }

    /// Number of tiles along one axis at this zoom.
    pub fn world_size(&self) -> i64 {
        1_i64 << self.zoom
    }

    /// Tile address with x wrapped into the world, or `None` when y falls
    /// above the north edge or below the south edge.
    pub fn normalized(&self) -> Option<TileCoord> {
        let n = self.world_size();
        if self.y < 0 || self.y >= n {
            return None;
        }
        Some(TileCoord {
            x: self.x.rem_euclid(n),
            y: self.y,
            zoom: self.zoom,
        })
    }
}

/// Envelope around a set of markers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_center: f64,
    pub lon_center: f64,
    pub lat_size: f64,
    pub lon_size: f64,
}

impl BoundingBox {
    /// Compute the envelope of the given points; `None` when empty.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a GeoPoint>,
    {
        let multi: MultiPoint<f64> = points
            .into_iter()
            .map(|p| Point::new(p.lon, p.lat))
            .collect::<Vec<_>>()
            .into();
        let rect = multi.bounding_rect()?;

        Some(BoundingBox {
            lat_min: rect.min().y,
            lat_max: rect.max().y,
            lon_min: rect.min().x,
            lon_max: rect.max().x,
            lat_center: (rect.min().y + rect.max().y) / 2.0,
            lon_center: (rect.min().x + rect.max().x) / 2.0,
            lat_size: rect.height(),
            lon_size: rect.width(),
        })
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(self.lat_center, self.lon_center)
    }
}
