pub mod geo;
pub mod marker;
pub mod request;
pub mod viewport;

pub use geo::{BoundingBox, GeoPoint, TileCoord};
pub use marker::{parse_marker_set, MarkerSpec};
pub use request::{MapQuery, RenderRequest};
pub use viewport::{OutputFormat, Viewport};
