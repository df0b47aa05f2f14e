pub mod assets;
pub mod autozoom;
pub mod compositor;
pub mod markers;
pub mod output;
pub mod projection;
pub mod static_map;
pub mod tile_source;

pub use static_map::{MapResponse, StaticMapService};
pub use tile_source::{HttpTileSource, TileSource};
