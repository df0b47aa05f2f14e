use crate::constants::TILE_SIZE;
use crate::models::{RenderRequest, TileCoord, Viewport};
use crate::services::projection::CenterCoords;
use crate::services::tile_source::TileSource;
use futures::stream::{self, StreamExt};
use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use std::sync::Arc;

/// Canvas color behind the tile grid.
pub const BACKGROUND: Rgba<u8> = Rgba([0xE5, 0xE3, 0xDF, 0xFF]);
/// Fill of a tile that could not be fetched or decoded.
pub const PLACEHOLDER_FILL: Rgba<u8> = Rgba([0xEE, 0xEE, 0xEE, 0xFF]);
const PLACEHOLDER_BORDER: Rgba<u8> = Rgba([0xC8, 0xC8, 0xC8, 0xFF]);
const PLACEHOLDER_TEXT: Rgba<u8> = Rgba([0xC0, 0x30, 0x30, 0xFF]);

/// Integer tile range covering a viewport, plus where its first tile lands
/// on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub zoom: u8,
    pub start_x: i64,
    pub end_x: i64,
    pub start_y: i64,
    pub end_y: i64,
    origin_x: i64,
    origin_y: i64,
}

impl TileGrid {
    pub fn covering(viewport: &Viewport) -> Self {
        let center = CenterCoords::of(viewport);
        let tile = f64::from(TILE_SIZE);
        let half_w = f64::from(viewport.width) / tile / 2.0;
        let half_h = f64::from(viewport.height) / tile / 2.0;

        let start_x = (center.x - half_w).floor() as i64;
        let end_x = (center.x + half_w).ceil() as i64;
        let start_y = (center.y - half_h).floor() as i64;
        let end_y = (center.y + half_h).ceil() as i64;

        let size = i64::from(TILE_SIZE);
        TileGrid {
            zoom: viewport.zoom,
            start_x,
            end_x,
            start_y,
            end_y,
            origin_x: center.offset_x
                + i64::from(viewport.width / 2)
                + (start_x - center.x.floor() as i64) * size,
            origin_y: center.offset_y
                + i64::from(viewport.height / 2)
                + (start_y - center.y.floor() as i64) * size,
        }
    }

    /// Tiles in row-major order over x then y.
    pub fn tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (self.start_x..=self.end_x)
            .flat_map(move |x| (self.start_y..=self.end_y).map(move |y| TileCoord::new(x, y, self.zoom)))
    }

    pub fn len(&self) -> usize {
        ((self.end_x - self.start_x + 1) * (self.end_y - self.start_y + 1)) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Canvas position of the top-left corner of `tile`.
    pub fn destination(&self, tile: &TileCoord) -> (i64, i64) {
        let size = i64::from(TILE_SIZE);
        (
            self.origin_x + (tile.x - self.start_x) * size,
            self.origin_y + (tile.y - self.start_y) * size,
        )
    }
}

/// Assembles the tile layer of a map.
pub struct Compositor {
    source: Arc<dyn TileSource>,
    concurrency: usize,
    placeholder: RgbaImage,
}

impl Compositor {
    pub fn new(source: Arc<dyn TileSource>, concurrency: usize) -> Self {
        Compositor {
            source,
            concurrency: concurrency.max(1),
            placeholder: placeholder_tile(),
        }
    }

    /// Fetch every tile of the grid and paint it onto a fresh canvas of the
    /// logical viewport size. Never fails: missing tiles become placeholders.
    pub async fn compose(&self, request: &RenderRequest) -> RgbaImage {
        let viewport = &request.viewport;
        let grid = TileGrid::covering(viewport);
        let template = request.tile_template.as_str();

        let mut loaded: Vec<(TileCoord, Option<RgbaImage>)> = stream::iter(grid.tiles())
            .map(|tile| async move { (tile, self.load_tile(template, tile).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        loaded.sort_by_key(|(tile, _)| (tile.x, tile.y));

        let mut canvas = RgbaImage::from_pixel(viewport.width, viewport.height, BACKGROUND);
        let mut failed = 0usize;
        for (tile, image) in &loaded {
            let (dx, dy) = grid.destination(tile);
            match image {
                Some(image) => imageops::replace(&mut canvas, image, dx, dy),
                None => {
                    failed += 1;
                    imageops::replace(&mut canvas, &self.placeholder, dx, dy);
                }
            }
        }

        tracing::debug!(
            zoom = grid.zoom,
            tiles = grid.len(),
            failed,
            "Composed {}x{} tile layer",
            viewport.width,
            viewport.height
        );
        canvas
    }

    async fn load_tile(&self, template: &str, tile: TileCoord) -> Option<RgbaImage> {
        let Some(address) = tile.normalized() else {
            tracing::debug!("Tile {:?} lies outside the world", tile);
            return None;
        };

        let bytes = match self.source.fetch_tile(template, address).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Tile {}/{}/{} unavailable: {}", address.zoom, address.x, address.y, e);
                return None;
            }
        };

        match image::load_from_memory(&bytes) {
            Ok(image) => Some(image.to_rgba8()),
            Err(e) => {
                tracing::warn!("Tile {}/{}/{} undecodable: {}", address.zoom, address.x, address.y, e);
                None
            }
        }
    }
}

// 5x7 glyphs, one row per byte, most significant of the low five bits leftmost.
const GLYPH_E: [u8; 7] = [0b00000, 0b00000, 0b01110, 0b10001, 0b11111, 0b10000, 0b01111];
const GLYPH_R: [u8; 7] = [0b00000, 0b00000, 0b10110, 0b11001, 0b10000, 0b10000, 0b10000];
const GLYPH_SCALE: u32 = 4;

/// A tile-sized stand-in for a tile that could not be loaded: a flat fill,
/// a thin border and the label "err".
pub fn placeholder_tile() -> RgbaImage {
    let mut tile = RgbaImage::from_pixel(TILE_SIZE, TILE_SIZE, PLACEHOLDER_FILL);
    draw_hollow_rect_mut(&mut tile, Rect::at(0, 0).of_size(TILE_SIZE, TILE_SIZE), PLACEHOLDER_BORDER);

    let glyphs = [GLYPH_E, GLYPH_R, GLYPH_R];
    let columns = glyphs.len() as u32 * 6 - 1;
    let left = ((TILE_SIZE - columns * GLYPH_SCALE) / 2) as i32;
    let top = ((TILE_SIZE - 7 * GLYPH_SCALE) / 2) as i32;
    let step = GLYPH_SCALE as i32;

    for (index, glyph) in glyphs.iter().enumerate() {
        let glyph_left = left + index as i32 * 6 * step;
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..5 {
                if bits & (0b10000 >> col) != 0 {
                    draw_filled_rect_mut(
                        &mut tile,
                        Rect::at(glyph_left + col * step, top + row as i32 * step)
                            .of_size(GLYPH_SCALE, GLYPH_SCALE),
                        PLACEHOLDER_TEXT,
                    );
                }
            }
        }
    }

    tile
}
