//! Marker icon resolution and drawing.
//!
//! An icon name is matched against an ordered table of icon families; the
//! first family that claims it decides the asset file, the anchor and the
//! optional drop shadow. Anything unclaimed, or whose file is missing, falls
//! back to a numbered default icon and finally to a pin drawn in code.

use crate::constants::{DEFAULT_MARKER_CYCLE, DEFAULT_MARKER_FAMILY};
use crate::models::{MarkerSpec, RenderRequest};
use crate::services::assets::AssetStore;
use crate::services::projection::{geo_to_pixel, CenterCoords};
use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use std::sync::Arc;

/// Where an icon sits relative to its geographic point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconAnchor {
    /// Fixed pixel offset of the icon's top-left corner.
    Offset(i64, i64),
    /// Icon centered horizontally with its bottom edge on the point.
    BottomCenter,
}

impl IconAnchor {
    pub fn top_left(&self, (x, y): (i64, i64), icon: &RgbaImage) -> (i64, i64) {
        match *self {
            IconAnchor::Offset(dx, dy) => (x.saturating_add(dx), y.saturating_add(dy)),
            IconAnchor::BottomCenter => (
                x.saturating_sub(i64::from(icon.width() / 2)),
                y.saturating_sub(i64::from(icon.height())),
            ),
        }
    }
}

/// One family of icons that share a naming pattern and placement rules.
pub struct MarkerPrototype {
    pub family: &'static str,
    pub matches: fn(&str) -> bool,
    /// File name pattern; `{name}` is replaced by the icon name.
    pub asset_template: &'static str,
    /// File name pattern of the semi-transparent variant, if the family has one.
    pub transparent_template: Option<&'static str>,
    pub anchor: IconAnchor,
    /// Shadow file and its offset from the point.
    pub shadow: Option<(&'static str, (i64, i64))>,
}

const SHADOW_OFFSET: (i64, i64) = (-1, -13);

/// Icon families, most specific first.
pub static MARKER_PROTOTYPES: &[MarkerPrototype] = &[
    MarkerPrototype {
        family: "lightblue",
        matches: is_numbered_default,
        asset_template: "{name}.png",
        transparent_template: None,
        anchor: IconAnchor::BottomCenter,
        shadow: None,
    },
    MarkerPrototype {
        family: "ol-marker",
        matches: is_ol_marker,
        asset_template: "{name}.png",
        transparent_template: Some("{name}-transparent.png"),
        anchor: IconAnchor::Offset(-10, -25),
        shadow: Some(("marker_shadow.png", SHADOW_OFFSET)),
    },
    MarkerPrototype {
        family: "pushpin",
        matches: is_pushpin,
        asset_template: "{name}.png",
        transparent_template: Some("{name}-transparent.png"),
        anchor: IconAnchor::Offset(-10, -32),
        shadow: Some(("marker_shadow.png", SHADOW_OFFSET)),
    },
    MarkerPrototype {
        family: "bullseye",
        matches: is_bullseye,
        asset_template: "{name}.png",
        transparent_template: None,
        anchor: IconAnchor::Offset(-20, -20),
        shadow: None,
    },
    MarkerPrototype {
        family: "lettered",
        matches: is_lettered,
        asset_template: "{name}.png",
        transparent_template: None,
        anchor: IconAnchor::BottomCenter,
        shadow: Some(("shadow.png", (-10, -34))),
    },
];

const PUSHPIN_COLORS: [&str; 5] = ["pink", "purple", "red", "ltblu", "ylw"];
const LETTERED_COLORS: [&str; 10] = [
    "black", "brown", "green", "purple", "yellow", "blue", "gray", "orange", "red", "white",
];

fn is_numbered_default(name: &str) -> bool {
    name.strip_prefix(DEFAULT_MARKER_FAMILY)
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn is_ol_marker(name: &str) -> bool {
    matches!(name, "ol-marker" | "ol-marker-blue" | "ol-marker-gold" | "ol-marker-green")
}

fn is_pushpin(name: &str) -> bool {
    name.strip_suffix("-pushpin")
        .is_some_and(|color| PUSHPIN_COLORS.contains(&color))
}

fn is_bullseye(name: &str) -> bool {
    name == "bullseye"
}

fn is_lettered(name: &str) -> bool {
    LETTERED_COLORS.iter().any(|color| {
        name.strip_prefix(color).is_some_and(|label| {
            let mut chars = label.chars();
            matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_lowercase() || c.is_ascii_digit())
        })
    })
}

/// Icon name implied by a `color:` style when a marker names no icon.
fn color_icon(color: &str) -> String {
    let pin = match color {
        "blue" | "lightblue" => "ltblu",
        "yellow" => "ylw",
        other => other,
    };
    format!("{}-pushpin", pin)
}

/// A concrete icon choice: which files to draw and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIcon {
    pub asset: String,
    pub anchor: IconAnchor,
    pub shadow: Option<(String, (i64, i64))>,
}

impl ResolvedIcon {
    fn from_prototype(prototype: &MarkerPrototype, name: &str, transparent: bool) -> Self {
        let template = match prototype.transparent_template {
            Some(template) if transparent => template,
            _ => prototype.asset_template,
        };
        ResolvedIcon {
            asset: template.replace("{name}", name),
            anchor: prototype.anchor,
            shadow: prototype
                .shadow
                .map(|(file, offset)| (file.to_string(), offset)),
        }
    }
}

/// Look up the icon a marker asks for. `None` when the marker names no icon
/// or no family claims the name.
pub fn resolve_icon(marker: &MarkerSpec) -> Option<ResolvedIcon> {
    let name = match (&marker.icon_key, &marker.style_color) {
        (Some(key), _) => key.to_lowercase(),
        (None, Some(color)) => color_icon(color),
        (None, None) => return None,
    };
    MARKER_PROTOTYPES
        .iter()
        .find(|prototype| (prototype.matches)(&name))
        .map(|prototype| ResolvedIcon::from_prototype(prototype, &name, marker.transparent))
}

/// The numbered default icon for the marker at 1-based `position`. Numbers
/// cycle so any position has an icon.
pub fn default_icon(position: usize) -> ResolvedIcon {
    let number = (position.max(1) - 1) % DEFAULT_MARKER_CYCLE + 1;
    numbered_icon(number)
}

fn numbered_icon(number: usize) -> ResolvedIcon {
    ResolvedIcon {
        asset: format!("{}{}.png", DEFAULT_MARKER_FAMILY, number),
        anchor: IconAnchor::BottomCenter,
        shadow: None,
    }
}

struct LoadedIcon {
    image: Arc<RgbaImage>,
    anchor: IconAnchor,
    shadow: Option<(Arc<RgbaImage>, (i64, i64))>,
}

/// Draws a request's markers onto a composed tile layer.
#[derive(Clone)]
pub struct MarkerPainter {
    assets: AssetStore,
    fallback_pin: Arc<RgbaImage>,
}

impl MarkerPainter {
    pub fn new(assets: AssetStore) -> Self {
        MarkerPainter {
            assets,
            fallback_pin: Arc::new(builtin_pin()),
        }
    }

    /// Draw every marker in request order. Markers are expected to be sorted
    /// already, so later (southern) markers overlap earlier ones.
    pub async fn draw(&self, canvas: &mut RgbaImage, request: &RenderRequest) {
        if request.markers.is_empty() {
            return;
        }
        let viewport = &request.viewport;
        let center = CenterCoords::of(viewport);

        for (index, marker) in request.markers.iter().enumerate() {
            let icon = self.load_icon(marker, index + 1).await;
            let point = geo_to_pixel(&marker.geo, viewport, &center);

            if let Some((shadow, (dx, dy))) = &icon.shadow {
                let (sx, sy) = (point.0.saturating_add(*dx), point.1.saturating_add(*dy));
                imageops::overlay(canvas, &**shadow, sx, sy);
            }
            let (x, y) = icon.anchor.top_left(point, &icon.image);
            imageops::overlay(canvas, &*icon.image, x, y);
        }

        tracing::debug!("Drew {} markers", request.markers.len());
    }

    async fn load_icon(&self, marker: &MarkerSpec, position: usize) -> LoadedIcon {
        if let Some(resolved) = resolve_icon(marker) {
            if let Some(icon) = self.load_resolved(&resolved).await {
                return icon;
            }
            tracing::debug!("Icon {} missing, using default", resolved.asset);
        }

        for fallback in [default_icon(position), numbered_icon(1)] {
            if let Some(icon) = self.load_resolved(&fallback).await {
                return icon;
            }
        }

        tracing::warn!(
            "No marker icons found in {}, drawing built-in pin",
            self.assets.marker_dir().display()
        );
        LoadedIcon {
            image: Arc::clone(&self.fallback_pin),
            anchor: IconAnchor::BottomCenter,
            shadow: None,
        }
    }

    async fn load_resolved(&self, resolved: &ResolvedIcon) -> Option<LoadedIcon> {
        let image = self.assets.marker(&resolved.asset).await?;
        let shadow = match &resolved.shadow {
            Some((file, offset)) => self.assets.marker(file).await.map(|s| (s, *offset)),
            None => None,
        };
        Some(LoadedIcon {
            image,
            anchor: resolved.anchor,
            shadow,
        })
    }
}

pub const BUILTIN_PIN_COLOR: Rgba<u8> = Rgba([0x3A, 0x8E, 0xE6, 0xFF]);

/// A simple round-headed pin, used when no icon files are installed at all.
pub fn builtin_pin() -> RgbaImage {
    let (width, height) = (21u32, 30u32);
    let mut pin = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    let outline = Rgba([0x1F, 0x4E, 0x80, 0xFF]);

    draw_line_segment_mut(&mut pin, (10.0, 18.0), (10.0, 29.0), outline);
    draw_line_segment_mut(&mut pin, (9.0, 18.0), (10.0, 29.0), outline);
    draw_line_segment_mut(&mut pin, (11.0, 18.0), (10.0, 29.0), outline);
    draw_filled_circle_mut(&mut pin, (10, 10), 10, outline);
    draw_filled_circle_mut(&mut pin, (10, 10), 8, BUILTIN_PIN_COLOR);
    draw_filled_circle_mut(&mut pin, (10, 10), 3, Rgba([0xFF, 0xFF, 0xFF, 0xFF]));
    pin
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, OutputFormat, Viewport};

    fn marker(icon: Option<&str>) -> MarkerSpec {
        MarkerSpec::new(1.0, 1.0, icon)
    }

    fn close(a: &Rgba<u8>, b: &Rgba<u8>) -> bool {
        a.0.iter().zip(b.0.iter()).all(|(x, y)| x.abs_diff(*y) <= 1)
    }

    #[test]
    fn families_claim_their_names() {
        let family = |name: &str| {
            MARKER_PROTOTYPES
                .iter()
                .find(|p| (p.matches)(name))
                .map(|p| p.family)
        };
        assert_eq!(family("lightblue7"), Some("lightblue"));
        assert_eq!(family("ol-marker-gold"), Some("ol-marker"));
        assert_eq!(family("ylw-pushpin"), Some("pushpin"));
        assert_eq!(family("bullseye"), Some("bullseye"));
        assert_eq!(family("blues"), Some("lettered"));
        assert_eq!(family("redc"), Some("lettered"));
        assert_eq!(family("lightblue"), None);
        assert_eq!(family("ol-marker-red"), None);
        assert_eq!(family("redcc"), None);
        assert_eq!(family("nonexistent"), None);
    }

    #[test]
    fn resolution_applies_family_rules() {
        let ol = resolve_icon(&marker(Some("ol-marker-gold"))).unwrap();
        assert_eq!(ol.asset, "ol-marker-gold.png");
        assert_eq!(ol.anchor, IconAnchor::Offset(-10, -25));
        assert_eq!(ol.shadow, Some(("marker_shadow.png".to_string(), (-1, -13))));

        let mut transparent = marker(Some("red-pushpin"));
        transparent.transparent = true;
        assert_eq!(
            resolve_icon(&transparent).unwrap().asset,
            "red-pushpin-transparent.png"
        );

        let mut no_variant = marker(Some("bullseye"));
        no_variant.transparent = true;
        assert_eq!(resolve_icon(&no_variant).unwrap().asset, "bullseye.png");

        assert_eq!(resolve_icon(&marker(None)), None);
        assert_eq!(resolve_icon(&marker(Some("nonexistent"))), None);
    }

    #[test]
    fn color_style_picks_a_pushpin() {
        let mut styled = marker(None);
        styled.style_color = Some("yellow".to_string());
        assert_eq!(resolve_icon(&styled).unwrap().asset, "ylw-pushpin.png");

        styled.icon_key = Some("bullseye".to_string());
        assert_eq!(resolve_icon(&styled).unwrap().asset, "bullseye.png");
    }

    #[test]
    fn default_icons_cycle() {
        assert_eq!(default_icon(1).asset, "lightblue1.png");
        assert_eq!(default_icon(99).asset, "lightblue99.png");
        assert_eq!(default_icon(100).asset, "lightblue1.png");
        assert_eq!(default_icon(0).asset, "lightblue1.png");
    }

    #[test]
    fn anchors() {
        let icon = RgbaImage::new(20, 34);
        assert_eq!(IconAnchor::BottomCenter.top_left((100, 100), &icon), (90, 66));
        assert_eq!(IconAnchor::Offset(-10, -25).top_left((100, 100), &icon), (90, 75));
        assert_eq!(IconAnchor::BottomCenter.top_left((i64::MIN, 0), &icon), (i64::MIN, -34));
        assert_eq!(IconAnchor::Offset(10, 0).top_left((i64::MAX, 0), &icon), (i64::MAX, 0));
    }

    fn request_with(markers: Vec<MarkerSpec>) -> RenderRequest {
        RenderRequest {
            viewport: Viewport {
                center: GeoPoint::new(1.0, 1.0),
                zoom: 10,
                width: 200,
                height: 200,
                scale: 1,
                format: OutputFormat::Png,
            },
            maptype: "mapnik".to_string(),
            tile_template: String::new(),
            markers,
        }
    }

    #[tokio::test]
    async fn falls_back_to_builtin_pin() {
        let dir = tempfile::tempdir().unwrap();
        let painter = MarkerPainter::new(AssetStore::new(dir.path()));
        let mut canvas = RgbaImage::from_pixel(200, 200, Rgba([255, 255, 255, 255]));

        painter
            .draw(&mut canvas, &request_with(vec![marker(Some("nonexistent"))]))
            .await;

        // The point projects to (100, 100); the pin head is centered 20px above it.
        assert!(close(canvas.get_pixel(100, 75), &BUILTIN_PIN_COLOR));
    }

    #[tokio::test]
    async fn unresolved_icon_uses_numbered_default() {
        let dir = tempfile::tempdir().unwrap();
        let red = Rgba([255, 0, 0, 255]);
        RgbaImage::from_pixel(10, 10, red)
            .save(dir.path().join("lightblue1.png"))
            .unwrap();
        let painter = MarkerPainter::new(AssetStore::new(dir.path()));
        let mut canvas = RgbaImage::from_pixel(200, 200, Rgba([255, 255, 255, 255]));

        painter
            .draw(&mut canvas, &request_with(vec![marker(Some("nonexistent"))]))
            .await;

        assert!(close(canvas.get_pixel(100, 95), &red));
        assert_eq!(*canvas.get_pixel(100, 101), Rgba([255, 255, 255, 255]));
    }

    fn save(dir: &std::path::Path, name: &str, width: u32, height: u32, color: Rgba<u8>) {
        RgbaImage::from_pixel(width, height, color)
            .save(dir.join(name))
            .unwrap();
    }

    #[tokio::test]
    async fn shadow_is_drawn_under_the_icon() {
        let dir = tempfile::tempdir().unwrap();
        let gold = Rgba([230, 180, 20, 255]);
        let gray = Rgba([90, 90, 90, 255]);
        save(dir.path(), "ol-marker-gold.png", 20, 25, gold);
        save(dir.path(), "marker_shadow.png", 30, 20, gray);
        let painter = MarkerPainter::new(AssetStore::new(dir.path()));
        let mut canvas = RgbaImage::from_pixel(200, 200, Rgba([255, 255, 255, 255]));

        painter
            .draw(&mut canvas, &request_with(vec![marker(Some("ol-marker-gold"))]))
            .await;

        // Icon spans (90..110, 75..100); shadow spans (99..129, 87..107).
        assert!(close(canvas.get_pixel(105, 95), &gold));
        assert!(close(canvas.get_pixel(120, 100), &gray));
        assert!(close(canvas.get_pixel(95, 80), &gold));
    }

    #[tokio::test]
    async fn claimed_icon_without_file_uses_numbered_default() {
        let dir = tempfile::tempdir().unwrap();
        let red = Rgba([255, 0, 0, 255]);
        save(dir.path(), "lightblue1.png", 10, 10, red);
        let painter = MarkerPainter::new(AssetStore::new(dir.path()));
        let mut canvas = RgbaImage::from_pixel(200, 200, Rgba([255, 255, 255, 255]));

        let lettered = marker(Some("redc"));
        assert_eq!(resolve_icon(&lettered).unwrap().asset, "redc.png");
        painter.draw(&mut canvas, &request_with(vec![lettered])).await;

        assert!(close(canvas.get_pixel(100, 95), &red));
        assert_eq!(*canvas.get_pixel(100, 101), Rgba([255, 255, 255, 255]));
    }

    #[tokio::test]
    async fn marker_far_outside_the_world_is_skipped_quietly() {
        let dir = tempfile::tempdir().unwrap();
        save(dir.path(), "ol-marker.png", 20, 25, Rgba([255, 0, 0, 255]));
        save(dir.path(), "marker_shadow.png", 30, 20, Rgba([90, 90, 90, 255]));
        let painter = MarkerPainter::new(AssetStore::new(dir.path()));
        let white = Rgba([255, 255, 255, 255]);
        let mut canvas = RgbaImage::from_pixel(200, 200, white);

        let far = vec![
            MarkerSpec::new(10.0, -1e300, Some("ol-marker")),
            MarkerSpec::new(10.0, 1e300, None),
        ];
        painter.draw(&mut canvas, &request_with(far)).await;

        assert!(canvas.pixels().all(|p| *p == white));
    }
}
