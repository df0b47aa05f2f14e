use crate::models::request::leading_f64;
use crate::models::GeoPoint;
use std::cmp::Ordering;

/// One drawable marker, with the style that was in effect where it appeared.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub geo: GeoPoint,
    /// Icon name as requested (already reduced to a safe basename).
    pub icon_key: Option<String>,
    pub transparent: bool,
    pub style_color: Option<String>,
}

impl MarkerSpec {
    pub fn new(lat: f64, lon: f64, icon_key: Option<&str>) -> Self {
        MarkerSpec {
            geo: GeoPoint::new(lat, lon),
            icon_key: icon_key.map(str::to_string),
            transparent: false,
            style_color: None,
        }
    }

    /// Draw-order comparator: northern markers first, so southern markers end
    /// up on top. Ties fall through longitude (east first) and then the style
    /// fields so the order is total.
    pub fn draw_order(a: &MarkerSpec, b: &MarkerSpec) -> Ordering {
        b.geo
            .lat
            .total_cmp(&a.geo.lat)
            .then_with(|| b.geo.lon.total_cmp(&a.geo.lon))
            .then_with(|| a.icon_key.cmp(&b.icon_key))
            .then_with(|| a.transparent.cmp(&b.transparent))
            .then_with(|| a.style_color.cmp(&b.style_color))
    }

    /// Stable textual form used in cache keys.
    pub fn canonical(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.geo.lat,
            self.geo.lon,
            self.icon_key.as_deref().unwrap_or(""),
            u8::from(self.transparent),
            self.style_color.as_deref().unwrap_or("")
        )
    }
}

/// Style state carried through a marker set. Directives update it; every
/// marker after a directive inherits the current state.
#[derive(Debug, Clone, Default)]
struct SetStyle {
    color: Option<String>,
    transparent: bool,
}

impl SetStyle {
    fn apply_directive(&mut self, entry: &str) {
        for token in entry.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (key, value) = match token.split_once(':') {
                Some((k, v)) => (k.trim().to_lowercase(), Some(v.trim())),
                None => (token.to_lowercase(), None),
            };
            match (key.as_str(), value) {
                ("color", Some(v)) => {
                    self.color = sanitize_name(v).map(|c| c.to_lowercase());
                }
                ("transparent", None) => self.transparent = true,
                ("transparent", Some(v)) => {
                    self.transparent = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
                }
                ("opaque", None) => self.transparent = false,
                _ => tracing::debug!("Ignoring unknown marker style directive: {}", token),
            }
        }
    }
}

/// Parse one `markers` field into drawable markers.
///
/// Entries are separated by `|` (or a literal `%7C` left over from double
/// encoding) and have the form `lat,lon[,icon]`. An entry whose two leading
/// numeric fields both read as exactly zero is a style directive such as
/// `color:red` or `transparent:true`, not a coordinate; it is consumed and
/// changes the style of the markers after it in the same set. A genuine
/// marker at (0, 0) is therefore indistinguishable from a directive and is
/// dropped.
pub fn parse_marker_set(raw: &str) -> Vec<MarkerSpec> {
    let mut style = SetStyle::default();
    let mut markers = Vec::new();

    for entry in split_entries(raw) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let mut fields = entry.splitn(3, ',');
        let lat = fields.next().map(leading_f64).unwrap_or(0.0);
        let lon = fields.next().map(leading_f64).unwrap_or(0.0);

        if lat == 0.0 && lon == 0.0 {
            style.apply_directive(entry);
            continue;
        }

        let icon_key = fields.next().and_then(sanitize_name);
        markers.push(MarkerSpec {
            geo: GeoPoint::new(lat, lon),
            icon_key,
            transparent: style.transparent,
            style_color: style.color.clone(),
        });
    }

    markers
}

fn split_entries(raw: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut rest = raw;
    loop {
        let pipe = rest.find('|').map(|i| (i, 1));
        let encoded = find_ignore_ascii_case(rest, "%7c").map(|i| (i, 3));
        let next = match (pipe, encoded) {
            (Some(a), Some(b)) => Some(if a.0 < b.0 { a } else { b }),
            (a, b) => a.or(b),
        };
        match next {
            Some((index, width)) => {
                entries.push(&rest[..index]);
                rest = &rest[index + width..];
            }
            None => {
                entries.push(rest);
                return entries;
            }
        }
    }
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}

/// Reduce an icon or color name to its basename and reject anything that is
/// not a plain identifier, so names can never address files outside the
/// marker directory.
fn sanitize_name(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    let base = base.strip_suffix(".png").unwrap_or(base);
    if base.is_empty()
        || !base
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return None;
    }
    Some(base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_markers() {
        let markers = parse_marker_set(
            "40.702147,-74.015794,blues|40.711614,-74.012318,greeng|40.718217,-73.998284,redc",
        );
        assert_eq!(markers.len(), 3);
        assert_eq!(markers[0].geo, GeoPoint::new(40.702147, -74.015794));
        assert_eq!(markers[0].icon_key.as_deref(), Some("blues"));
        assert_eq!(markers[2].icon_key.as_deref(), Some("redc"));
    }

    #[test]
    fn encoded_pipe_separates_entries() {
        let markers = parse_marker_set("1.5,2.5,bullseye%7C3.5,4.5%7c5,6");
        assert_eq!(markers.len(), 3);
        assert_eq!(markers[1].geo, GeoPoint::new(3.5, 4.5));
        assert_eq!(markers[1].icon_key, None);
    }

    #[test]
    fn style_directive_applies_to_following_markers_only() {
        let markers = parse_marker_set("1,1|color:red|2,2|transparent:true|3,3,pushpin");
        assert_eq!(markers.len(), 3);
        assert_eq!(markers[0].style_color, None);
        assert!(!markers[0].transparent);
        assert_eq!(markers[1].style_color.as_deref(), Some("red"));
        assert!(!markers[1].transparent);
        assert_eq!(markers[2].style_color.as_deref(), Some("red"));
        assert!(markers[2].transparent);
    }

    #[test]
    fn combined_directive_entry() {
        let markers = parse_marker_set("color:Blue,transparent|10,20");
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].style_color.as_deref(), Some("blue"));
        assert!(markers[0].transparent);
    }

    #[test]
    fn zero_coordinate_is_consumed_as_directive() {
        let markers = parse_marker_set("0,0,redc|0.0,-0.0|1,2");
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].geo, GeoPoint::new(1.0, 2.0));
    }

    #[test]
    fn icon_names_are_reduced_to_basename() {
        let markers = parse_marker_set("1,2,../../etc/passwd|3,4,ol-marker-gold.png|5,6,bad name");
        assert_eq!(markers[0].icon_key.as_deref(), Some("passwd"));
        assert_eq!(markers[1].icon_key.as_deref(), Some("ol-marker-gold"));
        assert_eq!(markers[2].icon_key, None);
    }

    #[test]
    fn draw_order_puts_southern_markers_last() {
        let mut markers = vec![
            MarkerSpec::new(10.0, 5.0, None),
            MarkerSpec::new(30.0, 5.0, None),
            MarkerSpec::new(20.0, 1.0, None),
            MarkerSpec::new(20.0, 9.0, None),
        ];
        markers.sort_by(MarkerSpec::draw_order);
        let lats: Vec<f64> = markers.iter().map(|m| m.geo.lat).collect();
        assert_eq!(lats, vec![30.0, 20.0, 20.0, 10.0]);
        assert_eq!(markers[1].geo.lon, 9.0);
        assert_eq!(markers[2].geo.lon, 1.0);
    }

    #[test]
    fn canonical_form_is_stable() {
        let mut marker = MarkerSpec::new(1.25, -2.5, Some("redc"));
        marker.transparent = true;
        marker.style_color = Some("red".to_string());
        assert_eq!(marker.canonical(), "1.25,-2.5,redc,1,red");
    }
}
