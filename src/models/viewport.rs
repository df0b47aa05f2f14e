use crate::models::GeoPoint;
use serde::{Deserialize, Serialize};

/// Encoded image format of the final map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless, the default and fallback.
    Png,
    /// Lossy, honours the configured quality.
    Jpeg,
    /// Indexed palette.
    Gif,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Gif => "gif",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Gif => "image/gif",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "png" | "png32" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" | "jpg-baseline" => Ok(OutputFormat::Jpeg),
            "gif" | "png8" => Ok(OutputFormat::Gif),
            _ => Err(format!(
                "Invalid output format: {}. Use 'png', 'jpg' or 'gif'",
                s
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// The resolved geographic window of one request. Built once, never mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: GeoPoint,
    pub zoom: u8,
    /// Logical width in pixels, used for all tile math.
    pub width: u32,
    /// Logical height in pixels, used for all tile math.
    pub height: u32,
    /// Output multiplier applied after compositing.
    pub scale: u32,
    pub format: OutputFormat,
}

impl Viewport {
    /// Physical pixel dimensions of the encoded output.
    pub fn output_size(&self) -> (u32, u32) {
        (self.width * self.scale, self.height * self.scale)
    }
}
