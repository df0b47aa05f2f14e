use crate::constants::GIF_QUANTIZER_SPEED;
use crate::error::Result;
use crate::models::OutputFormat;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};

/// Resize the logical canvas by an integer `scale`. A scale of 1 returns the
/// canvas untouched.
pub fn apply_scale(canvas: RgbaImage, scale: u32) -> RgbaImage {
    if scale <= 1 {
        return canvas;
    }
    let (width, height) = canvas.dimensions();
    imageops::resize(&canvas, width * scale, height * scale, FilterType::CatmullRom)
}

/// Encode a finished canvas.
pub fn encode(canvas: RgbaImage, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
    let (width, height) = canvas.dimensions();
    let mut buffer = Vec::new();

    match format {
        OutputFormat::Png => {
            PngEncoder::new_with_quality(&mut buffer, CompressionType::Best, PngFilter::Adaptive)
                .write_image(canvas.as_raw(), width, height, ExtendedColorType::Rgba8)?;
        }
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(canvas).into_rgb8();
            JpegEncoder::new_with_quality(&mut buffer, jpeg_quality.clamp(1, 100))
                .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)?;
        }
        OutputFormat::Gif => {
            let mut encoder = GifEncoder::new_with_speed(&mut buffer, GIF_QUANTIZER_SPEED);
            encoder.encode(canvas.as_raw(), width, height, ExtendedColorType::Rgba8)?;
        }
    }

    Ok(buffer)
}

/// Scale then encode: everything between a composed canvas and the response
/// body.
pub fn finish(canvas: RgbaImage, scale: u32, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
    encode(apply_scale(canvas, scale), format, jpeg_quality)
}
