//! Codec adapter backed by the `image` crate.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};

use crate::domain::ports::{CodecError, CodecResult, EncodeFormat, ImageCodecPort, PixelFormat};

/// Decodes PNG, JPEG and WebP; encodes PNG and JPEG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRsCodec;

impl ImageRsCodec {
    /// Creates a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ImageCodecPort for ImageRsCodec {
    fn decode_bounds(&self, bytes: &[u8]) -> CodecResult<(u32, u32)> {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| CodecError::Decode(format!("Failed to sniff format: {e}")))?
            .into_dimensions()
            .map_err(|e| CodecError::Decode(format!("Failed to read bounds: {e}")))
    }

    /// Decodes at full resolution, then resizes by `sample_factor`.
    ///
    /// The `image` crate has no subsampling decode, so peak memory during this
    /// call is the full source buffer. Only the retained result is bounded by
    /// the factor.
    fn decode_scaled(
        &self,
        bytes: &[u8],
        sample_factor: u32,
        format: PixelFormat,
    ) -> CodecResult<DynamicImage> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| CodecError::Decode(format!("Failed to decode image: {e}")))?;

        let factor = sample_factor.max(1);
        let img = if factor > 1 {
            let width = (img.width() / factor).max(1);
            let height = (img.height() / factor).max(1);
            img.resize_exact(width, height, FilterType::Triangle)
        } else {
            img
        };

        Ok(match format {
            PixelFormat::Rgba8 => DynamicImage::ImageRgba8(img.to_rgba8()),
            PixelFormat::Rgb8 => DynamicImage::ImageRgb8(img.to_rgb8()),
        })
    }

    fn encode(&self, image: &DynamicImage, format: EncodeFormat) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::new();
        match format {
            EncodeFormat::Png => image
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(|e| CodecError::Encode(format!("PNG encode failed: {e}")))?,
            EncodeFormat::Jpeg { quality } => {
                let rgb = image.to_rgb8();
                JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
                    .encode_image(&rgb)
                    .map_err(|e| CodecError::Encode(format!("JPEG encode failed: {e}")))?;
            }
        }
        Ok(buf)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    /// Encodes a solid RGBA test image as PNG.
    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([10, 120, 240, 255]),
        ));
        ImageRsCodec
            .encode(&img, EncodeFormat::Png)
            .expect("encode test png")
    }

    #[test]
    fn test_decode_bounds_reads_header() {
        let bytes = png_bytes(40, 30);
        assert_eq!(ImageRsCodec.decode_bounds(&bytes).unwrap(), (40, 30));
    }

    #[test]
    fn test_decode_scaled_divides_dimensions() {
        let bytes = png_bytes(400, 200);
        let img = ImageRsCodec
            .decode_scaled(&bytes, 4, PixelFormat::Rgb8)
            .unwrap();

        assert_eq!((img.width(), img.height()), (100, 50));
        assert!(matches!(img, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(ImageRsCodec.decode(b"not an image").is_err());
        assert!(ImageRsCodec.decode_bounds(b"not an image").is_err());
    }

    #[test]
    fn test_jpeg_encode_drops_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(8, 8));
        let bytes = ImageRsCodec
            .encode(&img, EncodeFormat::Jpeg { quality: 80 })
            .unwrap();
        assert_eq!(ImageRsCodec.decode_bounds(&bytes).unwrap(), (8, 8));
    }
}
