//! Port for image encode/decode primitives.

use image::DynamicImage;

/// Result type for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Errors returned by a codec.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CodecError {
    /// Bytes could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),
    /// Image could not be encoded.
    #[error("encode failed: {0}")]
    Encode(String),
}

/// In-memory pixel layout produced by a decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 8-bit RGBA.
    #[default]
    Rgba8,
    /// 8-bit RGB without alpha, 25% smaller than RGBA.
    Rgb8,
}

/// Container format used when persisting images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodeFormat {
    /// Lossless PNG.
    #[default]
    Png,
    /// JPEG at the given quality (1-100). Alpha is dropped.
    Jpeg {
        /// Encoder quality.
        quality: u8,
    },
}

/// Port for decoding and encoding images.
///
/// Calls are CPU-bound and expected to run on a blocking thread.
pub trait ImageCodecPort: Send + Sync {
    /// Reads only the dimensions `(width, height)` without decoding pixels.
    ///
    /// # Errors
    /// Returns [`CodecError::Decode`] if the header cannot be parsed.
    fn decode_bounds(&self, bytes: &[u8]) -> CodecResult<(u32, u32)>;

    /// Decodes with each dimension divided by `sample_factor` into `format`.
    ///
    /// # Errors
    /// Returns [`CodecError::Decode`] if the bytes are not a valid image.
    fn decode_scaled(
        &self,
        bytes: &[u8],
        sample_factor: u32,
        format: PixelFormat,
    ) -> CodecResult<DynamicImage>;

    /// Decodes at full size.
    ///
    /// # Errors
    /// Returns [`CodecError::Decode`] if the bytes are not a valid image.
    fn decode(&self, bytes: &[u8]) -> CodecResult<DynamicImage> {
        self.decode_scaled(bytes, 1, PixelFormat::Rgba8)
    }

    /// Encodes `image` into `format`.
    ///
    /// # Errors
    /// Returns [`CodecError::Encode`] if encoding fails.
    fn encode(&self, image: &DynamicImage, format: EncodeFormat) -> CodecResult<Vec<u8>>;
}
