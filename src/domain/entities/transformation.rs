//! Pixel transformations applied after decode.

use image::{DynamicImage, GenericImageView, RgbaImage};

/// A transformation applied to a decoded image.
///
/// Each variant has a stable identity that takes part in cache keys, so two
/// instances with equal parameters always produce the same key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transformation {
    /// Center-crops to a square and masks everything outside the inscribed circle.
    CircleCrop,
    /// Keeps the full frame and rounds each corner with the given radius in pixels.
    RoundedCornerCrop {
        /// Corner radius in pixels.
        radius: f32,
    },
}

impl Transformation {
    /// Creates a rounded-corner crop.
    #[must_use]
    pub const fn rounded_corners(radius: f32) -> Self {
        Self::RoundedCornerCrop { radius }
    }

    /// Returns the identity used when composing cache keys.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::CircleCrop => "CIRCLE_CROP".to_string(),
            Self::RoundedCornerCrop { radius } => format!("ROUNDED_CORNER_CROP_{radius:?}"),
        }
    }

    /// Applies this transformation, returning a new RGBA image.
    #[must_use]
    pub fn apply(&self, image: &DynamicImage) -> DynamicImage {
        match self {
            Self::CircleCrop => DynamicImage::ImageRgba8(circle_crop(image)),
            Self::RoundedCornerCrop { radius } => {
                DynamicImage::ImageRgba8(rounded_corner_crop(image, *radius))
            }
        }
    }

    /// Applies a chain in declaration order.
    #[must_use]
    pub fn apply_all(transformations: &[Self], image: &DynamicImage) -> DynamicImage {
        let mut iter = transformations.iter();
        let Some(first) = iter.next() else {
            return image.clone();
        };
        iter.fold(first.apply(image), |acc, t| t.apply(&acc))
    }
}

impl std::fmt::Display for Transformation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

/// Fraction of a pixel covered by a shape edge at `distance` from its center line.
fn coverage(distance: f32, radius: f32) -> f32 {
    (radius + 0.5 - distance).clamp(0.0, 1.0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale_alpha(alpha: u8, factor: f32) -> u8 {
    (f32::from(alpha) * factor).round().clamp(0.0, 255.0) as u8
}

#[allow(clippy::cast_precision_loss)]
fn circle_crop(image: &DynamicImage) -> RgbaImage {
    let (width, height) = image.dimensions();
    let size = width.min(height);
    let x = (width - size) / 2;
    let y = (height - size) / 2;

    let mut output = image.crop_imm(x, y, size, size).to_rgba8();
    let radius = size as f32 / 2.0;

    for (px, py, pixel) in output.enumerate_pixels_mut() {
        let dx = px as f32 + 0.5 - radius;
        let dy = py as f32 + 0.5 - radius;
        let factor = coverage(dx.hypot(dy), radius - 0.5);
        pixel.0[3] = scale_alpha(pixel.0[3], factor);
    }

    output
}

#[allow(clippy::cast_precision_loss)]
fn rounded_corner_crop(image: &DynamicImage, radius: f32) -> RgbaImage {
    let mut output = image.to_rgba8();
    let (width, height) = output.dimensions();
    let (w, h) = (width as f32, height as f32);
    let radius = radius.min(w / 2.0).min(h / 2.0);

    if radius <= 0.0 || radius.is_nan() {
        return output;
    }

    for (px, py, pixel) in output.enumerate_pixels_mut() {
        let fx = px as f32 + 0.5;
        let fy = py as f32 + 0.5;
        let in_band_x = fx >= radius && fx <= w - radius;
        let in_band_y = fy >= radius && fy <= h - radius;
        if in_band_x || in_band_y {
            continue;
        }
        let cx = fx.clamp(radius, w - radius);
        let cy = fy.clamp(radius, h - radius);
        let factor = coverage((fx - cx).hypot(fy - cy), radius - 0.5);
        pixel.0[3] = scale_alpha(pixel.0[3], factor);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use test_case::test_case;

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(width, height, Rgb([200, 10, 10])))
    }

    #[test_case(Transformation::CircleCrop, "CIRCLE_CROP" ; "circle")]
    #[test_case(Transformation::rounded_corners(12.0), "ROUNDED_CORNER_CROP_12.0" ; "rounded_whole")]
    #[test_case(Transformation::rounded_corners(7.5), "ROUNDED_CORNER_CROP_7.5" ; "rounded_fraction")]
    fn test_key(transformation: Transformation, expected: &str) {
        assert_eq!(transformation.key(), expected);
    }

    #[test]
    fn test_parameters_change_key() {
        assert_ne!(
            Transformation::rounded_corners(4.0).key(),
            Transformation::rounded_corners(8.0).key()
        );
        assert_eq!(
            Transformation::rounded_corners(4.0).key(),
            Transformation::rounded_corners(4.0).key()
        );
    }

    #[test]
    fn test_circle_crop_squares_and_masks_corners() {
        let out = Transformation::CircleCrop.apply(&solid(10, 6)).to_rgba8();

        assert_eq!(out.dimensions(), (6, 6));
        assert_eq!(out.get_pixel(0, 0).0[3], 0);
        assert_eq!(out.get_pixel(5, 5).0[3], 0);
        assert_eq!(out.get_pixel(3, 3).0[3], 255);
        assert_eq!(out.get_pixel(3, 3).0[0], 200);
    }

    #[test]
    fn test_rounded_corners_keep_size() {
        let out = Transformation::rounded_corners(4.0)
            .apply(&solid(20, 10))
            .to_rgba8();

        assert_eq!(out.dimensions(), (20, 10));
        assert_eq!(out.get_pixel(0, 0).0[3], 0);
        assert_eq!(out.get_pixel(19, 9).0[3], 0);
        assert_eq!(out.get_pixel(10, 0).0[3], 255);
        assert_eq!(out.get_pixel(10, 5).0[3], 255);
    }

    #[test]
    fn test_zero_radius_is_noop_mask() {
        let out = Transformation::rounded_corners(0.0)
            .apply(&solid(4, 4))
            .to_rgba8();
        assert!(out.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn test_apply_all_runs_in_order() {
        let chain = [
            Transformation::CircleCrop,
            Transformation::rounded_corners(1.0),
        ];
        let out = Transformation::apply_all(&chain, &solid(8, 4));
        assert_eq!(out.width(), 4);
        assert_eq!(out.height(), 4);

        let untouched = Transformation::apply_all(&[], &solid(8, 4));
        assert_eq!(untouched.width(), 8);
    }
}
