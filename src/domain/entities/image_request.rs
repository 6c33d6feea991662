//! Load requests and their fluent builder.

use super::{CacheKey, Transformation};

/// Target dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Creates a new size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Picks one target dimension: explicit value, else a positive layout value,
/// else the viewport value. Never returns zero.
#[must_use]
pub fn resolve_dimension(requested: Option<u32>, layout: Option<u32>, viewport: u32) -> u32 {
    requested
        .or_else(|| layout.filter(|v| *v > 0))
        .unwrap_or(viewport)
        .max(1)
}

/// An immutable image load request.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    url: String,
    target: Size,
    transformations: Vec<Transformation>,
}

impl ImageRequest {
    /// Creates a request with already-resolved dimensions.
    ///
    /// Zero dimensions are raised to one.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        target: Size,
        transformations: Vec<Transformation>,
    ) -> Self {
        Self {
            url: url.into(),
            target: Size::new(target.width.max(1), target.height.max(1)),
            transformations,
        }
    }

    /// Starts a builder for `url`.
    #[must_use]
    pub fn builder(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(url)
    }

    /// Source URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Target width in pixels.
    #[must_use]
    pub const fn target_width(&self) -> u32 {
        self.target.width
    }

    /// Target height in pixels.
    #[must_use]
    pub const fn target_height(&self) -> u32 {
        self.target.height
    }

    /// Target size.
    #[must_use]
    pub const fn target(&self) -> Size {
        self.target
    }

    /// Transformations in application order.
    #[must_use]
    pub fn transformations(&self) -> &[Transformation] {
        &self.transformations
    }

    /// Key of the untransformed decoded image.
    #[must_use]
    pub fn base_key(&self) -> CacheKey {
        CacheKey::base(&self.url, self.target.width, self.target.height)
    }

    /// Key of the final image, equal to [`Self::base_key`] without transformations.
    #[must_use]
    pub fn final_key(&self) -> CacheKey {
        CacheKey::transformed(
            &self.url,
            self.target.width,
            self.target.height,
            &self.transformations,
        )
    }
}

/// Fluent configuration for an [`ImageRequest`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    url: String,
    width: Option<u32>,
    height: Option<u32>,
    layout: Option<Size>,
    transformations: Vec<Transformation>,
}

impl RequestBuilder {
    /// Creates a builder with no explicit size and no transformations.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            width: None,
            height: None,
            layout: None,
            transformations: Vec::new(),
        }
    }

    /// Sets an explicit target size, overriding layout and viewport sizes.
    #[must_use]
    pub const fn override_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Sets only the explicit target width.
    #[must_use]
    pub const fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    /// Sets only the explicit target height.
    #[must_use]
    pub const fn height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    /// Records the size measured by the host layout, used when no explicit size is set.
    #[must_use]
    pub const fn layout_size(mut self, width: u32, height: u32) -> Self {
        self.layout = Some(Size::new(width, height));
        self
    }

    /// Appends a circle crop.
    #[must_use]
    pub fn circle_crop(self) -> Self {
        self.transform(Transformation::CircleCrop)
    }

    /// Appends a rounded-corner crop.
    #[must_use]
    pub fn rounded_corner_crop(self, radius: f32) -> Self {
        self.transform(Transformation::rounded_corners(radius))
    }

    /// Appends any transformation.
    #[must_use]
    pub fn transform(mut self, transformation: Transformation) -> Self {
        self.transformations.push(transformation);
        self
    }

    /// Builds the request, resolving unset dimensions against `viewport`.
    #[must_use]
    pub fn build(self, viewport: Size) -> ImageRequest {
        let width = resolve_dimension(
            self.width,
            self.layout.map(|s| s.width),
            viewport.width,
        );
        let height = resolve_dimension(
            self.height,
            self.layout.map(|s| s.height),
            viewport.height,
        );
        ImageRequest::new(self.url, Size::new(width, height), self.transformations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const VIEWPORT: Size = Size::new(1080, 1920);

    #[test_case(Some(50), Some(300), 1080, 50 ; "explicit_wins")]
    #[test_case(None, Some(300), 1080, 300 ; "layout_when_unset")]
    #[test_case(None, Some(0), 1080, 1080 ; "zero_layout_falls_back")]
    #[test_case(None, None, 1080, 1080 ; "viewport_fallback")]
    #[test_case(Some(0), None, 1080, 1 ; "zero_clamped")]
    fn test_resolve_dimension(
        requested: Option<u32>,
        layout: Option<u32>,
        viewport: u32,
        expected: u32,
    ) {
        assert_eq!(resolve_dimension(requested, layout, viewport), expected);
    }

    #[test]
    fn test_builder_collects_in_order() {
        let request = ImageRequest::builder("A")
            .override_size(100, 80)
            .circle_crop()
            .rounded_corner_crop(12.0)
            .build(VIEWPORT);

        assert_eq!(request.url(), "A");
        assert_eq!(request.target(), Size::new(100, 80));
        assert_eq!(
            request.transformations(),
            &[
                Transformation::CircleCrop,
                Transformation::rounded_corners(12.0)
            ]
        );
        assert_eq!(request.base_key().as_str(), "A,100x80");
        assert_eq!(
            request.final_key().as_str(),
            "A,100x80,CIRCLE_CROP_ROUNDED_CORNER_CROP_12.0"
        );
    }

    #[test]
    fn test_builder_uses_layout_then_viewport() {
        let from_layout = RequestBuilder::new("A").layout_size(320, 240).build(VIEWPORT);
        assert_eq!(from_layout.target(), Size::new(320, 240));

        let from_viewport = RequestBuilder::new("A").build(VIEWPORT);
        assert_eq!(from_viewport.target(), VIEWPORT);
    }

    #[test]
    fn test_single_axis_override_mixes_with_viewport() {
        let request = RequestBuilder::new("A").width(64).build(VIEWPORT);
        assert_eq!(request.target(), Size::new(64, 1920));
    }

    #[test]
    fn test_final_key_without_transformations() {
        let request = ImageRequest::new("A", Size::new(100, 100), Vec::new());
        assert_eq!(request.final_key(), request.base_key());
    }
}
