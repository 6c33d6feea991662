//! Cache key composition.

use super::Transformation;

/// Identifies one decoded image variant in the cache tiers.
///
/// Format: `url,WxH` for the untransformed image, with `,K1_K2_..` appended
/// when transformations are present. Transformation order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for the untransformed image at the given target size.
    #[must_use]
    pub fn base(url: &str, width: u32, height: u32) -> Self {
        Self(format!("{url},{width}x{height}"))
    }

    /// Key for the image after applying `transformations` in order.
    ///
    /// Equal to [`CacheKey::base`] when the list is empty.
    #[must_use]
    pub fn transformed(
        url: &str,
        width: u32,
        height: u32,
        transformations: &[Transformation],
    ) -> Self {
        let base = Self::base(url, width, height);
        if transformations.is_empty() {
            return base;
        }
        let suffix = transformations
            .iter()
            .map(Transformation::key)
            .collect::<Vec<_>>()
            .join("_");
        Self(format!("{},{suffix}", base.0))
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the filesystem-safe name for this key.
    #[must_use]
    pub fn disk_key(&self) -> DiskKey {
        DiskKey::from_cache_key(self)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// 128-bit content hash of a [`CacheKey`], rendered as 32 lowercase hex chars.
/// Used as the on-disk file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiskKey(String);

impl DiskKey {
    /// Hashes a cache key.
    #[must_use]
    pub fn from_cache_key(key: &CacheKey) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(key.as_str().as_bytes());
        let result = hasher.finalize();
        Self(hex::encode(&result[..16]))
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DiskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_key_format() {
        assert_eq!(CacheKey::base("A", 100, 100).as_str(), "A,100x100");
        assert_eq!(
            CacheKey::base("https://example.com/a.png", 640, 480).as_str(),
            "https://example.com/a.png,640x480"
        );
    }

    #[test]
    fn test_transformed_key_format() {
        let key = CacheKey::transformed(
            "A",
            100,
            100,
            &[
                Transformation::CircleCrop,
                Transformation::rounded_corners(12.0),
            ],
        );
        assert_eq!(key.as_str(), "A,100x100,CIRCLE_CROP_ROUNDED_CORNER_CROP_12.0");
    }

    #[test]
    fn test_empty_chain_is_base_key() {
        assert_eq!(
            CacheKey::transformed("A", 1, 2, &[]),
            CacheKey::base("A", 1, 2)
        );
    }

    #[test]
    fn test_order_matters() {
        let a = [
            Transformation::CircleCrop,
            Transformation::rounded_corners(3.0),
        ];
        let b = [
            Transformation::rounded_corners(3.0),
            Transformation::CircleCrop,
        ];
        assert_ne!(
            CacheKey::transformed("A", 10, 10, &a),
            CacheKey::transformed("A", 10, 10, &b)
        );
        assert_eq!(
            CacheKey::transformed("A", 10, 10, &a),
            CacheKey::transformed("A", 10, 10, &a)
        );
    }

    #[test]
    fn test_dimensions_matter() {
        assert_ne!(CacheKey::base("A", 100, 200), CacheKey::base("A", 200, 100));
    }

    #[test]
    fn test_disk_key_is_stable_hex() {
        let key = CacheKey::base("https://example.com/image.png", 100, 100);
        let first = key.disk_key();
        let second = key.disk_key();

        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 32);
        assert!(
            first
                .as_str()
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        );
        assert_ne!(first, CacheKey::base("https://example.com/image.png", 100, 101).disk_key());
    }
}
