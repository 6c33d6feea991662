//! Port definition for image caching.

use std::sync::Arc;

use crate::domain::entities::CacheKey;

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors that can occur during cache operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// Failed to encode image for persistence.
    #[error("Encode error: {0}")]
    EncodeError(String),
    /// I/O error during cache operation.
    #[error("IO error: {0}")]
    IoError(String),
    /// Key is not a valid entry name.
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),
}

/// Port for in-process image caching.
/// Implementations must be thread-safe and must not block on I/O.
#[async_trait::async_trait]
pub trait ImageCachePort: Send + Sync {
    /// Attempts to get an image from the cache, marking it most recently used.
    /// Returns None if not cached.
    async fn get(&self, key: &CacheKey) -> Option<Arc<image::DynamicImage>>;

    /// Stores an image in the cache, evicting older entries as needed.
    async fn put(&self, key: CacheKey, image: Arc<image::DynamicImage>);

    /// Removes an image from the cache.
    async fn evict(&self, key: &CacheKey);

    /// Returns the current number of cached images.
    fn len(&self) -> usize;

    /// Returns true if the cache is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all images from the cache.
    async fn clear(&self);
}
