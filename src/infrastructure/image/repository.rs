//! Two-tier cache: memory in front of disk.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::entities::{CacheKey, ImageSource};
use crate::domain::ports::ImageCachePort;

use super::disk_cache::DiskImageCache;
use super::memory_cache::MemoryImageCache;

/// Composes the memory and disk tiers.
///
/// Full puts go to both tiers; disk hits are promoted into memory. Memory-only
/// puts are for derived images that are cheap to recompute.
#[derive(Debug)]
pub struct CacheRepository {
    memory: Arc<MemoryImageCache>,
    disk: Arc<DiskImageCache>,
}

impl CacheRepository {
    /// Creates a repository over the given tiers.
    #[must_use]
    pub const fn new(memory: Arc<MemoryImageCache>, disk: Arc<DiskImageCache>) -> Self {
        Self { memory, disk }
    }

    /// The memory tier.
    #[must_use]
    pub fn memory(&self) -> &Arc<MemoryImageCache> {
        &self.memory
    }

    /// The disk tier.
    #[must_use]
    pub fn disk(&self) -> &Arc<DiskImageCache> {
        &self.disk
    }

    /// Looks up `key` in memory, then on disk.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<image::DynamicImage>> {
        self.get_with_source(key).await.map(|(img, _)| img)
    }

    /// Looks up `key` and reports which tier answered.
    ///
    /// A disk hit is written into memory before returning.
    pub async fn get_with_source(
        &self,
        key: &CacheKey,
    ) -> Option<(Arc<image::DynamicImage>, ImageSource)> {
        if let Some(img) = self.memory.get(key).await {
            return Some((img, ImageSource::MemoryCache));
        }

        let img = self.disk.get(key).await?;
        self.memory.put(key.clone(), img.clone()).await;
        debug!(key = %key, "Promoted disk hit into memory");
        Some((img, ImageSource::DiskCache))
    }

    /// Stores `image` in memory and on disk. Disk failures are logged only.
    pub async fn put(&self, key: &CacheKey, image: Arc<image::DynamicImage>) {
        self.memory.put(key.clone(), image.clone()).await;
        if let Err(e) = self.disk.put(key, image).await {
            warn!(key = %key, error = %e, "Failed to cache to disk");
        }
    }

    /// Stores `image` in memory only.
    pub async fn put_memory(&self, key: &CacheKey, image: Arc<image::DynamicImage>) {
        self.memory.put(key.clone(), image).await;
    }

    /// Clears both tiers.
    pub async fn clear(&self) {
        self.memory.clear().await;
        if let Err(e) = self.disk.clear().await {
            warn!(error = %e, "Failed to clear disk cache");
        }
        info!("Cleared all image caches");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::image::codec::ImageRsCodec;
    use tempfile::TempDir;

    async fn create_repository() -> (CacheRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let disk = DiskImageCache::new(
            temp_dir.path().to_path_buf(),
            1024 * 1024,
            Arc::new(ImageRsCodec::new()),
        )
        .await
        .unwrap();
        let repo = CacheRepository::new(
            Arc::new(MemoryImageCache::new(1024 * 1024)),
            Arc::new(disk),
        );
        (repo, temp_dir)
    }

    fn test_image() -> Arc<image::DynamicImage> {
        Arc::new(image::DynamicImage::new_rgb8(16, 16))
    }

    #[tokio::test]
    async fn test_put_writes_both_tiers() {
        let (repo, _temp) = create_repository().await;
        let key = CacheKey::base("A", 16, 16);

        repo.put(&key, test_image()).await;

        assert!(repo.memory().contains(&key).await);
        assert!(repo.disk().contains(&key).await);
    }

    #[tokio::test]
    async fn test_memory_hit_skips_disk() {
        let (repo, _temp) = create_repository().await;
        let key = CacheKey::base("A", 16, 16);
        repo.put(&key, test_image()).await;

        let (_, source) = repo.get_with_source(&key).await.unwrap();

        assert_eq!(source, ImageSource::MemoryCache);
        assert_eq!(repo.disk().stats().await.reads, 0);
    }

    #[tokio::test]
    async fn test_disk_hit_is_promoted() {
        let (repo, _temp) = create_repository().await;
        let key = CacheKey::base("A", 16, 16);
        repo.put(&key, test_image()).await;
        repo.memory().clear().await;

        let (_, first) = repo.get_with_source(&key).await.unwrap();
        let (_, second) = repo.get_with_source(&key).await.unwrap();

        assert_eq!(first, ImageSource::DiskCache);
        assert_eq!(second, ImageSource::MemoryCache);
        assert_eq!(repo.disk().stats().await.reads, 1);
    }

    #[tokio::test]
    async fn test_put_memory_is_not_persisted() {
        let (repo, _temp) = create_repository().await;
        let key = CacheKey::base("A", 16, 16);

        repo.put_memory(&key, test_image()).await;

        assert!(repo.memory().contains(&key).await);
        assert!(!repo.disk().contains(&key).await);
    }

    #[tokio::test]
    async fn test_full_miss() {
        let (repo, _temp) = create_repository().await;
        assert!(repo.get(&CacheKey::base("missing", 1, 1)).await.is_none());
    }

    #[tokio::test]
    async fn test_clear_empties_both_tiers() {
        let (repo, _temp) = create_repository().await;
        let key = CacheKey::base("A", 16, 16);
        repo.put(&key, test_image()).await;

        repo.clear().await;

        assert!(repo.get(&key).await.is_none());
        assert!(repo.disk().is_empty().await);
    }
}
