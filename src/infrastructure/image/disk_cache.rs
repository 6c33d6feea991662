//! Disk-based image cache for persistence across sessions.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error, trace, warn};

use crate::domain::entities::CacheKey;
use crate::domain::ports::{CacheError, CacheResult, EncodeFormat, ImageCodecPort};

use super::lru_store::JournaledLruStore;

/// Maximum disk cache size in bytes (5 MiB default).
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 5 * 1024 * 1024;

/// Name of the cache directory below the project cache dir.
pub const CACHE_DIR_NAME: &str = "disk_cache";

/// Disk-based image cache that persists encoded image bytes.
///
/// Entries are named by the hash of their [`CacheKey`] and managed by a
/// [`JournaledLruStore`].
pub struct DiskImageCache {
    store: JournaledLruStore,
    codec: Arc<dyn ImageCodecPort>,
    format: EncodeFormat,
    reads: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for DiskImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskImageCache")
            .field("store", &self.store)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl DiskImageCache {
    /// Creates a new disk cache in the specified directory, recovering any
    /// previous state from its journal.
    ///
    /// # Errors
    /// Returns error if cache directory cannot be created or read.
    pub async fn new(
        cache_dir: PathBuf,
        max_size: u64,
        codec: Arc<dyn ImageCodecPort>,
    ) -> CacheResult<Self> {
        let store = JournaledLruStore::open(cache_dir, max_size).await?;
        Ok(Self {
            store,
            codec,
            format: EncodeFormat::Png,
            reads: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Sets the format images are encoded with before being written.
    #[must_use]
    pub fn with_format(mut self, format: EncodeFormat) -> Self {
        self.format = format;
        self
    }

    /// Loads and decodes an image from disk cache.
    ///
    /// A file that fails to decode is deleted and reported as a miss.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<image::DynamicImage>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let codec = self.codec.clone();
        let result = self
            .store
            .get_verified(key.disk_key().as_str(), move |bytes| {
                codec.decode(&bytes).map(Arc::new)
            })
            .await;
        self.record(key, result.is_some());
        if result.is_some() {
            debug!(key = %key, "Decoded image from disk cache");
        }
        result
    }

    fn record(&self, key: &CacheKey, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Disk cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Disk cache miss");
        }
    }

    /// Encodes and stores an image.
    ///
    /// # Errors
    /// Returns error if encoding fails or the file cannot be written.
    pub async fn put(&self, key: &CacheKey, image: Arc<image::DynamicImage>) -> CacheResult<()> {
        let codec = self.codec.clone();
        let format = self.format;
        let encoded = tokio::task::spawn_blocking(move || codec.encode(&image, format))
            .await
            .map_err(|e| {
                error!(key = %key, error = %e, "Encode task panicked");
                CacheError::EncodeError(format!("Encode task panicked: {e}"))
            })?
            .map_err(|e| {
                warn!(key = %key, error = %e, "Failed to encode image for disk cache");
                CacheError::EncodeError(e.to_string())
            })?;
        self.put_bytes(key, &encoded).await
    }

    /// Stores raw bytes in the disk cache.
    ///
    /// # Errors
    /// Returns error if file cannot be created or written.
    pub async fn put_bytes(&self, key: &CacheKey, bytes: &[u8]) -> CacheResult<()> {
        let disk_key = key.disk_key();
        self.store.put(disk_key.as_str(), bytes).await?;
        debug!(key = %key, file = %disk_key, size = bytes.len(), "Stored image in disk cache");
        Ok(())
    }

    /// Removes an image from disk cache.
    pub async fn evict(&self, key: &CacheKey) {
        if self.store.remove(key.disk_key().as_str()).await {
            debug!(key = %key, "Evicted from disk cache");
        }
    }

    /// Clears the entire disk cache and truncates its journal.
    ///
    /// # Errors
    /// Returns error if the journal cannot be recreated.
    pub async fn clear(&self) -> CacheResult<()> {
        self.store.clear().await?;
        debug!("Cleared disk cache");
        Ok(())
    }

    /// Returns the current cache size in bytes.
    pub async fn current_size(&self) -> u64 {
        self.store.current_size().await
    }

    /// Returns the number of cached files.
    pub async fn len(&self) -> usize {
        self.store.len().await
    }

    /// Returns true if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Checks if an image is cached without affecting recency.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.store.contains(key.disk_key().as_str()).await
    }

    /// Returns access statistics.
    pub async fn stats(&self) -> DiskCacheStats {
        DiskCacheStats {
            reads: self.reads.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.store.len().await,
            size_bytes: self.store.current_size().await,
            max_bytes: self.store.max_size(),
        }
    }
}

/// Statistics about disk cache usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskCacheStats {
    /// Number of lookups that touched the disk layer.
    pub reads: u64,
    /// Lookups that returned an image.
    pub hits: u64,
    /// Lookups that found nothing usable.
    pub misses: u64,
    /// Current number of entries.
    pub entries: usize,
    /// Current total size in bytes.
    pub size_bytes: u64,
    /// Byte budget.
    pub max_bytes: u64,
}

impl std::fmt::Display for DiskCacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Disk: {} files, {}/{} bytes ({} hits, {} misses)",
            self.entries, self.size_bytes, self.max_bytes, self.hits, self.misses
        )
    }
}

/// Returns the default cache directory path.
#[must_use]
pub fn dirs_cache_path() -> PathBuf {
    directories::ProjectDirs::from("com", "linuxmobile", "glint").map_or_else(
        || std::env::temp_dir().join("glint").join(CACHE_DIR_NAME),
        |dirs| dirs.cache_dir().join(CACHE_DIR_NAME),
    )
}
