//! In-memory LRU image cache implementation.
//!
//! Capacity is a byte budget: each entry costs the size of its decoded pixel buffer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use lru::LruCache;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::domain::entities::CacheKey;
use crate::domain::ports::ImageCachePort;

/// Default memory budget when none is configured (64 MiB).
pub const DEFAULT_CACHE_BYTES: u64 = 64 * 1024 * 1024;

struct MemoryState {
    entries: LruCache<CacheKey, Arc<image::DynamicImage>>,
    current_size: u64,
}

/// In-memory LRU cache for decoded images.
/// Thread-safe; recency updates happen under a write lock.
///
/// Entry count and byte total are mirrored into atomics after every mutation
/// so synchronous readers never wait on the lock.
pub struct MemoryImageCache {
    state: RwLock<MemoryState>,
    max_size: u64,
    entry_count: AtomicUsize,
    resident_bytes: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Cost of holding `image` in memory.
#[must_use]
pub fn image_cost(image: &image::DynamicImage) -> u64 {
    image.as_bytes().len() as u64
}

impl std::fmt::Debug for MemoryImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryImageCache")
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

impl MemoryImageCache {
    /// Creates a new cache holding at most `max_size` bytes of pixels.
    #[must_use]
    pub fn new(max_size: u64) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                entries: LruCache::unbounded(),
                current_size: 0,
            }),
            max_size,
            entry_count: AtomicUsize::new(0),
            resident_bytes: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Creates a new cache with the default budget.
    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CACHE_BYTES)
    }

    /// Byte budget.
    #[must_use]
    pub const fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Bytes currently held.
    pub async fn current_size(&self) -> u64 {
        self.state.read().await.current_size
    }

    /// Returns true if `key` is resident. Does not affect recency.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.state.read().await.entries.contains(key)
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
            size: self.len(),
            bytes: self.resident_bytes.load(Ordering::Relaxed),
        }
    }

    /// Mirrors the locked state into the atomic counters.
    fn publish(&self, state: &MemoryState) {
        self.entry_count
            .store(state.entries.len(), Ordering::Relaxed);
        self.resident_bytes
            .store(state.current_size, Ordering::Relaxed);
    }

    /// Peeks at an image without promoting it in the LRU.
    pub async fn peek(&self, key: &CacheKey) -> Option<Arc<image::DynamicImage>> {
        let state = self.state.read().await;
        state.entries.peek(key).cloned()
    }
}

impl Default for MemoryImageCache {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached images.
    pub size: usize,
    /// Current pixel bytes held.
    pub bytes: u64,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} images ({} bytes), {:.1}% hit rate ({} hits, {} misses)",
            self.size, self.bytes, self.hit_rate, self.hits, self.misses
        )
    }
}

#[async_trait::async_trait]
impl ImageCachePort for MemoryImageCache {
    async fn get(&self, key: &CacheKey) -> Option<Arc<image::DynamicImage>> {
        let mut state = self.state.write().await;
        if let Some(img) = state.entries.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache hit");
            Some(img.clone())
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache miss");
            None
        }
    }

    async fn put(&self, key: CacheKey, image: Arc<image::DynamicImage>) {
        let cost = image_cost(&image);
        let mut state = self.state.write().await;
        debug!(key = %key, size = cost, "Storing image in memory cache");
        if let Some(old) = state.entries.put(key, image) {
            state.current_size -= image_cost(&old);
        }
        state.current_size += cost;

        while state.current_size > self.max_size {
            let Some((evicted, img)) = state.entries.pop_lru() else {
                break;
            };
            state.current_size -= image_cost(&img);
            debug!(key = %evicted, "Evicted image from memory cache");
        }
        self.publish(&state);
    }

    async fn evict(&self, key: &CacheKey) {
        let mut state = self.state.write().await;
        if let Some(img) = state.entries.pop(key) {
            state.current_size -= image_cost(&img);
            debug!(key = %key, "Evicted image from memory cache");
        }
        self.publish(&state);
    }

    fn len(&self) -> usize {
        self.entry_count.load(Ordering::Relaxed)
    }

    async fn clear(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.current_size = 0;
        self.publish(&state);
        debug!("Cleared memory image cache");
    }
}
