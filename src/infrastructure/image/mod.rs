//! Image handling infrastructure.
//!
//! This module provides:
//! - A journaled LRU file store for crash-safe disk caching
//! - Memory caching with byte-weighted LRU eviction
//! - A two-tier repository composing both caches
//! - Async image loading pipeline with downsampled decoding

pub mod codec;
pub mod disk_cache;
pub mod http;
pub mod journal;
pub mod loader;
pub mod lru_store;
pub mod memory_cache;
pub mod repository;

pub use codec::ImageRsCodec;
pub use disk_cache::{DiskCacheStats, DiskImageCache};
pub use http::HttpImageFetcher;
pub use journal::{Journal, JournalRecord};
pub use loader::{ImageLoader, calculate_sample_factor};
pub use lru_store::JournaledLruStore;
pub use memory_cache::{CacheStats, MemoryImageCache};
pub use repository::CacheRepository;
