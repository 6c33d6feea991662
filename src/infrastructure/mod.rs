//! Infrastructure layer with external service adapters.

/// Loader configuration.
pub mod config;
/// Image handling (caching, fetching, decoding, loading).
pub mod image;

pub use config::{CliArgs, ConfigError, LoaderConfig, LogLevel, StorageManager};
pub use image::{
    CacheRepository, CacheStats, DiskCacheStats, DiskImageCache, HttpImageFetcher, ImageLoader,
    ImageRsCodec, JournaledLruStore, MemoryImageCache,
};
