mod codec_port;
mod fetcher_port;
mod image_cache_port;

pub use codec_port::{CodecError, CodecResult, EncodeFormat, ImageCodecPort, PixelFormat};
pub use fetcher_port::{FetchError, FetchResult, ImageFetcherPort};
pub use image_cache_port::{CacheError, CacheResult, ImageCachePort};
