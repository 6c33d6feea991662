//! Async image loading orchestrator.
//!
//! Implements a three-tier lookup: Memory -> Disk -> Network

use std::sync::Arc;

use bytes::Bytes;
use image::DynamicImage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::domain::entities::{CacheKey, ImageRequest, ImageSource, LoadedImage, Transformation};
use crate::domain::errors::{InitError, LoadError};
use crate::domain::ports::{FetchError, ImageCodecPort, ImageFetcherPort, PixelFormat};
use crate::infrastructure::config::LoaderConfig;

use super::codec::ImageRsCodec;
use super::disk_cache::DiskImageCache;
use super::http::HttpImageFetcher;
use super::memory_cache::{CacheStats, MemoryImageCache};
use super::repository::CacheRepository;

/// Largest power-of-two factor that keeps half the source at least as large
/// as the target in both dimensions.
///
/// Returns 1 when the source already fits the target.
#[must_use]
pub fn calculate_sample_factor(
    width: u32,
    height: u32,
    target_width: u32,
    target_height: u32,
) -> u32 {
    let target_width = target_width.max(1);
    let target_height = target_height.max(1);
    let mut factor = 1u32;

    if height > target_height || width > target_width {
        let half_height = height / 2;
        let half_width = width / 2;
        while half_height / factor >= target_height && half_width / factor >= target_width {
            factor *= 2;
        }
    }

    factor
}

/// Orchestrates image loading from memory, disk, and network.
///
/// One instance is meant to be shared per process; construct it at the
/// composition root and pass it down.
pub struct ImageLoader {
    repository: Arc<CacheRepository>,
    fetcher: Arc<dyn ImageFetcherPort>,
    codec: Arc<dyn ImageCodecPort>,
    decode_format: PixelFormat,
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("repository", &self.repository)
            .field("decode_format", &self.decode_format)
            .finish_non_exhaustive()
    }
}

impl ImageLoader {
    /// Creates a loader from injected collaborators.
    ///
    /// Network images are decoded into [`PixelFormat::Rgb8`] by default.
    #[must_use]
    pub fn new(
        repository: Arc<CacheRepository>,
        fetcher: Arc<dyn ImageFetcherPort>,
        codec: Arc<dyn ImageCodecPort>,
    ) -> Self {
        Self {
            repository,
            fetcher,
            codec,
            decode_format: PixelFormat::Rgb8,
        }
    }

    /// Creates a loader with the default codec, HTTP fetcher and cache tiers.
    ///
    /// # Errors
    /// Returns error if the disk cache or HTTP client cannot be created.
    pub async fn from_config(config: &LoaderConfig) -> Result<Self, InitError> {
        let codec: Arc<dyn ImageCodecPort> = Arc::new(ImageRsCodec::new());
        let disk = DiskImageCache::new(
            config.effective_cache_dir(),
            config.disk_cache_bytes,
            codec.clone(),
        )
        .await?;
        let memory = MemoryImageCache::new(config.effective_memory_cache_bytes());
        let fetcher = HttpImageFetcher::new(config.timeout())?;

        debug!(
            memory_bytes = memory.max_size(),
            disk_bytes = config.disk_cache_bytes,
            "Created image loader"
        );

        let repository = CacheRepository::new(Arc::new(memory), Arc::new(disk));
        Ok(Self::new(Arc::new(repository), Arc::new(fetcher), codec))
    }

    /// Sets the pixel format used for network decodes.
    #[must_use]
    pub const fn with_decode_format(mut self, format: PixelFormat) -> Self {
        self.decode_format = format;
        self
    }

    /// The underlying cache tiers.
    #[must_use]
    pub fn repository(&self) -> &Arc<CacheRepository> {
        &self.repository
    }

    /// Loads the image for `request`.
    ///
    /// Returns `Ok(None)` when the image cannot be fetched or decoded.
    ///
    /// # Errors
    /// Never fails; see [`Self::load_cancellable`] for the cancellable variant.
    pub async fn load(
        &self,
        request: &ImageRequest,
    ) -> Result<Option<Arc<DynamicImage>>, LoadError> {
        Ok(self
            .load_with_source(request)
            .await?
            .map(|loaded| loaded.image))
    }

    /// Loads the image for `request` and reports which tier served it.
    ///
    /// # Errors
    /// Never fails; see [`Self::load_cancellable`] for the cancellable variant.
    pub async fn load_with_source(
        &self,
        request: &ImageRequest,
    ) -> Result<Option<LoadedImage>, LoadError> {
        self.load_cancellable(request, &CancellationToken::new())
            .await
    }

    /// Loads the image for `request`, giving up when `cancel` fires.
    ///
    /// Cancellation drops in-flight network and disk work; partially written
    /// cache files are cleaned up by the disk cache.
    ///
    /// # Errors
    /// Returns [`LoadError::Cancelled`] if `cancel` fires before the load completes.
    pub async fn load_cancellable(
        &self,
        request: &ImageRequest,
        cancel: &CancellationToken,
    ) -> Result<Option<LoadedImage>, LoadError> {
        if cancel.is_cancelled() {
            debug!(url = %request.url(), "Image load cancelled before start");
            return Err(LoadError::Cancelled);
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(url = %request.url(), "Image load cancelled");
                Err(LoadError::Cancelled)
            }
            result = self.load_uncancelled(request) => result,
        }
    }

    async fn load_uncancelled(
        &self,
        request: &ImageRequest,
    ) -> Result<Option<LoadedImage>, LoadError> {
        let base_key = request.base_key();
        let final_key = request.final_key();
        let transformations = request.transformations();

        if let Some((image, source)) = self.repository.get_with_source(&final_key).await {
            return Ok(Some(LoadedImage {
                key: final_key,
                image,
                source,
            }));
        }

        if !transformations.is_empty()
            && let Some((original, source)) = self.repository.get_with_source(&base_key).await
        {
            return Ok(self
                .transform_and_store(original, transformations, final_key)
                .await
                .map(|image| LoadedImage {
                    key: request.final_key(),
                    image,
                    source,
                }));
        }

        let bytes = match self.fetcher.fetch(request.url()).await {
            Ok(bytes) => bytes,
            Err(FetchError::Cancelled) => return Err(LoadError::Cancelled),
            Err(e) => {
                warn!(url = %request.url(), error = %e, "Failed to download image");
                return Ok(None);
            }
        };

        let Some(original) = self.decode_downsampled(request, bytes).await else {
            return Ok(None);
        };

        self.repository.put(&base_key, original.clone()).await;

        if transformations.is_empty() {
            debug!(key = %base_key, source = "network", "Image loaded successfully");
            return Ok(Some(LoadedImage {
                key: base_key,
                image: original,
                source: ImageSource::Network,
            }));
        }

        Ok(self
            .transform_and_store(original, transformations, final_key)
            .await
            .map(|image| LoadedImage {
                key: request.final_key(),
                image,
                source: ImageSource::Network,
            }))
    }

    /// Decodes bounds, picks a sample factor, then decodes at that factor.
    async fn decode_downsampled(
        &self,
        request: &ImageRequest,
        bytes: Bytes,
    ) -> Option<Arc<DynamicImage>> {
        let codec = self.codec.clone();
        let format = self.decode_format;
        let (target_width, target_height) = (request.target_width(), request.target_height());

        let result = tokio::task::spawn_blocking(move || {
            let (width, height) = codec.decode_bounds(&bytes)?;
            let factor = calculate_sample_factor(width, height, target_width, target_height);
            let img = codec.decode_scaled(&bytes, factor, format)?;
            Ok::<_, crate::domain::ports::CodecError>((img, width, height, factor))
        })
        .await;

        match result {
            Ok(Ok((img, width, height, factor))) => {
                debug!(
                    url = %request.url(),
                    original = %format!("{width}x{height}"),
                    sample_factor = factor,
                    decoded = %format!("{}x{}", img.width(), img.height()),
                    "Decoded network image"
                );
                Some(Arc::new(img))
            }
            Ok(Err(e)) => {
                warn!(url = %request.url(), error = %e, "Failed to decode image");
                None
            }
            Err(e) => {
                error!(url = %request.url(), error = %e, "Decode task panicked");
                None
            }
        }
    }

    /// Applies `transformations` in order and stores the result in memory only.
    async fn transform_and_store(
        &self,
        original: Arc<DynamicImage>,
        transformations: &[Transformation],
        final_key: CacheKey,
    ) -> Option<Arc<DynamicImage>> {
        let chain = transformations.to_vec();
        let transformed =
            tokio::task::spawn_blocking(move || Transformation::apply_all(&chain, &original))
                .await;

        match transformed {
            Ok(img) => {
                let img = Arc::new(img);
                self.repository.put_memory(&final_key, img.clone()).await;
                debug!(key = %final_key, "Stored transformed image in memory");
                Some(img)
            }
            Err(e) => {
                error!(key = %final_key, error = %e, "Transformation task panicked");
                None
            }
        }
    }

    /// Returns memory cache statistics.
    #[must_use]
    pub fn memory_cache_stats(&self) -> CacheStats {
        self.repository.memory().stats()
    }

    /// Clears all caches.
    pub async fn clear_all(&self) {
        self.repository.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Size;
    use crate::domain::ports::ImageCachePort;
    use crate::domain::ports::mocks::{CountingFetcher, PendingFetcher};
    use crate::infrastructure::image::codec::tests::png_bytes;
    use std::time::Duration;
    use tempfile::TempDir;
    use test_case::test_case;

    struct Harness {
        loader: ImageLoader,
        fetcher: Arc<CountingFetcher>,
        _temp: TempDir,
    }

    async fn harness(fetcher: CountingFetcher) -> Harness {
        let temp = TempDir::new().unwrap();
        let codec: Arc<dyn ImageCodecPort> = Arc::new(ImageRsCodec::new());
        let disk = DiskImageCache::new(temp.path().to_path_buf(), 5 * 1024 * 1024, codec.clone())
            .await
            .unwrap();
        let repository = Arc::new(CacheRepository::new(
            Arc::new(MemoryImageCache::new(16 * 1024 * 1024)),
            Arc::new(disk),
        ));
        let fetcher = Arc::new(fetcher);
        let loader = ImageLoader::new(repository, fetcher.clone(), codec);
        Harness {
            loader,
            fetcher,
            _temp: temp,
        }
    }

    fn request(url: &str, transformations: Vec<Transformation>) -> ImageRequest {
        ImageRequest::new(url, Size::new(100, 100), transformations)
    }

    #[test_case(400, 400, 100, 100, 4 ; "quarter_matches_target")]
    #[test_case(100, 100, 100, 100, 1 ; "exact_fit")]
    #[test_case(50, 50, 100, 100, 1 ; "smaller_source")]
    #[test_case(4000, 3000, 100, 100, 16 ; "large_source")]
    #[test_case(4000, 300, 100, 100, 2 ; "limited_by_height")]
    #[test_case(401, 401, 100, 100, 4 ; "odd_dimensions")]
    #[test_case(800, 800, 0, 0, 512 ; "zero_target_treated_as_one")]
    fn test_sample_factor(w: u32, h: u32, tw: u32, th: u32, expected: u32) {
        assert_eq!(calculate_sample_factor(w, h, tw, th), expected);
    }

    #[tokio::test]
    async fn test_network_load_then_memory_hit() {
        let h = harness(CountingFetcher::new().with_body("A", png_bytes(400, 400))).await;
        let req = request("A", Vec::new());

        let first = h.loader.load_with_source(&req).await.unwrap().unwrap();
        assert_eq!(first.source, ImageSource::Network);
        assert_eq!(first.key.as_str(), "A,100x100");
        let factor = calculate_sample_factor(400, 400, 100, 100);
        assert!(first.image.width() <= 400 / factor);
        assert!(first.image.height() <= 400 / factor);
        assert!(first.image.width() >= 100);

        let key = CacheKey::base("A", 100, 100);
        assert!(h.loader.repository().memory().contains(&key).await);
        assert!(h.loader.repository().disk().contains(&key).await);

        let second = h.loader.load_with_source(&req).await.unwrap().unwrap();
        assert_eq!(second.source, ImageSource::MemoryCache);
        assert_eq!(h.fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_transform_from_disk_cached_original() {
        let h = harness(CountingFetcher::new()).await;
        let base = CacheKey::base("A", 100, 100);
        let disk = h.loader.repository().disk().clone();
        disk.put(&base, Arc::new(DynamicImage::new_rgb8(120, 100)))
            .await
            .unwrap();

        let req = request("A", vec![Transformation::CircleCrop]);
        let loaded = h.loader.load_with_source(&req).await.unwrap().unwrap();

        assert_eq!(loaded.source, ImageSource::DiskCache);
        assert_eq!((loaded.image.width(), loaded.image.height()), (100, 100));
        assert_eq!(h.fetcher.calls(), 0);
        assert_eq!(disk.stats().await.hits, 1);

        let final_key = CacheKey::from("A,100x100,CIRCLE_CROP");
        assert_eq!(req.final_key(), final_key);
        assert!(h.loader.repository().memory().contains(&final_key).await);
        assert!(!disk.contains(&final_key).await);
        assert!(disk.get(&final_key).await.is_none());
    }

    #[tokio::test]
    async fn test_transformed_result_served_from_memory() {
        let h = harness(CountingFetcher::new().with_body("A", png_bytes(400, 400))).await;
        let req = request("A", vec![Transformation::rounded_corners(8.0)]);

        let first = h.loader.load_with_source(&req).await.unwrap().unwrap();
        assert_eq!(first.source, ImageSource::Network);
        assert!(matches!(*first.image, DynamicImage::ImageRgba8(_)));

        let second = h.loader.load_with_source(&req).await.unwrap().unwrap();
        assert_eq!(second.source, ImageSource::MemoryCache);
        assert_eq!(h.fetcher.calls(), 1);

        // The untransformed original is shared across transformation chains.
        let plain = h
            .loader
            .load_with_source(&request("A", Vec::new()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(plain.source, ImageSource::MemoryCache);
    }

    #[tokio::test]
    async fn test_decode_format_is_configurable() {
        let h = harness(CountingFetcher::new().with_body("A", png_bytes(40, 40))).await;
        let loader = h.loader.with_decode_format(PixelFormat::Rgba8);

        let image = loader
            .load(&request("A", Vec::new()))
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(*image, DynamicImage::ImageRgba8(_)));
    }

    #[tokio::test]
    async fn test_network_failure_is_absent() {
        let h = harness(CountingFetcher::new()).await;

        let result = h.loader.load(&request("missing", Vec::new())).await;

        assert!(matches!(result, Ok(None)));
        assert_eq!(h.fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_decode_failure_is_absent_and_not_cached() {
        let h = harness(CountingFetcher::new().with_body("A", &b"not an image"[..])).await;

        let result = h.loader.load(&request("A", Vec::new())).await;

        assert!(matches!(result, Ok(None)));
        assert!(h.loader.repository().disk().is_empty().await);
        assert!(h.loader.repository().memory().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_is_reraised() {
        let temp = TempDir::new().unwrap();
        let codec: Arc<dyn ImageCodecPort> = Arc::new(ImageRsCodec::new());
        let disk = DiskImageCache::new(temp.path().to_path_buf(), 1024 * 1024, codec.clone())
            .await
            .unwrap();
        let repository = Arc::new(CacheRepository::new(
            Arc::new(MemoryImageCache::new(1024 * 1024)),
            Arc::new(disk),
        ));
        let fetcher = Arc::new(PendingFetcher::default());
        let loader = ImageLoader::new(repository, fetcher.clone(), codec);

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = loader
            .load_cancellable(&request("A", Vec::new()), &token)
            .await;

        assert!(matches!(result, Err(LoadError::Cancelled)));
        assert_eq!(fetcher.calls(), 1);
        assert!(loader.repository().disk().is_empty().await);
    }

    #[tokio::test]
    async fn test_precancelled_token_skips_work() {
        let h = harness(CountingFetcher::new().with_body("A", png_bytes(10, 10))).await;
        let token = CancellationToken::new();
        token.cancel();

        let result = h
            .loader
            .load_cancellable(&request("A", Vec::new()), &token)
            .await;

        assert!(matches!(result, Err(LoadError::Cancelled)));
        assert_eq!(h.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_both_succeed() {
        let h = harness(CountingFetcher::new().with_body("A", png_bytes(200, 200))).await;
        let req = request("A", Vec::new());

        let (a, b) = tokio::join!(h.loader.load(&req), h.loader.load(&req));

        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_some());
        assert!((1..=2).contains(&h.fetcher.calls()));
        assert_eq!(h.loader.repository().disk().len().await, 1);
    }

    #[tokio::test]
    async fn test_clear_all_forces_refetch() {
        let h = harness(CountingFetcher::new().with_body("A", png_bytes(50, 50))).await;
        let req = request("A", Vec::new());

        h.loader.load(&req).await.unwrap();
        h.loader.clear_all().await;
        h.loader.load(&req).await.unwrap();

        assert_eq!(h.fetcher.calls(), 2);
    }
}
