//! Port for fetching encoded image bytes.

use async_trait::async_trait;
use bytes::Bytes;

/// Result type for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Errors returned by a fetcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}")]
    Status {
        /// Response status code.
        status: u16,
    },
    /// Connection, timeout or body read failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// The transfer was aborted because the caller gave up.
    #[error("fetch cancelled")]
    Cancelled,
}

/// Port for downloading raw image bytes.
///
/// Dropping the returned future must abort the transfer.
#[async_trait]
pub trait ImageFetcherPort: Send + Sync {
    /// Fetches the body at `url`.
    async fn fetch(&self, url: &str) -> FetchResult<Bytes>;
}
