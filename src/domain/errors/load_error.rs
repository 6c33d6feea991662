//! Errors surfaced by the image loader.

use thiserror::Error;

use crate::domain::ports::{CacheError, FetchError};

/// The only failure a load reports as an error.
///
/// Network, decode and persistence failures degrade to "no image" instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The caller cancelled the load while it was in flight.
    #[error("image load cancelled")]
    Cancelled,
}

/// Failure to assemble a loader from configuration.
#[derive(Debug, Error)]
pub enum InitError {
    /// The disk cache could not be opened.
    #[error("disk cache unavailable: {0}")]
    Cache(#[from] CacheError),
    /// The HTTP client could not be built.
    #[error("HTTP client unavailable: {0}")]
    Http(#[from] FetchError),
}
