//! Glint - a tiered image loader.
//!
//! Images are served from a byte-weighted memory cache, then a journaled
//! disk cache, then the network, with downsampled decoding and optional
//! crop transformations.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
