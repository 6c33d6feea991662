//! Domain entity definitions.

mod cache_key;
mod image_request;
mod loaded_image;
mod transformation;

pub use cache_key::{CacheKey, DiskKey};
pub use image_request::{ImageRequest, RequestBuilder, Size, resolve_dimension};
pub use loaded_image::{ImageSource, LoadedImage};
pub use transformation::Transformation;
