//! Data model: frame identities, the product catalog, and frame metadata.

pub mod catalog;
pub mod keys;
pub mod metadata;

pub use catalog::{CodeCatalog, CodeOption, ProductCatalog, RawCatalog, RawFileEntry};
pub use keys::{FrameKey, PrefixKey, ProductCode, ProductKind, TimePrefix, UnixMillis};
pub use metadata::{BoundingBox, FrameMetadata, LonLat};
