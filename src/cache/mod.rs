//! Frame cache and prefetch orchestration.

pub mod frame_cache;
pub mod prefetch;

pub use frame_cache::{CachedImage, CachedMetadata, FrameCache};
pub use prefetch::{CacheProgress, FetchKind, Prefetcher, MAX_PARALLEL_FETCHES};
