//! radar-loop: playback and prefetch-cache engine for animated radar
//! overlay imagery.
//!
//! The engine tracks a position in two orthogonal indices (time and
//! elevation tilt), drives forward/reverse/tilt animation loops, debounces
//! rapid index changes, prefetches and caches frame images and metadata
//! keyed by a composite identity, and guarantees the visible overlay always
//! reflects the most recently settled position, never a stale or
//! half-loaded one.
//!
//! Hosts construct a [`engine::PlaybackEngine`] with a
//! [`fetch::FrameService`] (the remote data store) and a
//! [`surface::MapSurface`] (the rendering target), then call
//! [`engine::PlaybackEngine::tick`] from their frame loop and route UI
//! input to the engine's commands.

pub mod cache;
pub mod data;
pub mod engine;
pub mod fetch;
pub mod state;
pub mod surface;

pub use cache::CacheProgress;
pub use data::{FrameKey, FrameMetadata, ProductCode, ProductKind, TimePrefix, UnixMillis};
pub use engine::PlaybackEngine;
pub use fetch::{FetchError, FrameService};
pub use state::AnimationSpeed;
pub use surface::MapSurface;
