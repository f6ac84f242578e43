//! Engine core: debounce scheduling, the cooperative task set, and the
//! playback engine that ties every component together.

pub mod debounce;
pub mod playback;
pub mod tasks;

pub use debounce::{Axis, DebounceScheduler, DebounceTier, SettledCommit};
pub use playback::{PlaybackEngine, CATALOG_REFRESH_INTERVAL_MS};
pub use tasks::TaskSet;
