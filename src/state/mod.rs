//! Engine state: indices, selection, and animation drivers.
//!
//! State is organized into small structures that correspond to different
//! areas of functionality; the engine composes them and guards the
//! transitions between them.

pub mod animation;
pub mod indices;
pub mod selection;

pub use animation::{
    ActiveAnimation, AnimationDrivers, AnimationSpeed, TILT_INTERVAL_MS, TIME_BASE_INTERVAL_MS,
};
pub use indices::IndexState;
pub use selection::Selection;
