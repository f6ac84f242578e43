//! Remote service contract and the async-to-tick bridge.

pub mod channel;
pub mod service;

pub use channel::{FetchChannel, FetchEvent};
pub use service::{FetchError, FetchResult, FrameService};
