//! Remote frame service contract.
//!
//! The engine consumes the data service through this trait: a full listing,
//! the code descriptors, and per-frame image/metadata fetches. Futures are
//! `'static` and not `Send`: the engine runs them on its own
//! single-threaded task set, so implementations are free to capture
//! non-thread-safe handles (browser fetch, UI-thread clients).

use futures_util::future::LocalBoxFuture;

use crate::data::{CodeCatalog, FrameKey, FrameMetadata, RawCatalog};

/// Errors that can occur while talking to the frame service.
#[derive(Debug, Clone)]
pub enum FetchError {
    /// The listing endpoint could not be reached or returned nothing usable.
    ListingUnavailable(String),
    /// A single frame asset fetch failed.
    RequestFailed(String),
    /// The response body could not be decoded.
    DecodeFailed(String),
    /// The requested asset does not exist on the remote store.
    NotFound,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::ListingUnavailable(msg) => write!(f, "Listing unavailable: {}", msg),
            FetchError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
            FetchError::DecodeFailed(msg) => write!(f, "Decode failed: {}", msg),
            FetchError::NotFound => write!(f, "Asset not found"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Result type for service operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Key-value style fetch service for frame assets.
///
/// Implementations back this with whatever transport the host has (HTTP,
/// object store, fixture data in tests). The engine guarantees at most one
/// in-flight fetch per frame key per kind; implementations do not need
/// their own de-duplication.
pub trait FrameService {
    /// Full product/time/sweep listing.
    fn list_catalog(&self) -> LocalBoxFuture<'static, FetchResult<RawCatalog>>;

    /// Code descriptors per multi-code product.
    fn list_codes(&self) -> LocalBoxFuture<'static, FetchResult<CodeCatalog>>;

    /// Rendered image bytes for one frame.
    fn fetch_image(&self, key: &FrameKey) -> LocalBoxFuture<'static, FetchResult<Vec<u8>>>;

    /// Metadata sidecar for one frame.
    fn fetch_metadata(&self, key: &FrameKey) -> LocalBoxFuture<'static, FetchResult<FrameMetadata>>;
}
