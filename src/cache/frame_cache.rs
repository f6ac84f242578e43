//! In-memory frame cache.
//!
//! Two independent content-addressable stores keyed by `FrameKey`: one for
//! image payloads (held as ready-to-push data URLs) and one for metadata
//! documents. Population is asynchronous; the in-flight sets guarantee at
//! most one outstanding fetch per key per kind, so overlapping requests for
//! the same missing frame collapse into a single fetch.
//!
//! The cache is owned by the engine instance and torn down with it; nothing
//! here persists across sessions.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::{HashMap, HashSet};

use crate::data::{FrameKey, FrameMetadata, PrefixKey, UnixMillis};

/// A cached, display-ready frame image.
#[derive(Debug, Clone)]
pub struct CachedImage {
    /// `data:image/png;base64,...` URL for the map surface.
    pub data_url: String,
    /// Size of the original payload in bytes.
    pub byte_len: usize,
    pub fetched_at: UnixMillis,
}

/// A cached frame metadata document.
#[derive(Debug, Clone)]
pub struct CachedMetadata {
    pub metadata: FrameMetadata,
    pub fetched_at: UnixMillis,
}

/// Encode raw image bytes into a data URL the map surface can consume
/// directly.
fn encode_data_url(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

/// Instance-owned cache for frame images and metadata.
#[derive(Default)]
pub struct FrameCache {
    images: HashMap<FrameKey, CachedImage>,
    metadata: HashMap<FrameKey, CachedMetadata>,
    inflight_images: HashSet<FrameKey>,
    inflight_metadata: HashSet<FrameKey>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(&self, key: &FrameKey) -> Option<&CachedImage> {
        self.images.get(key)
    }

    pub fn metadata(&self, key: &FrameKey) -> Option<&CachedMetadata> {
        self.metadata.get(key)
    }

    pub fn has_image(&self, key: &FrameKey) -> bool {
        self.images.contains_key(key)
    }

    pub fn has_metadata(&self, key: &FrameKey) -> bool {
        self.metadata.contains_key(key)
    }

    /// Whether both kinds are resolved for this key.
    pub fn has_frame(&self, key: &FrameKey) -> bool {
        self.has_image(key) && self.has_metadata(key)
    }

    /// Claim the image fetch for a key.
    ///
    /// Returns `false` when the image is already cached or a fetch is
    /// already in flight; the caller must not issue a request in that case.
    pub fn begin_image_fetch(&mut self, key: &FrameKey) -> bool {
        if self.images.contains_key(key) || self.inflight_images.contains(key) {
            return false;
        }
        self.inflight_images.insert(key.clone());
        true
    }

    /// Claim the metadata fetch for a key. Same contract as
    /// `begin_image_fetch`.
    pub fn begin_metadata_fetch(&mut self, key: &FrameKey) -> bool {
        if self.metadata.contains_key(key) || self.inflight_metadata.contains(key) {
            return false;
        }
        self.inflight_metadata.insert(key.clone());
        true
    }

    /// Release the in-flight claim for an image fetch, whatever its outcome.
    pub fn finish_image_fetch(&mut self, key: &FrameKey) {
        self.inflight_images.remove(key);
    }

    /// Release the in-flight claim for a metadata fetch.
    pub fn finish_metadata_fetch(&mut self, key: &FrameKey) {
        self.inflight_metadata.remove(key);
    }

    /// Store an image payload, overwriting any previous entry.
    pub fn insert_image(&mut self, key: FrameKey, bytes: &[u8], now: UnixMillis) {
        log::debug!("Caching image {} ({} bytes)", key, bytes.len());
        self.images.insert(
            key,
            CachedImage {
                data_url: encode_data_url(bytes),
                byte_len: bytes.len(),
                fetched_at: now,
            },
        );
    }

    /// Store a metadata document, overwriting any previous entry.
    pub fn insert_metadata(&mut self, key: FrameKey, metadata: FrameMetadata, now: UnixMillis) {
        self.metadata.insert(
            key,
            CachedMetadata {
                metadata,
                fetched_at: now,
            },
        );
    }

    /// Evict every entry whose prefix-level identity is not in `valid`.
    ///
    /// Tilt is ignored: all tilts of a stale volume go together. Returns
    /// the number of entries removed across both stores.
    pub fn evict_except(&mut self, valid: &HashSet<PrefixKey>) -> usize {
        let images_before = self.images.len();
        let metadata_before = self.metadata.len();

        self.images.retain(|key, _| valid.contains(&key.prefix_key()));
        self.metadata
            .retain(|key, _| valid.contains(&key.prefix_key()));

        let removed =
            images_before - self.images.len() + metadata_before - self.metadata.len();
        if removed > 0 {
            log::info!("Evicted {} stale cache entr(ies)", removed);
        }
        removed
    }

    /// Drop everything, including in-flight claims. Engine teardown only.
    pub fn clear(&mut self) {
        self.images.clear();
        self.metadata.clear();
        self.inflight_images.clear();
        self.inflight_metadata.clear();
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn metadata_count(&self) -> usize {
        self.metadata.len()
    }
}
