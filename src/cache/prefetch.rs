//! Prefetch orchestration for whole product+code selections.
//!
//! Priming walks every `(prefix, tilt)` pair the catalog lists for the
//! active selection and fills the frame cache ahead of playback, with a
//! bounded number of requests outstanding at once. Progress is reported as
//! completed pairs out of total pairs; a failed fetch counts as completed
//! (and simply leaves the key absent) so one bad frame cannot wedge the
//! batch.
//!
//! The orchestrator never talks to the network itself: `pump` claims fetch
//! slots in the cache and hands `(key, kind)` work items to the engine,
//! which spawns the actual service calls and routes completions back
//! through `on_fetch_settled`.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::cache::frame_cache::FrameCache;
use crate::data::{FrameKey, ProductCatalog, ProductCode, ProductKind};

/// Maximum fetch operations the prefetcher keeps outstanding.
pub const MAX_PARALLEL_FETCHES: usize = 6;

/// Which of a frame's two assets a fetch operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    Image,
    Metadata,
}

/// Progress counters for the active prime batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheProgress {
    /// Pairs fully settled (cached or failed).
    pub done: usize,
    /// Pairs enumerated for the batch.
    pub total: usize,
}

impl CacheProgress {
    pub fn is_complete(&self) -> bool {
        self.done >= self.total
    }
}

/// Outstanding asset needs for one enumerated pair.
#[derive(Debug)]
struct PendingPair {
    need_image: bool,
    need_metadata: bool,
}

impl PendingPair {
    fn is_settled(&self) -> bool {
        !self.need_image && !self.need_metadata
    }
}

/// Bounded-concurrency prefetcher with per-selection primed marks.
#[derive(Default)]
pub struct Prefetcher {
    /// Selection the current batch belongs to.
    batch: Option<(ProductKind, ProductCode)>,
    /// Pairs enumerated but not yet issued.
    queue: VecDeque<FrameKey>,
    /// Pairs issued (or piggybacking on another caller's fetch), awaiting
    /// completion events.
    pending: HashMap<FrameKey, PendingPair>,
    /// Fetch operations this prefetcher issued itself.
    issued: HashSet<(FrameKey, FetchKind)>,
    outstanding: usize,
    progress: CacheProgress,
    primed: HashSet<(ProductKind, ProductCode)>,
}

impl Prefetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) priming a selection.
    ///
    /// Calling again for the selection already being primed is a no-op;
    /// the in-flight batch keeps its progress. Any other selection replaces
    /// the batch; previously issued fetches still complete into the cache,
    /// they just no longer count toward progress.
    pub fn begin(
        &mut self,
        product: ProductKind,
        code: &ProductCode,
        catalog: &ProductCatalog,
        cache: &FrameCache,
    ) {
        let selection = (product, code.clone());
        if self.batch.as_ref() == Some(&selection) && !self.batch_finished() {
            log::debug!("Prime already in flight for {} {}, ignoring", product, code);
            return;
        }

        self.primed.remove(&selection);
        self.queue.clear();
        self.pending.clear();

        let mut done = 0;
        let mut total = 0;
        for prefix in catalog.prefix_sequence(product, code) {
            let Some(max_tilt) = catalog.max_tilt(product, prefix) else {
                continue;
            };
            for tilt in 0..=max_tilt {
                let key = FrameKey::new(product, code.clone(), prefix.clone(), tilt);
                total += 1;
                if cache.has_frame(&key) {
                    done += 1;
                } else {
                    self.queue.push_back(key);
                }
            }
        }

        log::info!(
            "Priming {} {}: {} frame(s), {} already cached",
            product,
            code,
            total,
            done
        );

        self.batch = Some(selection);
        self.progress = CacheProgress { done, total };
        self.maybe_mark_primed();
    }

    /// Claim fetch slots for queued pairs, up to the parallelism budget.
    ///
    /// Returns the operations the engine must spawn. Pairs whose assets are
    /// already being fetched by someone else are tracked as pending without
    /// issuing anything; their completions settle them like any other.
    pub fn pump(&mut self, cache: &mut FrameCache) -> Vec<(FrameKey, FetchKind)> {
        let mut ops = Vec::new();

        while self.outstanding < MAX_PARALLEL_FETCHES {
            let Some(key) = self.queue.pop_front() else {
                break;
            };

            let pair = PendingPair {
                need_image: !cache.has_image(&key),
                need_metadata: !cache.has_metadata(&key),
            };
            if pair.is_settled() {
                // Resolved since enumeration (e.g., by an overlay sync)
                self.progress.done += 1;
                continue;
            }

            if pair.need_image && cache.begin_image_fetch(&key) {
                self.issued.insert((key.clone(), FetchKind::Image));
                self.outstanding += 1;
                ops.push((key.clone(), FetchKind::Image));
            }
            if pair.need_metadata && cache.begin_metadata_fetch(&key) {
                self.issued.insert((key.clone(), FetchKind::Metadata));
                self.outstanding += 1;
                ops.push((key.clone(), FetchKind::Metadata));
            }
            self.pending.insert(key, pair);
        }

        self.maybe_mark_primed();
        ops
    }

    /// Record a completed fetch (success or failure) for a key + kind.
    ///
    /// Failures advance `done` like successes; the key stays absent from
    /// the cache and is retried on the next access or prime pass.
    pub fn on_fetch_settled(&mut self, key: &FrameKey, kind: FetchKind) {
        if self.issued.remove(&(key.clone(), kind)) {
            self.outstanding = self.outstanding.saturating_sub(1);
        }

        if let Some(pair) = self.pending.get_mut(key) {
            match kind {
                FetchKind::Image => pair.need_image = false,
                FetchKind::Metadata => pair.need_metadata = false,
            }
            if pair.is_settled() {
                self.pending.remove(key);
                self.progress.done += 1;
            }
        }

        self.maybe_mark_primed();
    }

    pub fn progress(&self) -> CacheProgress {
        self.progress
    }

    pub fn is_primed(&self, product: ProductKind, code: &ProductCode) -> bool {
        self.primed.contains(&(product, code.clone()))
    }

    /// Drop primed marks for selections the new catalog no longer lists.
    pub fn retain_primed(&mut self, keep: impl Fn(ProductKind, &ProductCode) -> bool) {
        self.primed.retain(|(product, code)| keep(*product, code));
    }

    /// Abandon everything. Engine teardown only.
    pub fn reset(&mut self) {
        self.batch = None;
        self.queue.clear();
        self.pending.clear();
        self.issued.clear();
        self.outstanding = 0;
        self.progress = CacheProgress::default();
        self.primed.clear();
    }

    fn batch_finished(&self) -> bool {
        self.queue.is_empty() && self.pending.is_empty()
    }

    fn maybe_mark_primed(&mut self) {
        if !self.batch_finished() || self.progress.total == 0 {
            return;
        }
        if let Some(selection) = self.batch.clone() {
            if self.primed.insert(selection.clone()) {
                log::info!(
                    "Primed {} {} ({} frame(s))",
                    selection.0,
                    selection.1,
                    self.progress.total
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::catalog::{CodeCatalog, RawCatalog, RawFileEntry};
    use crate::data::{BoundingBox, FrameMetadata, TimePrefix, UnixMillis};
    use std::collections::BTreeMap;

    fn catalog_with(prefixes: &[(&str, u32)]) -> ProductCatalog {
        let mut files = BTreeMap::new();
        for (name, sweeps) in prefixes {
            files.insert(format!("{}.png", name), RawFileEntry { sweeps: *sweeps });
        }
        let mut raw = RawCatalog::new();
        raw.insert(ProductKind::Reflectivity, files);
        ProductCatalog::build(raw, CodeCatalog::new())
    }

    fn meta() -> FrameMetadata {
        FrameMetadata {
            bounding_box_lon_lat: BoundingBox {
                nw: [0.0, 1.0],
                ne: [1.0, 1.0],
                se: [1.0, 0.0],
                sw: [0.0, 0.0],
            },
            elevation_angle_degrees: 0.5,
            sweeps: 2,
        }
    }

    fn settle(
        prefetcher: &mut Prefetcher,
        cache: &mut FrameCache,
        key: &FrameKey,
        kind: FetchKind,
        succeed: bool,
    ) {
        match kind {
            FetchKind::Image => {
                cache.finish_image_fetch(key);
                if succeed {
                    cache.insert_image(key.clone(), &[0u8], UnixMillis(1));
                }
            }
            FetchKind::Metadata => {
                cache.finish_metadata_fetch(key);
                if succeed {
                    cache.insert_metadata(key.clone(), meta(), UnixMillis(1));
                }
            }
        }
        prefetcher.on_fetch_settled(key, kind);
    }

    #[test]
    fn test_total_counts_pairs_and_done_counts_cached() {
        let catalog = catalog_with(&[("KDMX20240501_100000", 2), ("KDMX20240501_110000", 3)]);
        let mut cache = FrameCache::new();
        let code = ProductCode::sentinel();

        // Pre-cache one complete pair
        let warm = FrameKey::new(
            ProductKind::Reflectivity,
            code.clone(),
            TimePrefix::from("KDMX20240501_100000"),
            0,
        );
        cache.insert_image(warm.clone(), &[0u8], UnixMillis(1));
        cache.insert_metadata(warm, meta(), UnixMillis(1));

        let mut prefetcher = Prefetcher::new();
        prefetcher.begin(ProductKind::Reflectivity, &code, &catalog, &cache);

        assert_eq!(prefetcher.progress(), CacheProgress { done: 1, total: 5 });
        assert!(!prefetcher.is_primed(ProductKind::Reflectivity, &code));
    }

    #[test]
    fn test_pump_respects_parallelism_budget() {
        let catalog = catalog_with(&[("KDMX20240501_100000", 8)]);
        let mut cache = FrameCache::new();
        let code = ProductCode::sentinel();

        let mut prefetcher = Prefetcher::new();
        prefetcher.begin(ProductKind::Reflectivity, &code, &catalog, &cache);

        let ops = prefetcher.pump(&mut cache);
        // Budget is per fetch operation; a pair needs two
        assert!(ops.len() >= MAX_PARALLEL_FETCHES);
        assert!(ops.len() <= MAX_PARALLEL_FETCHES + 1);

        // Draining nothing yields nothing more
        assert!(prefetcher.pump(&mut cache).is_empty());
    }

    #[test]
    fn test_batch_completes_and_marks_primed() {
        let catalog = catalog_with(&[("KDMX20240501_100000", 2)]);
        let mut cache = FrameCache::new();
        let code = ProductCode::sentinel();

        let mut prefetcher = Prefetcher::new();
        prefetcher.begin(ProductKind::Reflectivity, &code, &catalog, &cache);

        loop {
            let ops = prefetcher.pump(&mut cache);
            if ops.is_empty() && prefetcher.progress().is_complete() {
                break;
            }
            for (key, kind) in ops {
                settle(&mut prefetcher, &mut cache, &key, kind, true);
            }
        }

        assert_eq!(prefetcher.progress(), CacheProgress { done: 2, total: 2 });
        assert!(prefetcher.is_primed(ProductKind::Reflectivity, &code));
        assert_eq!(cache.image_count(), 2);
        assert_eq!(cache.metadata_count(), 2);
    }

    #[test]
    fn test_failed_fetches_count_toward_done() {
        let catalog = catalog_with(&[("KDMX20240501_100000", 1)]);
        let mut cache = FrameCache::new();
        let code = ProductCode::sentinel();

        let mut prefetcher = Prefetcher::new();
        prefetcher.begin(ProductKind::Reflectivity, &code, &catalog, &cache);

        let ops = prefetcher.pump(&mut cache);
        assert_eq!(ops.len(), 2);
        for (key, kind) in ops {
            settle(&mut prefetcher, &mut cache, &key, kind, false);
        }

        assert_eq!(prefetcher.progress(), CacheProgress { done: 1, total: 1 });
        assert!(prefetcher.is_primed(ProductKind::Reflectivity, &code));
        // The frame stayed absent and is claimable again later
        assert_eq!(cache.image_count(), 0);
    }

    #[test]
    fn test_reentrant_begin_does_not_restart_batch() {
        let catalog = catalog_with(&[("KDMX20240501_100000", 4)]);
        let mut cache = FrameCache::new();
        let code = ProductCode::sentinel();

        let mut prefetcher = Prefetcher::new();
        prefetcher.begin(ProductKind::Reflectivity, &code, &catalog, &cache);
        let ops = prefetcher.pump(&mut cache);
        assert!(!ops.is_empty());

        // Same selection again while in flight: nothing changes
        prefetcher.begin(ProductKind::Reflectivity, &code, &catalog, &cache);
        assert!(prefetcher.pump(&mut cache).is_empty());
    }

    #[test]
    fn test_piggybacks_on_foreign_inflight_fetch() {
        let catalog = catalog_with(&[("KDMX20240501_100000", 1)]);
        let mut cache = FrameCache::new();
        let code = ProductCode::sentinel();

        let key = FrameKey::new(
            ProductKind::Reflectivity,
            code.clone(),
            TimePrefix::from("KDMX20240501_100000"),
            0,
        );
        // An overlay sync already claimed the image fetch
        assert!(cache.begin_image_fetch(&key));

        let mut prefetcher = Prefetcher::new();
        prefetcher.begin(ProductKind::Reflectivity, &code, &catalog, &cache);
        let ops = prefetcher.pump(&mut cache);

        // Only the metadata fetch is newly issued
        assert_eq!(ops, vec![(key.clone(), FetchKind::Metadata)]);

        // Both completions (one foreign, one own) settle the pair
        settle(&mut prefetcher, &mut cache, &key, FetchKind::Image, true);
        settle(&mut prefetcher, &mut cache, &key, FetchKind::Metadata, true);
        assert!(prefetcher.progress().is_complete());
    }
}
