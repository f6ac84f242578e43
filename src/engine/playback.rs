//! The playback engine.
//!
//! Owns every piece of engine state (catalog, selection, indices, caches,
//! prefetcher, debounce scheduler, animation drivers, and the in-flight
//! task set) and advances all of it from a single `tick(now)` the host
//! calls from its frame loop. All mutation happens inside `tick` or a
//! command; overlapping work is only ever asynchronous I/O, never parallel
//! execution.
//!
//! Ordering guarantees:
//! - per axis, the debounce scheduler is last-write-wins; an older pending
//!   commit can never apply after a newer one
//! - the cache keeps at most one in-flight fetch per key per kind
//! - starting an animation driver replaces the active one in a single
//!   assignment, so no tick from the old driver can land afterwards
//!
//! Fetches already in flight when the position moves on are allowed to
//! complete and populate the cache, but their overlay application is
//! guarded by a current-key check and silently discarded when stale.

use std::rc::Rc;

use crate::cache::{CacheProgress, FetchKind, FrameCache, Prefetcher};
use crate::data::{
    CodeCatalog, FrameKey, ProductCatalog, ProductCode, ProductKind, RawCatalog, UnixMillis,
};
use crate::engine::debounce::{Axis, DebounceScheduler, DebounceTier, SettledCommit};
use crate::engine::tasks::TaskSet;
use crate::fetch::{FetchChannel, FetchEvent, FrameService};
use crate::state::{ActiveAnimation, AnimationDrivers, AnimationSpeed, IndexState, Selection};
use crate::surface::MapSurface;

/// How often the engine re-lists the remote catalog.
pub const CATALOG_REFRESH_INTERVAL_MS: i64 = 60_000;

/// Playback and prefetch-cache engine for radar overlay imagery.
///
/// Constructed once per session and explicitly torn down with
/// [`PlaybackEngine::shutdown`]. The first `tick` after construction kicks
/// off the initial catalog listing.
pub struct PlaybackEngine {
    service: Rc<dyn FrameService>,
    surface: Box<dyn MapSurface>,

    catalog: ProductCatalog,
    last_raw: Option<RawCatalog>,
    last_codes: CodeCatalog,

    selection: Selection,
    indices: IndexState,
    drivers: AnimationDrivers,

    cache: FrameCache,
    prefetcher: Prefetcher,
    scheduler: DebounceScheduler,

    tasks: TaskSet,
    channel: FetchChannel,

    next_refresh_at: UnixMillis,
    refresh_parts_pending: u8,
    listing_dirty: bool,
    bootstrapped: bool,
    overlay_dirty: bool,
    shut_down: bool,
}

impl PlaybackEngine {
    /// Create an engine against a frame service and a map surface.
    ///
    /// The catalog is listed on the first `tick` at or after `now`.
    pub fn new(service: Rc<dyn FrameService>, surface: Box<dyn MapSurface>, now: UnixMillis) -> Self {
        Self {
            service,
            surface,
            catalog: ProductCatalog::new(),
            last_raw: None,
            last_codes: CodeCatalog::new(),
            selection: Selection::default(),
            indices: IndexState::new(),
            drivers: AnimationDrivers::new(),
            cache: FrameCache::new(),
            prefetcher: Prefetcher::new(),
            scheduler: DebounceScheduler::new(),
            tasks: TaskSet::new(),
            channel: FetchChannel::new(),
            next_refresh_at: now,
            refresh_parts_pending: 0,
            listing_dirty: false,
            bootstrapped: false,
            overlay_dirty: false,
            shut_down: false,
        }
    }

    /// Advance the engine: settle debounced commits, run due animation
    /// ticks, refresh the catalog on schedule, drive in-flight fetches,
    /// apply their results, keep the prefetch pipeline full, and sync the
    /// overlay if the settled position changed.
    pub fn tick(&mut self, now: UnixMillis) {
        if self.shut_down {
            return;
        }

        for commit in self.scheduler.poll(now) {
            self.apply_commit(commit);
        }

        if let Some(driver) = self.drivers.due_tick(now) {
            self.advance_driver(driver, now);
        }

        if now >= self.next_refresh_at && self.refresh_parts_pending == 0 {
            self.spawn_refresh();
            self.next_refresh_at = now.plus_millis(CATALOG_REFRESH_INTERVAL_MS);
        }

        self.tasks.run_until_stalled();

        while let Some(event) = self.channel.try_recv() {
            self.handle_event(event, now);
        }

        self.pump_prefetch();

        if self.overlay_dirty {
            self.overlay_dirty = false;
            self.sync_overlay();
        }
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Switch the active product. Multi-code products become addressable
    /// again once a code is selected.
    pub fn select_product(&mut self, product: ProductKind) {
        if self.shut_down || product == self.selection.product() {
            return;
        }
        self.drivers.stop_all();
        self.scheduler.clear();
        self.selection.select_product(product);
        log::info!("Product selected: {}", product);
        self.activate_selection(false);
    }

    /// Select a code for the active multi-code product. Ignored for the
    /// single-code family.
    pub fn select_code(&mut self, code: ProductCode) {
        if self.shut_down || self.selection.product().is_single_code() {
            return;
        }
        self.drivers.stop_all();
        self.scheduler.clear();
        self.selection.select_code(code);
        self.activate_selection(true);
    }

    pub fn step_forward(&mut self, now: UnixMillis) {
        self.step_time(1, now);
    }

    pub fn step_backward(&mut self, now: UnixMillis) {
        self.step_time(-1, now);
    }

    /// Jump to the first (oldest) frame.
    pub fn skip_first(&mut self, now: UnixMillis) {
        if self.shut_down || !self.is_ready() {
            return;
        }
        self.drivers.stop_all();
        self.scheduler
            .schedule(Axis::Time, 0, DebounceTier::Input, now);
    }

    /// Jump to the last (latest) frame.
    pub fn skip_last(&mut self, now: UnixMillis) {
        if self.shut_down || !self.is_ready() {
            return;
        }
        self.drivers.stop_all();
        self.scheduler
            .schedule(Axis::Time, self.indices.max_time(), DebounceTier::Input, now);
    }

    /// Slider-style absolute time position.
    pub fn set_time_index(&mut self, index: usize, now: UnixMillis) {
        if self.shut_down || !self.is_ready() {
            return;
        }
        self.drivers.stop_all();
        self.scheduler.schedule(
            Axis::Time,
            index.min(self.indices.max_time()),
            DebounceTier::Input,
            now,
        );
    }

    /// Slider-style absolute tilt position.
    pub fn set_tilt_index(&mut self, index: usize, now: UnixMillis) {
        if self.shut_down || !self.can_adjust_tilt() {
            return;
        }
        self.drivers.stop_all();
        self.scheduler.schedule(
            Axis::Tilt,
            index.min(self.indices.max_tilt()),
            DebounceTier::Input,
            now,
        );
    }

    /// Step tilt by one sweep, wrapping through the full range.
    pub fn step_tilt(&mut self, direction: i32, now: UnixMillis) {
        if self.shut_down || !self.can_adjust_tilt() {
            return;
        }
        self.drivers.stop_all();
        let next = self
            .indices
            .peek_tilt_step(self.effective_tilt(), direction);
        self.scheduler
            .schedule(Axis::Tilt, next, DebounceTier::Input, now);
    }

    pub fn toggle_forward(&mut self, now: UnixMillis) {
        self.toggle_driver(ActiveAnimation::Forward, now);
    }

    pub fn toggle_reverse(&mut self, now: UnixMillis) {
        self.toggle_driver(ActiveAnimation::Reverse, now);
    }

    pub fn toggle_tilt(&mut self, now: UnixMillis) {
        self.toggle_driver(ActiveAnimation::Tilt, now);
    }

    /// Rotate the playback speed; a running time driver restarts at the
    /// new period.
    pub fn cycle_speed(&mut self, now: UnixMillis) {
        if self.shut_down {
            return;
        }
        let speed = self.drivers.cycle_speed(now);
        log::debug!("Playback speed: {}", speed.label());
    }

    /// Stop everything and release all owned state. The engine ignores
    /// ticks and commands afterwards.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        log::info!("Playback engine shutting down");
        self.drivers.stop_all();
        self.scheduler.clear();
        self.tasks.clear();
        self.prefetcher.reset();
        self.cache.clear();
        self.shut_down = true;
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn current_time(&self) -> usize {
        self.indices.time()
    }

    pub fn current_tilt(&self) -> usize {
        self.indices.tilt()
    }

    pub fn max_time(&self) -> usize {
        self.indices.max_time()
    }

    pub fn max_tilt(&self) -> usize {
        self.indices.max_tilt()
    }

    pub fn is_forward_playing(&self) -> bool {
        self.drivers.is_forward_playing()
    }

    pub fn is_reverse_playing(&self) -> bool {
        self.drivers.is_reverse_playing()
    }

    pub fn is_tilt_playing(&self) -> bool {
        self.drivers.is_tilt_playing()
    }

    pub fn speed(&self) -> AnimationSpeed {
        self.drivers.speed()
    }

    /// Prefetch progress for the active selection's prime batch.
    pub fn cache_progress(&self) -> CacheProgress {
        self.prefetcher.progress()
    }

    /// Whether the active selection has been fully primed.
    pub fn is_primed(&self) -> bool {
        self.selection
            .pair()
            .map(|(product, code)| self.prefetcher.is_primed(product, &code))
            .unwrap_or(false)
    }

    /// Whether frame-stepping and time animation are currently permitted.
    pub fn is_ready(&self) -> bool {
        self.selection.permits_stepping(self.indices.tilt()) && self.has_listed_frames()
    }

    /// The composite key for the currently settled position.
    pub fn current_key(&self) -> Option<FrameKey> {
        let (product, code) = self.selection.pair()?;
        let prefix = self
            .catalog
            .prefix_at(product, &code, self.indices.time())?
            .clone();
        Some(FrameKey::new(product, code, prefix, self.indices.tilt()))
    }

    /// Timeline tick label (`H:MM`) for a time index of the active
    /// selection.
    pub fn time_label(&self, index: usize) -> Option<String> {
        let (product, code) = self.selection.pair()?;
        self.catalog
            .prefix_at(product, &code, index)?
            .time_label()
    }

    /// Whether a day divider belongs after a time index.
    pub fn day_rollover_after(&self, index: usize) -> bool {
        self.selection
            .pair()
            .map(|(product, code)| self.catalog.day_rollover_after(product, &code, index))
            .unwrap_or(false)
    }

    /// Code descriptors for a product (empty for the single-code family).
    pub fn code_options(&self, product: ProductKind) -> Vec<crate::data::CodeOption> {
        self.catalog.code_options(product).to_vec()
    }

    #[cfg(test)]
    pub(crate) fn cache_counts(&self) -> (usize, usize) {
        (self.cache.image_count(), self.cache.metadata_count())
    }

    // ------------------------------------------------------------------
    // Tick internals
    // ------------------------------------------------------------------

    fn apply_commit(&mut self, commit: SettledCommit) {
        match commit.axis {
            Axis::Time => {
                self.indices.set_time(commit.value);
                // The new volume may have fewer sweeps; demote tilt rather
                // than leave it dangling
                self.rebind_tilt_for_current_time();
            }
            Axis::Tilt => self.indices.set_tilt(commit.value),
        }
        commit.acknowledge();
        self.overlay_dirty = true;
    }

    fn advance_driver(&mut self, driver: ActiveAnimation, now: UnixMillis) {
        match driver {
            ActiveAnimation::Forward | ActiveAnimation::Reverse => {
                if !self.is_ready() {
                    return;
                }
                let direction = if driver == ActiveAnimation::Forward { 1 } else { -1 };
                let next = self
                    .indices
                    .peek_time_step(self.effective_time(), direction);
                self.scheduler
                    .schedule(Axis::Time, next, DebounceTier::Animation, now);
            }
            ActiveAnimation::Tilt => {
                if !self.can_adjust_tilt() {
                    return;
                }
                let next = self.indices.peek_tilt_step(self.effective_tilt(), 1);
                self.scheduler
                    .schedule(Axis::Tilt, next, DebounceTier::Animation, now);
            }
            ActiveAnimation::Idle => {}
        }
    }

    fn spawn_refresh(&mut self) {
        log::debug!("Refreshing catalog listing");
        self.refresh_parts_pending = 2;

        let sender = self.channel.sender();
        let listing = self.service.list_catalog();
        self.tasks.spawn(async move {
            let _ = sender.unbounded_send(FetchEvent::Listing(listing.await));
        });

        let sender = self.channel.sender();
        let codes = self.service.list_codes();
        self.tasks.spawn(async move {
            let _ = sender.unbounded_send(FetchEvent::Codes(codes.await));
        });
    }

    fn handle_event(&mut self, event: FetchEvent, now: UnixMillis) {
        match event {
            FetchEvent::Listing(Ok(raw)) => {
                self.last_raw = Some(raw);
                self.listing_dirty = true;
                self.note_refresh_part_done();
            }
            FetchEvent::Listing(Err(e)) => {
                // Not fatal: stay (or remain) not-ready and retry next cycle
                log::warn!("Catalog listing failed: {}", e);
                self.note_refresh_part_done();
            }
            FetchEvent::Codes(Ok(codes)) => {
                self.last_codes = codes;
                self.listing_dirty = true;
                self.note_refresh_part_done();
            }
            FetchEvent::Codes(Err(e)) => {
                log::warn!("Code listing failed: {}", e);
                self.note_refresh_part_done();
            }
            FetchEvent::Image { key, result } => {
                self.cache.finish_image_fetch(&key);
                match result {
                    Ok(bytes) => {
                        self.cache.insert_image(key.clone(), &bytes, now);
                        self.apply_image_if_current(&key);
                    }
                    Err(e) => log::warn!("Image fetch failed for {}: {}", key, e),
                }
                self.prefetcher.on_fetch_settled(&key, FetchKind::Image);
            }
            FetchEvent::Metadata { key, result } => {
                self.cache.finish_metadata_fetch(&key);
                match result {
                    Ok(metadata) => {
                        self.cache.insert_metadata(key.clone(), metadata, now);
                        self.apply_metadata_if_current(&key);
                    }
                    Err(e) => log::warn!("Metadata fetch failed for {}: {}", key, e),
                }
                self.prefetcher.on_fetch_settled(&key, FetchKind::Metadata);
            }
        }
    }

    fn note_refresh_part_done(&mut self) {
        self.refresh_parts_pending = self.refresh_parts_pending.saturating_sub(1);
        if self.refresh_parts_pending == 0 && self.listing_dirty {
            self.listing_dirty = false;
            self.rebuild_catalog();
        }
    }

    /// Swap in a catalog built wholesale from the newest listing + codes.
    fn rebuild_catalog(&mut self) {
        let Some(raw) = self.last_raw.clone() else {
            return;
        };
        self.catalog = ProductCatalog::build(raw, self.last_codes.clone());
        self.post_catalog_update();
    }

    fn post_catalog_update(&mut self) {
        let valid = self.catalog.valid_prefix_keys();
        self.cache.evict_except(&valid);

        let catalog = &self.catalog;
        self.prefetcher
            .retain_primed(|product, code| catalog.has_frames(product, code));

        if !self.has_listed_frames() {
            return;
        }

        if !self.bootstrapped {
            self.activate_selection(false);
            return;
        }

        // A refresh leaves the position alone unless it became invalid,
        // in which case it is clamped, not reset
        let before = (self.indices.time(), self.indices.tilt());
        self.rebind_bounds();
        if (self.indices.time(), self.indices.tilt()) != before {
            self.overlay_dirty = true;
        }

        if let Some((product, code)) = self.selection.pair() {
            self.prefetcher
                .begin(product, &code, &self.catalog, &self.cache);
        }
    }

    /// Position a freshly addressable selection at its latest frame and
    /// start priming it.
    fn activate_selection(&mut self, reset_tilt: bool) {
        let Some((product, code)) = self.selection.pair() else {
            return;
        };
        if !self.catalog.has_frames(product, &code) {
            log::debug!("No frames listed for {} {} yet", product, code);
            return;
        }

        let max_time = self.catalog.max_time(product, &code).unwrap_or(0);
        self.indices.rebind(max_time, self.indices.max_tilt());
        self.indices.set_time(max_time);
        if reset_tilt {
            self.indices.set_tilt(0);
        }
        self.rebind_tilt_for_current_time();

        self.bootstrapped = true;
        self.prefetcher
            .begin(product, &code, &self.catalog, &self.cache);
        self.overlay_dirty = true;
    }

    fn rebind_bounds(&mut self) {
        let Some((product, code)) = self.selection.pair() else {
            return;
        };
        let Some(max_time) = self.catalog.max_time(product, &code) else {
            return;
        };
        self.indices.rebind(max_time, self.indices.max_tilt());
        self.rebind_tilt_for_current_time();
    }

    fn rebind_tilt_for_current_time(&mut self) {
        let Some((product, code)) = self.selection.pair() else {
            return;
        };
        let Some(prefix) = self
            .catalog
            .prefix_at(product, &code, self.indices.time())
            .cloned()
        else {
            return;
        };
        if let Some(max_tilt) = self.catalog.max_tilt(product, &prefix) {
            self.indices.rebind_tilt(max_tilt);
        }
    }

    fn pump_prefetch(&mut self) {
        let ops = self.prefetcher.pump(&mut self.cache);
        for (key, kind) in ops {
            self.spawn_frame_fetch(key, kind);
        }
    }

    fn spawn_frame_fetch(&mut self, key: FrameKey, kind: FetchKind) {
        let sender = self.channel.sender();
        match kind {
            FetchKind::Image => {
                let fetch = self.service.fetch_image(&key);
                self.tasks.spawn(async move {
                    let result = fetch.await;
                    let _ = sender.unbounded_send(FetchEvent::Image { key, result });
                });
            }
            FetchKind::Metadata => {
                let fetch = self.service.fetch_metadata(&key);
                self.tasks.spawn(async move {
                    let result = fetch.await;
                    let _ = sender.unbounded_send(FetchEvent::Metadata { key, result });
                });
            }
        }
    }

    /// Resolve the current key's image and metadata independently and push
    /// whatever is available; misses are fetched and applied on completion
    /// if the key is still current by then.
    fn sync_overlay(&mut self) {
        let Some(key) = self.current_key() else {
            return;
        };

        if let Some(cached) = self.cache.metadata(&key) {
            self.surface
                .set_coordinates(cached.metadata.bounding_box_lon_lat.corners());
        } else if self.cache.begin_metadata_fetch(&key) {
            log::debug!("Overlay metadata miss for {}, fetching", key);
            self.spawn_frame_fetch(key.clone(), FetchKind::Metadata);
        }

        if let Some(cached) = self.cache.image(&key) {
            let url = cached.data_url.clone();
            self.surface.set_image(&url);
        } else if self.cache.begin_image_fetch(&key) {
            log::debug!("Overlay image miss for {}, fetching", key);
            self.spawn_frame_fetch(key, FetchKind::Image);
        }
    }

    fn apply_image_if_current(&mut self, key: &FrameKey) {
        if self.current_key().as_ref() == Some(key) {
            if let Some(cached) = self.cache.image(key) {
                let url = cached.data_url.clone();
                self.surface.set_image(&url);
            }
        } else {
            // Expected under fast scrubbing; the entry stays cached
            log::debug!("Discarding stale image apply for {}", key);
        }
    }

    fn apply_metadata_if_current(&mut self, key: &FrameKey) {
        if self.current_key().as_ref() == Some(key) {
            if let Some(cached) = self.cache.metadata(key) {
                self.surface
                    .set_coordinates(cached.metadata.bounding_box_lon_lat.corners());
            }
        } else {
            log::debug!("Discarding stale metadata apply for {}", key);
        }
    }

    // ------------------------------------------------------------------
    // Gates and helpers
    // ------------------------------------------------------------------

    fn toggle_driver(&mut self, driver: ActiveAnimation, now: UnixMillis) {
        if self.shut_down {
            return;
        }
        let starting = self.drivers.active() != driver;
        if starting {
            let permitted = match driver {
                ActiveAnimation::Tilt => self.can_adjust_tilt(),
                _ => self.is_ready(),
            };
            if !permitted {
                log::debug!("Selection not ready, ignoring {} start", driver.label());
                return;
            }
        }
        self.drivers.toggle(driver, now);
    }

    fn step_time(&mut self, direction: i32, now: UnixMillis) {
        if self.shut_down || !self.is_ready() {
            return;
        }
        self.drivers.stop_all();
        let next = self
            .indices
            .peek_time_step(self.effective_time(), direction);
        self.scheduler
            .schedule(Axis::Time, next, DebounceTier::Input, now);
    }

    /// Latest scheduled-or-committed time value; steps chain off pending
    /// commits so rapid steps do not lose ground to debouncing.
    fn effective_time(&self) -> usize {
        self.scheduler
            .pending_value(Axis::Time)
            .unwrap_or_else(|| self.indices.time())
    }

    fn effective_tilt(&self) -> usize {
        self.scheduler
            .pending_value(Axis::Tilt)
            .unwrap_or_else(|| self.indices.tilt())
    }

    fn has_listed_frames(&self) -> bool {
        self.selection
            .pair()
            .map(|(product, code)| self.catalog.has_frames(product, &code))
            .unwrap_or(false)
    }

    /// Tilt adjustment only needs an addressable selection; the tilt-rest
    /// readiness rule applies to time stepping, not to tilt itself.
    fn can_adjust_tilt(&self) -> bool {
        self.has_listed_frames()
    }
}
