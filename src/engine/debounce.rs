//! Debounce scheduler for index changes.
//!
//! Rapid index-change requests on one axis coalesce into a single settled
//! value: each `schedule` call replaces the axis's pending commit and
//! restarts its quiet period, so only the last value within the window
//! ever commits. Superseded calls are abandoned (their settled signal is
//! dropped, not resolved), which makes last-write-wins structural.
//!
//! Two delay tiers are used per axis: a short one for discrete user input
//! (sliders, step buttons) and a shorter one for animation ticks, so
//! animation never visibly lags its interval period while direct
//! manipulation still coalesces.

use futures_channel::oneshot;

use crate::data::UnixMillis;

/// Quiet period for discrete user actions.
pub const INPUT_DEBOUNCE_MS: i64 = 25;
/// Quiet period for time-animation ticks.
pub const TIME_ANIMATION_DEBOUNCE_MS: i64 = 7;
/// Quiet period for tilt-animation ticks.
pub const TILT_ANIMATION_DEBOUNCE_MS: i64 = 15;

/// The two independent index axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Time,
    Tilt,
}

/// Delay tier for a scheduled change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceTier {
    /// Slider drags and step buttons.
    Input,
    /// Animation driver ticks.
    Animation,
}

impl DebounceTier {
    fn delay_ms(&self, axis: Axis) -> i64 {
        match (self, axis) {
            (DebounceTier::Input, _) => INPUT_DEBOUNCE_MS,
            (DebounceTier::Animation, Axis::Time) => TIME_ANIMATION_DEBOUNCE_MS,
            (DebounceTier::Animation, Axis::Tilt) => TILT_ANIMATION_DEBOUNCE_MS,
        }
    }
}

/// A commit that has settled and must be applied by the caller.
pub struct SettledCommit {
    pub axis: Axis,
    pub value: usize,
    settled: oneshot::Sender<()>,
}

impl SettledCommit {
    /// Signal the scheduling caller that the value is now committed.
    pub fn acknowledge(self) {
        let _ = self.settled.send(());
    }
}

struct PendingCommit {
    value: usize,
    deadline: UnixMillis,
    settled: oneshot::Sender<()>,
}

/// Per-axis last-write-wins debounce timers.
#[derive(Default)]
pub struct DebounceScheduler {
    time: Option<PendingCommit>,
    tilt: Option<PendingCommit>,
}

impl DebounceScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a value for an axis, replacing any pending commit there.
    ///
    /// The returned receiver resolves once the value commits; it is
    /// cancelled (sender dropped) if a later call supersedes this one, so
    /// callers must not assume every schedule resolves.
    pub fn schedule(
        &mut self,
        axis: Axis,
        value: usize,
        tier: DebounceTier,
        now: UnixMillis,
    ) -> oneshot::Receiver<()> {
        let (sender, receiver) = oneshot::channel();
        let pending = PendingCommit {
            value,
            deadline: now.plus_millis(tier.delay_ms(axis)),
            settled: sender,
        };
        *self.slot(axis) = Some(pending);
        receiver
    }

    /// The value currently pending for an axis, if any.
    pub fn pending_value(&self, axis: Axis) -> Option<usize> {
        match axis {
            Axis::Time => self.time.as_ref().map(|p| p.value),
            Axis::Tilt => self.tilt.as_ref().map(|p| p.value),
        }
    }

    /// Collect commits whose quiet period has elapsed.
    ///
    /// The caller applies each commit to the index state and then calls
    /// `acknowledge` to resolve the scheduling side.
    pub fn poll(&mut self, now: UnixMillis) -> Vec<SettledCommit> {
        let mut settled = Vec::new();
        for axis in [Axis::Time, Axis::Tilt] {
            let slot = self.slot(axis);
            if slot.as_ref().is_some_and(|p| now >= p.deadline) {
                if let Some(pending) = slot.take() {
                    settled.push(SettledCommit {
                        axis,
                        value: pending.value,
                        settled: pending.settled,
                    });
                }
            }
        }
        settled
    }

    /// Abandon the pending commit for one axis.
    pub fn cancel(&mut self, axis: Axis) {
        *self.slot(axis) = None;
    }

    /// Abandon all pending commits. Engine teardown and selection changes.
    pub fn clear(&mut self) {
        self.time = None;
        self.tilt = None;
    }

    fn slot(&mut self, axis: Axis) -> &mut Option<PendingCommit> {
        match axis {
            Axis::Time => &mut self.time,
            Axis::Tilt => &mut self.tilt,
        }
    }
}
