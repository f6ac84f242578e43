//! Animation driver state.
//!
//! One tagged state covers all three loops (forward time, reverse time,
//! and tilt), so two drivers can never be running at once: starting any of
//! them is a single assignment that replaces whatever was active. Deadlines
//! are computed from an injected `now`, which keeps the drivers testable
//! against a fake clock.

use crate::data::UnixMillis;

/// Base period of the time drivers before speed scaling.
pub const TIME_BASE_INTERVAL_MS: i64 = 500;

/// Fixed period of the tilt driver (not speed-scaled; tilt animation is
/// scoped to a single time frame).
pub const TILT_INTERVAL_MS: i64 = 350;

/// Playback speed multiplier options.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AnimationSpeed {
    Half,
    #[default]
    Normal,
    OneAndHalf,
    Double,
    DoubleAndHalf,
    Triple,
}

impl AnimationSpeed {
    pub fn label(&self) -> &'static str {
        match self {
            AnimationSpeed::Half => "0.5x",
            AnimationSpeed::Normal => "1x",
            AnimationSpeed::OneAndHalf => "1.5x",
            AnimationSpeed::Double => "2x",
            AnimationSpeed::DoubleAndHalf => "2.5x",
            AnimationSpeed::Triple => "3x",
        }
    }

    pub fn all() -> &'static [AnimationSpeed] {
        &[
            AnimationSpeed::Half,
            AnimationSpeed::Normal,
            AnimationSpeed::OneAndHalf,
            AnimationSpeed::Double,
            AnimationSpeed::DoubleAndHalf,
            AnimationSpeed::Triple,
        ]
    }

    pub fn multiplier(&self) -> f32 {
        match self {
            AnimationSpeed::Half => 0.5,
            AnimationSpeed::Normal => 1.0,
            AnimationSpeed::OneAndHalf => 1.5,
            AnimationSpeed::Double => 2.0,
            AnimationSpeed::DoubleAndHalf => 2.5,
            AnimationSpeed::Triple => 3.0,
        }
    }

    /// Next speed in the cycle, wrapping after the fastest.
    pub fn next(&self) -> AnimationSpeed {
        let all = Self::all();
        let index = all.iter().position(|s| s == self).unwrap_or(0);
        all[(index + 1) % all.len()]
    }
}

/// Which animation loop is running, if any.
///
/// The time drivers and the tilt driver are mutually exclusive; the tagged
/// state makes "two loops at once" unrepresentable.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ActiveAnimation {
    #[default]
    Idle,
    Forward,
    Reverse,
    Tilt,
}

impl ActiveAnimation {
    pub fn is_idle(&self) -> bool {
        matches!(self, ActiveAnimation::Idle)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActiveAnimation::Idle => "idle",
            ActiveAnimation::Forward => "forward",
            ActiveAnimation::Reverse => "reverse",
            ActiveAnimation::Tilt => "tilt",
        }
    }
}

/// Driver state machine: active loop, speed, and the next tick deadline.
#[derive(Debug, Default)]
pub struct AnimationDrivers {
    active: ActiveAnimation,
    speed: AnimationSpeed,
    next_tick_at: Option<UnixMillis>,
}

impl AnimationDrivers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> ActiveAnimation {
        self.active
    }

    pub fn speed(&self) -> AnimationSpeed {
        self.speed
    }

    pub fn is_forward_playing(&self) -> bool {
        self.active == ActiveAnimation::Forward
    }

    pub fn is_reverse_playing(&self) -> bool {
        self.active == ActiveAnimation::Reverse
    }

    pub fn is_tilt_playing(&self) -> bool {
        self.active == ActiveAnimation::Tilt
    }

    /// Period of a driver's loop at the current speed.
    pub fn period_ms(&self, driver: ActiveAnimation) -> i64 {
        match driver {
            ActiveAnimation::Tilt => TILT_INTERVAL_MS,
            _ => (TIME_BASE_INTERVAL_MS as f32 / self.speed.multiplier()) as i64,
        }
    }

    /// Toggle a driver: starts it (stopping any sibling in the same
    /// assignment) or stops it if it was already the active one.
    ///
    /// Returns the resulting active state.
    pub fn toggle(&mut self, driver: ActiveAnimation, now: UnixMillis) -> ActiveAnimation {
        if self.active == driver {
            self.stop_all();
        } else {
            self.active = driver;
            self.next_tick_at = Some(now.plus_millis(self.period_ms(driver)));
            log::debug!("Animation {} started", driver.label());
        }
        self.active
    }

    pub fn stop_all(&mut self) {
        if !self.active.is_idle() {
            log::debug!("Animation {} stopped", self.active.label());
        }
        self.active = ActiveAnimation::Idle;
        self.next_tick_at = None;
    }

    /// Rotate to the next speed multiplier.
    ///
    /// A running time driver is re-armed at the new period so the speed
    /// change never leaves animation silently stopped.
    pub fn cycle_speed(&mut self, now: UnixMillis) -> AnimationSpeed {
        self.speed = self.speed.next();
        if matches!(self.active, ActiveAnimation::Forward | ActiveAnimation::Reverse) {
            self.next_tick_at = Some(now.plus_millis(self.period_ms(self.active)));
        }
        self.speed
    }

    /// Consume a due tick for the active driver, re-arming its deadline.
    ///
    /// Returns the driver that should advance, or `None` when idle or not
    /// yet due.
    pub fn due_tick(&mut self, now: UnixMillis) -> Option<ActiveAnimation> {
        if self.active.is_idle() {
            return None;
        }
        let deadline = self.next_tick_at?;
        if now < deadline {
            return None;
        }
        self.next_tick_at = Some(now.plus_millis(self.period_ms(self.active)));
        Some(self.active)
    }
}
