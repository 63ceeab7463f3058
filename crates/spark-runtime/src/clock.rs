//! Frame clock: refresh pacing and frame timestamps

use std::time::{Duration, Instant};

/// Paces frame delivery at a fixed refresh rate.
///
/// Timestamps are milliseconds since the clock was created, as `f64`, which
/// is what the engine's `advance` receives.
#[derive(Debug, Clone)]
pub struct FrameClock {
    /// Start of the run
    origin: Instant,
    /// Time between frames
    interval: Duration,
    /// When the next frame is due
    next_frame: Instant,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::with_refresh_rate(60.0)
    }
}

impl FrameClock {
    /// Create a clock with the default 60Hz refresh rate
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock for a custom refresh rate. Rates that give no usable
    /// frame interval (non-positive, NaN, vanishingly small) fall back to 60Hz.
    pub fn with_refresh_rate(hz: f64) -> Self {
        let interval = Some(hz)
            .filter(|hz| hz.is_finite() && *hz > 0.0)
            .and_then(|hz| Duration::try_from_secs_f64(1.0 / hz).ok())
            .filter(|interval| !interval.is_zero())
            .unwrap_or_else(|| Duration::from_secs_f64(1.0 / 60.0));
        let origin = Instant::now();
        Self {
            origin,
            interval,
            next_frame: origin,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Milliseconds elapsed since the clock started
    pub fn timestamp_at(&self, at: Instant) -> f64 {
        at.saturating_duration_since(self.origin).as_secs_f64() * 1000.0
    }

    pub fn now_ms(&self) -> f64 {
        self.timestamp_at(Instant::now())
    }

    /// How long to wait before the next frame is due (zero if already due)
    pub fn time_until_next_frame(&self, now: Instant) -> Duration {
        self.next_frame.saturating_duration_since(now)
    }

    /// Record that a frame was delivered at `now` and schedule the next one.
    ///
    /// Returns the frame's timestamp. When the loop fell behind, the next
    /// deadline restarts from `now` instead of queuing catch-up frames.
    pub fn mark_frame(&mut self, now: Instant) -> f64 {
        self.next_frame += self.interval;
        if self.next_frame < now {
            self.next_frame = now + self.interval;
        }
        self.timestamp_at(now)
    }
}
