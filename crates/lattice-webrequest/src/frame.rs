//! Scheduling ticks.
//!
//! The executor suspends itself once per tick while it samples progress or
//! plays a simulated response. A [`FrameClock`] produces those ticks at a
//! fixed period and reports the real time that passed since the previous one,
//! which is what simulated progress accumulates.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Default tick period, roughly one frame at 60 Hz.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Smallest accepted tick period.
const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

/// Fixed-period tick source measuring the delta between ticks.
#[derive(Debug)]
pub struct FrameClock {
    interval: Interval,
    last: Instant,
}

impl FrameClock {
    /// Create a clock whose first tick fires one period from now.
    pub fn new(period: Duration) -> Self {
        let period = period.max(MIN_FRAME_INTERVAL);
        let start = Instant::now();
        let mut interval = tokio::time::interval_at(start + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            last: start,
        }
    }

    /// The tick period.
    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    /// Suspend until the next tick and return the time elapsed since the
    /// previous one (or since the clock was created).
    pub async fn next_frame(&mut self) -> Duration {
        self.interval.tick().await;
        let now = Instant::now();
        let delta = now.saturating_duration_since(self.last);
        self.last = now;
        delta
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}
