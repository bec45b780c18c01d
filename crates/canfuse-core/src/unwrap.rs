//! Multi-turn position tracking.
//!
//! Both actuator families report a bounded position. [`UnwrapState`] counts
//! revolutions across consecutive samples so the stored position is
//! continuous. Each update moves the count by at most one, so the bus must be
//! sampled faster than half a revolution per sample at top speed.

use std::f64::consts::PI;

use serde::Serialize;

/// Raw counts per revolution of the shared-frame position counter.
pub const COUNTS_PER_REV: i64 = 8191;

/// Raw counter jump treated as a wrap (half the counter range).
pub const COUNT_WRAP_THRESHOLD: i32 = 4096;

/// Physical span of the addressed family's position range (-4π..4π).
pub const CONTINUOUS_SPAN: f64 = 8.0 * PI;

/// Physical jump treated as a wrap (half the span).
pub const CONTINUOUS_WRAP_THRESHOLD: f64 = 4.0 * PI;

/// Per-actuator revolution bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnwrapState {
    /// Previous raw counter reading (shared-frame family only).
    pub raw_last: i32,
    /// Signed number of detected wraps.
    pub revolution_count: i64,
    /// Samples seen so far; zero means the next sample is the baseline.
    pub sample_seq: u64,
}

impl UnwrapState {
    /// Track a 13-bit counter reading and return the unwrapped count.
    ///
    /// A forward jump of more than half a revolution means the counter wrapped
    /// backwards through zero, and vice versa.
    pub fn track_counter(&mut self, raw: u16) -> i64 {
        let raw = i32::from(raw);
        if self.sample_seq != 0 {
            let delta = raw - self.raw_last;
            if delta > COUNT_WRAP_THRESHOLD {
                self.revolution_count -= 1;
            } else if delta < -COUNT_WRAP_THRESHOLD {
                self.revolution_count += 1;
            }
        }
        self.sample_seq += 1;
        self.raw_last = raw;
        i64::from(raw) + COUNTS_PER_REV * self.revolution_count
    }

    /// Track an already scaled bounded position against the previous continuous
    /// position and return the new continuous position.
    pub fn track_continuous(&mut self, bounded: f64, previous: f64) -> f64 {
        if self.sample_seq != 0 {
            let candidate = self.continuous(bounded);
            if candidate - previous > CONTINUOUS_WRAP_THRESHOLD {
                self.revolution_count -= 1;
            } else if candidate - previous < -CONTINUOUS_WRAP_THRESHOLD {
                self.revolution_count += 1;
            }
        }
        self.sample_seq += 1;
        self.continuous(bounded)
    }

    fn continuous(&self, bounded: f64) -> f64 {
        bounded + self.revolution_count as f64 * CONTINUOUS_SPAN
    }
}
