//! Musical position measured in integer ticks.
//!
//! Uses 960 PPQN so bar arithmetic on the playback clock never accumulates
//! floating-point error. Conversion to seconds happens only at the edges.

use std::cmp::Ordering;
use std::ops::{Add, Sub};

/// Ticks per beat (quarter note).
pub const TICKS_PER_BEAT: u64 = 960;

/// Fixed 4/4 meter.
pub const BEATS_PER_BAR: u32 = 4;

/// Ticks in one bar.
pub const TICKS_PER_BAR: u64 = BEATS_PER_BAR as u64 * TICKS_PER_BEAT;

/// A position on the playback timeline.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct Beat {
    ticks: u64,
}

impl Beat {
    /// The start of the timeline.
    pub const ZERO: Beat = Beat { ticks: 0 };

    pub fn from_ticks(ticks: u64) -> Self {
        Self { ticks }
    }

    /// Whole beats.
    pub fn from_beats(beats: u32) -> Self {
        Self {
            ticks: beats as u64 * TICKS_PER_BEAT,
        }
    }

    /// Whole bars.
    pub fn from_bars(bars: u32) -> Self {
        Self {
            ticks: bars as u64 * TICKS_PER_BAR,
        }
    }

    /// Fractional bars, e.g. `3.5` is the middle of the fourth bar.
    pub fn from_bars_f64(bars: f64) -> Self {
        Self {
            ticks: (bars.max(0.0) * TICKS_PER_BAR as f64).round() as u64,
        }
    }

    pub fn ticks(self) -> u64 {
        self.ticks
    }

    pub fn as_beats_f64(self) -> f64 {
        self.ticks as f64 / TICKS_PER_BEAT as f64
    }

    pub fn as_bars_f64(self) -> f64 {
        self.ticks as f64 / TICKS_PER_BAR as f64
    }

    /// Zero-based index of the bar this position falls in.
    pub fn bar_index(self) -> u64 {
        self.ticks / TICKS_PER_BAR
    }

    /// Absolute time at the given tempo.
    pub fn to_seconds(self, bpm: f64) -> f64 {
        self.as_beats_f64() * 60.0 / bpm
    }
}

impl Ord for Beat {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ticks.cmp(&other.ticks)
    }
}

impl PartialOrd for Beat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add for Beat {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            ticks: self.ticks + rhs.ticks,
        }
    }
}

impl Sub for Beat {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            ticks: self.ticks.saturating_sub(rhs.ticks),
        }
    }
}
