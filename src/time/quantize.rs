//! Bar quantizer: decides where the bar boundaries of the playing timeline are.

use super::beat::{Beat, BEATS_PER_BAR, TICKS_PER_BEAT};

/// Bar-boundary arithmetic for a fixed meter.
#[derive(Debug, Clone, Copy)]
pub struct BarQuantizer {
    beats_per_bar: u32,
}

impl BarQuantizer {
    pub fn new(beats_per_bar: u32) -> Self {
        Self {
            beats_per_bar: beats_per_bar.max(1),
        }
    }

    fn ticks_per_bar(&self) -> u64 {
        self.beats_per_bar as u64 * TICKS_PER_BEAT
    }

    /// Zero-based bar number containing `pos`.
    pub fn bar_number(&self, pos: Beat) -> u64 {
        pos.ticks() / self.ticks_per_bar()
    }

    /// The first bar boundary strictly after `pos`.
    pub fn next_bar_boundary(&self, pos: Beat) -> Beat {
        Beat::from_ticks((self.bar_number(pos) + 1) * self.ticks_per_bar())
    }

    pub fn is_on_bar_boundary(&self, pos: Beat) -> bool {
        pos.ticks() % self.ticks_per_bar() == 0
    }

    /// Whether playback moving from `from` to `to` crossed the start of a bar.
    ///
    /// The range is half-open on the left: landing exactly on a boundary
    /// counts as crossing it, starting on one does not.
    pub fn crosses_boundary(&self, from: Beat, to: Beat) -> bool {
        to > from && self.bar_number(to) > self.bar_number(from)
    }
}

impl Default for BarQuantizer {
    fn default() -> Self {
        Self::new(BEATS_PER_BAR)
    }
}
