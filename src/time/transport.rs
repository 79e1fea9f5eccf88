//! Playback clock: advances musical position by audio frames without drift.
//!
//! A fractional tick remainder carries over between advances so that
//! rendering in odd-sized blocks lands on the same position as rendering
//! in one go.

use super::beat::{Beat, TICKS_PER_BEAT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Playing,
}

/// The clock of the currently playing timeline.
#[derive(Debug, Clone)]
pub struct Transport {
    bpm: f64,
    sample_rate: u32,
    state: PlayState,
    position_ticks: u64,
    tick_remainder: f64,
}

impl Transport {
    /// A stopped transport at position zero. A zero sample rate is taken
    /// as one frame per second.
    pub fn new(bpm: f64, sample_rate: u32) -> Self {
        Self {
            bpm,
            sample_rate: sample_rate.max(1),
            state: PlayState::Stopped,
            position_ticks: 0,
            tick_remainder: 0.0,
        }
    }

    pub fn play(&mut self) {
        self.state = PlayState::Playing;
    }

    pub fn stop(&mut self) {
        self.state = PlayState::Stopped;
    }

    /// Move back to position zero without changing the play state.
    pub fn rewind(&mut self) {
        self.seek(Beat::ZERO);
    }

    /// Jump to an absolute position.
    pub fn seek(&mut self, pos: Beat) {
        self.position_ticks = pos.ticks();
        self.tick_remainder = 0.0;
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    pub fn position(&self) -> Beat {
        Beat::from_ticks(self.position_ticks)
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Change tempo; applies from the next advance onward.
    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = bpm;
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames spanned by one bar at the current tempo.
    pub fn frames_per_bar(&self) -> f64 {
        Beat::from_bars(1).to_seconds(self.bpm) * self.sample_rate as f64
    }

    /// Advance by `num_frames` and return the `[from, to)` range covered,
    /// or `None` while stopped.
    pub fn advance_by_frames(&mut self, num_frames: u32) -> Option<(Beat, Beat)> {
        if self.state == PlayState::Stopped {
            return None;
        }

        let from = self.position();
        let ticks = (num_frames as f64 / self.sample_rate as f64)
            * (self.bpm / 60.0)
            * TICKS_PER_BEAT as f64;

        let total = self.tick_remainder + ticks;
        let whole = total.floor() as u64;
        self.tick_remainder = total - whole as f64;
        self.position_ticks += whole;

        Some((from, self.position()))
    }
}
