//! Live session: keeps the playing graph and swaps in edits on bar
//! boundaries.
//!
//! Two slots: `active` is what plays, `pending` is the latest validated
//! candidate waiting for the next bar. A failed compile touches neither.
//! Graphs are handed out as `Arc<Graph>` so readers never hold the lock
//! while they render.

pub mod driver;
pub mod shared;

use std::sync::Arc;

pub use driver::LiveDriver;
pub use shared::{SharedSession, Ticket};

use crate::dsl::{CompileError, Compiler, RecipeFormat};
use crate::graph::{Graph, GraphDiff};
use crate::time::{BarQuantizer, Beat, PlayState, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing has compiled yet.
    Idle,
    Active,
    /// A candidate waits for the next bar boundary.
    PendingSwap,
}

/// What happened to a compile result handed to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Install {
    /// Became the active graph immediately (the session was idle).
    Activated,
    /// Staged for the next bar boundary.
    Staged,
    /// Compile failed; recorded as the last error.
    Rejected,
    /// A newer result was already installed; discarded.
    Stale,
}

/// A swap that happened during a boundary check.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapReport {
    /// Zero-based number of the bar that just started.
    pub bar: u64,
    pub position: Beat,
    pub diff: GraphDiff,
}

#[derive(Debug)]
pub struct LiveSession {
    active: Option<Arc<Graph>>,
    pending: Option<Arc<Graph>>,
    last_error: Option<CompileError>,
    transport: Transport,
    quantizer: BarQuantizer,
}

impl LiveSession {
    /// An idle session whose clock runs at `sample_rate` frames per second.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            active: None,
            pending: None,
            last_error: None,
            transport: Transport::new(crate::time::DEFAULT_BPM, sample_rate),
            quantizer: BarQuantizer::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        match (&self.active, &self.pending) {
            (None, _) => SessionState::Idle,
            (Some(_), None) => SessionState::Active,
            (Some(_), Some(_)) => SessionState::PendingSwap,
        }
    }

    /// Compile `source` and install the result.
    pub fn submit(&mut self, source: &str, format: RecipeFormat) -> Install {
        self.install(Compiler::compile_as(source, format))
    }

    /// Install a finished compile.
    pub fn install(&mut self, result: Result<Graph, CompileError>) -> Install {
        match result {
            Err(e) => {
                tracing::warn!(error = %e, state = ?self.state(), "compile rejected, keeping current graph");
                self.last_error = Some(e);
                Install::Rejected
            }
            Ok(graph) => {
                self.last_error = None;
                let graph = Arc::new(graph);
                if self.active.is_none() {
                    tracing::info!(
                        nodes = graph.nodes.len(),
                        bpm = graph.globals.bpm,
                        "graph active"
                    );
                    self.transport.set_bpm(graph.globals.bpm);
                    self.active = Some(graph);
                    Install::Activated
                } else {
                    if self.pending.is_some() {
                        tracing::debug!("replacing staged candidate");
                    }
                    tracing::info!(
                        next_bar = self.quantizer.bar_number(self.transport.position()) + 1,
                        "candidate staged"
                    );
                    self.pending = Some(graph);
                    Install::Staged
                }
            }
        }
    }

    /// Boundary check for playback that moved from `from` to `to`.
    /// Swaps the candidate in when a bar start was crossed. At most one
    /// swap per call.
    pub fn on_advance(&mut self, from: Beat, to: Beat) -> Option<SwapReport> {
        if !self.quantizer.crosses_boundary(from, to) {
            return None;
        }
        let next = self.pending.take()?;
        let diff = match &self.active {
            Some(old) => GraphDiff::between(old, &next),
            None => GraphDiff::default(),
        };
        let bar = self.quantizer.bar_number(to);

        self.transport.set_bpm(next.globals.bpm);
        self.active = Some(next);

        tracing::info!(bar, changes = diff.changes.len(), "swapped graph");
        for line in diff.summaries() {
            tracing::info!("  {line}");
        }

        Some(SwapReport {
            bar,
            position: to,
            diff,
        })
    }

    /// Advance the clock by `frames` and run the boundary check.
    pub fn tick(&mut self, frames: u32) -> Option<SwapReport> {
        let (from, to) = self.transport.advance_by_frames(frames)?;
        self.on_advance(from, to)
    }

    pub fn play(&mut self) {
        self.transport.play();
    }

    /// Halt the clock. Slots are untouched; a staged candidate keeps waiting.
    pub fn stop(&mut self) {
        self.transport.stop();
    }

    pub fn rewind(&mut self) {
        self.transport.rewind();
    }

    pub fn play_state(&self) -> PlayState {
        self.transport.state()
    }

    pub fn position(&self) -> Beat {
        self.transport.position()
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// The graph currently playing.
    pub fn snapshot(&self) -> Option<Arc<Graph>> {
        self.active.clone()
    }

    pub fn pending(&self) -> Option<Arc<Graph>> {
        self.pending.clone()
    }

    /// The most recent compile error, until the next successful compile.
    pub fn last_error(&self) -> Option<&CompileError> {
        self.last_error.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::ErrorKind;

    const GOOD: &str = "set(bpm=120)\nload a from \"a.wav\"";
    const EDIT: &str = "set(bpm=90)\nload a from \"a.wav\"\ngain(a, -3dB)";

    fn active_session() -> LiveSession {
        let mut s = LiveSession::new(48_000);
        assert_eq!(s.submit(GOOD, RecipeFormat::Dsl), Install::Activated);
        s
    }

    fn beats(b: f64) -> Beat {
        Beat::from_ticks((b * crate::time::TICKS_PER_BEAT as f64) as u64)
    }

    #[test]
    fn zero_sample_rate_still_ticks() {
        let mut s = LiveSession::new(0);
        assert_eq!(s.submit(GOOD, RecipeFormat::Dsl), Install::Activated);
        s.play();
        s.tick(512);
        s.tick(512);
        assert_eq!(s.transport().sample_rate(), 1);
        assert_eq!(s.position(), Beat::from_beats(2048));
    }

    #[test]
    fn starts_idle() {
        let s = LiveSession::new(48_000);
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.snapshot().is_none());
        assert_eq!(s.play_state(), PlayState::Stopped);
    }

    #[test]
    fn first_compile_activates_immediately() {
        let s = active_session();
        assert_eq!(s.state(), SessionState::Active);
        assert_eq!(s.transport().bpm(), 120.0);
    }

    #[test]
    fn failed_compile_while_idle_stays_idle() {
        let mut s = LiveSession::new(48_000);
        assert_eq!(s.submit("gain(synth, -3dB)", RecipeFormat::Dsl), Install::Rejected);
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(s.last_error().unwrap().kind, ErrorKind::UnknownReference);
    }

    #[test]
    fn edit_while_active_is_staged() {
        let mut s = active_session();
        assert_eq!(s.submit(EDIT, RecipeFormat::Dsl), Install::Staged);
        assert_eq!(s.state(), SessionState::PendingSwap);
        assert_eq!(s.snapshot().unwrap().globals.bpm, 120.0);
    }

    #[test]
    fn swap_waits_for_the_bar() {
        let mut s = active_session();
        s.submit(EDIT, RecipeFormat::Dsl);

        // Staged at bar 3.5; moving within bar 3 does nothing.
        assert!(s.on_advance(beats(14.0), beats(15.5)).is_none());
        assert_eq!(s.state(), SessionState::PendingSwap);

        let report = s.on_advance(beats(15.5), beats(16.0)).unwrap();
        assert_eq!(report.bar, 4);
        assert_eq!(s.state(), SessionState::Active);
        assert_eq!(s.snapshot().unwrap().globals.bpm, 90.0);
        assert_eq!(s.transport().bpm(), 90.0);
        assert!(report
            .diff
            .summaries()
            .contains(&"tempo 120 → 90 bpm".to_string()));
    }

    #[test]
    fn one_swap_per_check() {
        let mut s = active_session();
        s.submit(EDIT, RecipeFormat::Dsl);
        assert!(s.on_advance(beats(3.0), beats(9.0)).is_some());
        assert!(s.on_advance(beats(9.0), beats(13.0)).is_none());
    }

    #[test]
    fn failed_compile_keeps_active_identity() {
        let mut s = active_session();
        let before = s.snapshot().unwrap();
        assert_eq!(s.submit("gain(a, 3xyz)", RecipeFormat::Dsl), Install::Rejected);
        assert_eq!(s.state(), SessionState::Active);
        assert!(Arc::ptr_eq(&before, &s.snapshot().unwrap()));
        assert!(s.pending().is_none());
        assert_eq!(s.last_error().unwrap().kind, ErrorKind::InvalidLiteral);
    }

    #[test]
    fn failed_compile_keeps_pending_candidate() {
        let mut s = active_session();
        s.submit(EDIT, RecipeFormat::Dsl);
        let staged = s.pending().unwrap();
        s.submit("nope(", RecipeFormat::Dsl);
        assert_eq!(s.state(), SessionState::PendingSwap);
        assert!(Arc::ptr_eq(&staged, &s.pending().unwrap()));
    }

    #[test]
    fn last_candidate_wins() {
        let mut s = active_session();
        s.submit(EDIT, RecipeFormat::Dsl);
        s.submit("set(bpm=140)\nload a from \"a.wav\"", RecipeFormat::Dsl);
        s.on_advance(beats(3.0), beats(4.0));
        assert_eq!(s.snapshot().unwrap().globals.bpm, 140.0);
    }

    #[test]
    fn error_cleared_by_next_success() {
        let mut s = active_session();
        s.submit("bad(", RecipeFormat::Dsl);
        assert!(s.last_error().is_some());
        s.submit(EDIT, RecipeFormat::Dsl);
        assert!(s.last_error().is_none());
    }

    #[test]
    fn tick_drives_the_swap() {
        let mut s = active_session();
        s.play();
        // 120 bpm at 48 kHz: one bar is 96 000 frames.
        s.tick(48_000);
        s.submit(EDIT, RecipeFormat::Dsl);
        assert!(s.tick(47_000).is_none());
        assert_eq!(s.state(), SessionState::PendingSwap);
        assert!(s.tick(2_000).is_some());
        assert_eq!(s.state(), SessionState::Active);
    }

    #[test]
    fn stopped_clock_never_swaps() {
        let mut s = active_session();
        s.submit(EDIT, RecipeFormat::Dsl);
        assert!(s.tick(1_000_000).is_none());
        assert_eq!(s.state(), SessionState::PendingSwap);
    }

    #[test]
    fn rewind_and_stop() {
        let mut s = active_session();
        s.play();
        s.tick(100_000);
        assert!(s.position() > Beat::ZERO);
        s.stop();
        s.rewind();
        assert_eq!(s.position(), Beat::ZERO);
        assert_eq!(s.play_state(), PlayState::Stopped);
        assert_eq!(s.state(), SessionState::Active);
    }
}
