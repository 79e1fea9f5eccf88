//! Time model: bars/beats ↔ absolute seconds, plus the playback clock.
//!
//! The conversion functions are pure and fixed to 4/4 meter: one bar is
//! [`BEATS_PER_BAR`] beats and one beat lasts `60 / tempo` seconds. Bar and
//! beat values are zero-based offsets from the start of the timeline, so
//! `bar(0)` is 0 s and `bar(1)` is the start of the second bar.
//!
//! Playback position uses integer ticks ([`Beat`]) so that bar boundary
//! checks stay exact over long sessions.

pub mod beat;
pub mod quantize;
pub mod transport;

pub use beat::{Beat, BEATS_PER_BAR, TICKS_PER_BEAT};
pub use quantize::BarQuantizer;
pub use transport::{PlayState, Transport};

use thiserror::Error;

/// Tempo used when a recipe never issues `set(bpm=...)`.
pub const DEFAULT_BPM: f64 = 120.0;

/// A time value outside the domain of the conversion functions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimeError {
    #[error("tempo must be a positive number of beats per minute, got {0}")]
    InvalidTempo(f64),
    #[error("{what} must be a non-negative number, got {value}")]
    Negative { what: &'static str, value: f64 },
}

/// Unit of a time offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Seconds,
    Millis,
    Bars,
    Beats,
}

impl TimeUnit {
    /// The unit's suffix or call name as written in a recipe.
    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Millis => "ms",
            TimeUnit::Bars => "bar",
            TimeUnit::Beats => "beat",
        }
    }
}

/// Duration of one beat in seconds.
pub fn beat_seconds(tempo: f64) -> Result<f64, TimeError> {
    check_tempo(tempo)?;
    Ok(60.0 / tempo)
}

/// Duration of one bar in seconds.
pub fn bar_seconds(tempo: f64) -> Result<f64, TimeError> {
    Ok(beat_seconds(tempo)? * BEATS_PER_BAR as f64)
}

/// Convert a bar/beat offset to absolute seconds.
///
/// `bar` and `beat` are both offsets from the timeline origin and may be
/// fractional; `beat` is not limited to the range of a single bar.
pub fn bars_to_seconds(bar: f64, beat: f64, tempo: f64) -> Result<f64, TimeError> {
    check_non_negative("bar", bar)?;
    check_non_negative("beat", beat)?;
    let beats = bar * BEATS_PER_BAR as f64 + beat;
    Ok(beats * beat_seconds(tempo)?)
}

/// Inverse of [`bars_to_seconds`]: whole bars plus the remaining beats.
pub fn seconds_to_bars(seconds: f64, tempo: f64) -> Result<(u64, f64), TimeError> {
    check_non_negative("seconds", seconds)?;
    let total_beats = seconds / beat_seconds(tempo)?;
    let bars = (total_beats / BEATS_PER_BAR as f64).floor();
    let beat = total_beats - bars * BEATS_PER_BAR as f64;
    Ok((bars as u64, beat))
}

/// Convert an offset in any [`TimeUnit`] to seconds.
pub fn offset_to_seconds(value: f64, unit: TimeUnit, tempo: f64) -> Result<f64, TimeError> {
    match unit {
        TimeUnit::Seconds => {
            check_non_negative("seconds", value)?;
            Ok(value)
        }
        TimeUnit::Millis => {
            check_non_negative("milliseconds", value)?;
            Ok(value / 1000.0)
        }
        TimeUnit::Bars => bars_to_seconds(value, 0.0, tempo),
        TimeUnit::Beats => bars_to_seconds(0.0, value, tempo),
    }
}

fn check_tempo(tempo: f64) -> Result<(), TimeError> {
    if tempo.is_finite() && tempo > 0.0 {
        Ok(())
    } else {
        Err(TimeError::InvalidTempo(tempo))
    }
}

fn check_non_negative(what: &'static str, value: f64) -> Result<(), TimeError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(TimeError::Negative { what, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn one_bar_at_120_bpm_is_two_seconds() {
        assert_approx_eq!(bars_to_seconds(1.0, 0.0, 120.0).unwrap(), 2.0);
    }

    #[test]
    fn bar_and_beat_combine() {
        // 90 BPM: beat = 0.666.., bar 2 beat 1 = 9 beats = 6s
        assert_approx_eq!(bars_to_seconds(2.0, 1.0, 90.0).unwrap(), 6.0);
    }

    #[test]
    fn bars_are_monotonic_in_n() {
        for &tempo in &[1.0, 60.0, 84.0, 90.0, 133.3, 200.0, 999.0] {
            let mut prev = -1.0;
            for n in 0..64 {
                let s = bars_to_seconds(n as f64, 0.0, tempo).unwrap();
                assert!(s > prev, "not increasing at bar {n}, tempo {tempo}");
                prev = s;
            }
        }
    }

    #[test]
    fn rejects_bad_tempo() {
        assert_eq!(
            bars_to_seconds(1.0, 0.0, 0.0),
            Err(TimeError::InvalidTempo(0.0))
        );
        assert!(bars_to_seconds(1.0, 0.0, -10.0).is_err());
        assert!(bars_to_seconds(1.0, 0.0, f64::NAN).is_err());
    }

    #[test]
    fn rejects_negative_index() {
        assert!(matches!(
            bars_to_seconds(-1.0, 0.0, 120.0),
            Err(TimeError::Negative { what: "bar", .. })
        ));
        assert!(matches!(
            bars_to_seconds(0.0, -0.5, 120.0),
            Err(TimeError::Negative { what: "beat", .. })
        ));
    }

    #[test]
    fn seconds_to_bars_inverts() {
        let s = bars_to_seconds(3.0, 2.5, 84.0).unwrap();
        let (bar, beat) = seconds_to_bars(s, 84.0).unwrap();
        assert_eq!(bar, 3);
        assert_approx_eq!(beat, 2.5);
    }

    #[test]
    fn offset_units() {
        assert_approx_eq!(offset_to_seconds(1.5, TimeUnit::Seconds, 120.0).unwrap(), 1.5);
        assert_approx_eq!(offset_to_seconds(250.0, TimeUnit::Millis, 120.0).unwrap(), 0.25);
        assert_approx_eq!(offset_to_seconds(2.0, TimeUnit::Bars, 120.0).unwrap(), 4.0);
        assert_approx_eq!(offset_to_seconds(3.0, TimeUnit::Beats, 60.0).unwrap(), 3.0);
    }

    #[test]
    fn seconds_ignore_tempo() {
        // Absolute units never consult the tempo, even an invalid one.
        assert!(offset_to_seconds(1.0, TimeUnit::Seconds, 0.0).is_ok());
        assert!(offset_to_seconds(1.0, TimeUnit::Beats, 0.0).is_err());
    }

    #[test]
    fn region_at_90_bpm() {
        let start = offset_to_seconds(1.0, TimeUnit::Bars, 90.0).unwrap();
        let end = offset_to_seconds(9.0, TimeUnit::Bars, 90.0).unwrap();
        assert_approx_eq!(start, 4.0 * 60.0 / 90.0);
        assert_approx_eq!(end, 24.0);
    }
}
