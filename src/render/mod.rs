//! Renderer: turns a [`Graph`] into audio and writes export files.
//!
//! Rendering is offline: a whole graph is mixed into one interleaved
//! buffer. Sources come in through a [`SampleLoader`] so tests can feed
//! synthetic audio; `beat` nodes are synthesized by [`drums`].

pub mod drums;
pub mod effects;
pub mod export;
pub mod limiter;
pub mod loader;
pub mod offline;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use export::{render_exports, write_wav, ExportOutcome};
pub use limiter::Limiter;
pub use loader::{LoadError, SampleData, SampleLoader, WavLoader};
pub use offline::OfflineRenderer;

use crate::graph::Graph;

/// Longest timeline a render produces, in seconds.
pub const MAX_RENDER_SECONDS: f64 = 3600.0;

/// Which settings to render with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityProfile {
    /// Fast, mono, low sample rate.
    Preview,
    #[default]
    Export,
}

/// Output format of one quality profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSettings {
    pub sample_rate: u32,
    pub channels: u16,
}

impl ProfileSettings {
    pub fn preview() -> Self {
        Self {
            sample_rate: 22_050,
            channels: 1,
        }
    }

    pub fn export() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
        }
    }
}

/// Interleaved output of a render.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn silent(frames: usize, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples: vec![0.0; frames * channels.max(1) as usize],
            channels: channels.max(1),
            sample_rate,
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate.max(1) as f64)
    }

    /// Samples of one channel, de-interleaved.
    pub fn channel(&self, index: u16) -> impl Iterator<Item = f32> + '_ {
        self.samples
            .iter()
            .skip(index as usize)
            .step_by(self.channels.max(1) as usize)
            .copied()
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("node '{node}' (line {line}): {source}")]
    Source {
        node: String,
        line: usize,
        #[source]
        source: LoadError,
    },
    #[error("graph has no node named '{0}'")]
    UnknownNode(String),
    #[error("region '{0}' slices itself")]
    RegionCycle(String),
    #[error("node '{node}' ends at {seconds:.1}s, past the {}s render limit", MAX_RENDER_SECONDS)]
    TooLong { node: String, seconds: f64 },
    #[error("cannot write {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
}

/// Produces audio for a graph.
pub trait Renderer {
    fn render(&self, graph: &Graph, profile: QualityProfile) -> Result<AudioBuffer, RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_defaults() {
        assert_eq!(ProfileSettings::preview().channels, 1);
        assert_eq!(ProfileSettings::preview().sample_rate, 22_050);
        assert_eq!(ProfileSettings::export().channels, 2);
        assert_eq!(ProfileSettings::export().sample_rate, 44_100);
    }

    #[test]
    fn buffer_frames_and_channels() {
        let buf = AudioBuffer {
            samples: vec![1.0, -1.0, 0.5, -0.5],
            channels: 2,
            sample_rate: 4,
        };
        assert_eq!(buf.frames(), 2);
        assert_eq!(buf.duration(), Duration::from_millis(500));
        assert_eq!(buf.channel(1).collect::<Vec<_>>(), vec![-1.0, -0.5]);
    }
}
