//! Sample loading: WAV decoding to mono plus linear resampling.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur when loading a track source.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("source not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

/// Decodes a `load` path into mono samples.
pub trait SampleLoader: Send + Sync {
    /// `source` is the path exactly as written in the recipe, stem selector
    /// included.
    fn load(&self, source: &str, sample_rate: u32) -> Result<SampleData, LoadError>;
}

/// A mono audio sample buffer at a known sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleData {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleData {
    /// Create from raw mono f32 samples.
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Decode WAV data, converting to mono f32 at `target_sample_rate`.
    ///
    /// Integer and float WAVs are accepted. Multi-channel files are mixed
    /// down by averaging channels.
    pub fn from_wav<R: Read + Seek>(reader: R, target_sample_rate: u32) -> Result<Self, LoadError> {
        let wav = hound::WavReader::new(reader)?;
        let spec = wav.spec();
        let channels = spec.channels.max(1) as usize;

        let raw: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Int => {
                if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                    return Err(LoadError::UnsupportedFormat(format!(
                        "{}-bit integer WAV",
                        spec.bits_per_sample
                    )));
                }
                let max_val = (1u64 << (spec.bits_per_sample - 1)) as f32;
                wav.into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_val))
                    .collect::<Result<_, _>>()?
            }
            hound::SampleFormat::Float => wav.into_samples::<f32>().collect::<Result<_, _>>()?,
        };

        let mono: Vec<f32> = raw
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        let samples = if spec.sample_rate == target_sample_rate {
            mono
        } else {
            resample_linear(&mono, spec.sample_rate, target_sample_rate)
        };

        Ok(Self {
            samples,
            sample_rate: target_sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Reads WAV files relative to a base directory. Stem selectors
/// (`mix.wav#vocals`) are reported as unsupported.
#[derive(Debug, Clone)]
pub struct WavLoader {
    base_dir: PathBuf,
}

impl WavLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn resolve(&self, source: &str) -> PathBuf {
        let path = Path::new(source);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

impl SampleLoader for WavLoader {
    fn load(&self, source: &str, sample_rate: u32) -> Result<SampleData, LoadError> {
        if let Some((_, stem)) = source.split_once('#') {
            return Err(LoadError::UnsupportedFormat(format!(
                "stem selector '#{stem}' needs a stem separator"
            )));
        }
        let path = self.resolve(source);
        if !path.is_file() {
            return Err(LoadError::SourceNotFound(path));
        }
        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
        if !is_wav {
            return Err(LoadError::UnsupportedFormat(format!(
                "{} is not a WAV file",
                path.display()
            )));
        }
        let file = File::open(&path).map_err(|e| LoadError::Wav(hound::Error::IoError(e)))?;
        let data = SampleData::from_wav(BufReader::new(file), sample_rate)?;
        tracing::debug!(path = %path.display(), frames = data.len(), "loaded source");
        Ok(data)
    }
}

/// Linear-interpolation resampling from `source_rate` to `target_rate`.
pub(crate) fn resample_linear(input: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    resample_by_ratio(input, source_rate as f64 / target_rate as f64)
}

/// Read `input` at `ratio` source samples per output sample.
pub(crate) fn resample_by_ratio(input: &[f32], ratio: f64) -> Vec<f32> {
    if input.is_empty() {
        return Vec::new();
    }
    if input.len() == 1 || !(ratio.is_finite() && ratio > 0.0) {
        return input.to_vec();
    }

    let output_len = (input.len() as f64 / ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx + 1 < input.len() {
            input[idx] * (1.0 - frac) + input[idx + 1] * frac
        } else {
            input[idx.min(input.len() - 1)]
        };
        output.push(sample);
    }

    output
}
