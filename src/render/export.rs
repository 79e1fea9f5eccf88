//! WAV export of rendered buffers.

use std::path::{Path, PathBuf};

use super::{AudioBuffer, QualityProfile, RenderError, Renderer};
use crate::graph::Graph;

/// Write `buffer` as a 16-bit PCM WAV.
pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> Result<(), RenderError> {
    let spec = hound::WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let export_err = |source: hound::Error| RenderError::Export {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(export_err)?;
    for &s in &buffer.samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer.write_sample(v).map_err(export_err)?;
    }
    writer.finalize().map_err(export_err)
}

/// Result of one export directive.
#[derive(Debug)]
pub struct ExportOutcome {
    pub file: String,
    pub line: usize,
    pub path: PathBuf,
    pub result: Result<(), RenderError>,
}

/// Render the graph once per export directive and write each file under
/// `out_dir`. A failing directive does not stop the others.
pub fn render_exports(
    renderer: &dyn Renderer,
    graph: &Graph,
    profile: QualityProfile,
    out_dir: &Path,
) -> Vec<ExportOutcome> {
    graph
        .exports
        .iter()
        .map(|export| {
            let path = out_dir.join(&export.file);
            let result = renderer
                .render(graph, profile)
                .and_then(|buffer| write_wav(&path, &buffer));
            match &result {
                Ok(()) => tracing::info!(file = %path.display(), "exported"),
                Err(e) => tracing::error!(file = %path.display(), line = export.line, error = %e, "export failed"),
            }
            ExportOutcome {
                file: export.file.clone(),
                line: export.line,
                path,
                result,
            }
        })
        .collect()
}
