//! Recipe + WAV sources on disk → exported WAV files.

use std::path::Path;

use synthtax::dsl::Compiler;
use synthtax::render::{
    render_exports, OfflineRenderer, ProfileSettings, QualityProfile, RenderError, Renderer,
    WavLoader,
};

const SR: u32 = 8_000;

fn write_tone(path: &Path, seconds: f32, amplitude: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SR,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let n = (seconds * SR as f32) as usize;
    for i in 0..n {
        let t = i as f32 / SR as f32;
        let s = (2.0 * std::f32::consts::PI * 220.0 * t).sin() * amplitude;
        writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

fn renderer(dir: &Path) -> OfflineRenderer {
    let settings = |channels| ProfileSettings {
        sample_rate: SR,
        channels,
    };
    OfflineRenderer::new(WavLoader::new(dir)).with_profiles(settings(1), settings(2))
}

#[test]
fn renders_every_export() {
    let dir = tempfile::tempdir().unwrap();
    write_tone(&dir.path().join("kit.wav"), 0.5, 0.5);
    write_tone(&dir.path().join("pad.wav"), 4.0, 0.3);

    let graph = Compiler::compile(
        "set(bpm=120)\nload drums from \"kit.wav\"\nload pad from \"pad.wav\"\nloop(drums, bars=1)\nregion tail = slice(pad, start=1s, end=3s)\nmute(pad)\nplay(tail, at=bar(1))\nexport(\"mix.wav\")\nexport(\"alt.wav\")",
    )
    .unwrap();

    let outcomes = render_exports(&renderer(dir.path()), &graph, QualityProfile::Export, dir.path());
    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        assert!(outcome.result.is_ok(), "{:?}", outcome.result);
        let reader = hound::WavReader::open(&outcome.path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, SR);
        // drums fill bar 0 (2 s), the 2 s tail fills bar 1.
        assert_eq!(reader.duration(), 4 * SR);
    }
}

#[test]
fn preview_is_mono() {
    let dir = tempfile::tempdir().unwrap();
    write_tone(&dir.path().join("kit.wav"), 0.25, 0.5);
    let graph = Compiler::compile("load drums from \"kit.wav\"").unwrap();
    let buffer = renderer(dir.path())
        .render(&graph, QualityProfile::Preview)
        .unwrap();
    assert_eq!(buffer.channels, 1);
    assert_eq!(buffer.frames(), (0.25 * SR as f32) as usize);
    assert!(buffer.samples.iter().all(|s| s.abs() <= 0.95));
}

#[test]
fn missing_source_fails_only_its_render() {
    let dir = tempfile::tempdir().unwrap();
    let graph = Compiler::compile("load drums from \"nope.wav\"\nexport(\"mix.wav\")").unwrap();
    let outcomes = render_exports(&renderer(dir.path()), &graph, QualityProfile::Export, dir.path());
    match &outcomes[0].result {
        Err(RenderError::Source { node, line, .. }) => {
            assert_eq!(node, "drums");
            assert_eq!(*line, 1);
        }
        other => panic!("expected a source error, got {other:?}"),
    }
    assert!(!dir.path().join("mix.wav").exists());
}

#[test]
fn beat_exports_without_sources() {
    let dir = tempfile::tempdir().unwrap();
    let graph = Compiler::compile(
        "set(bpm=96)\nbeat(drums, style=\"breakbeat\", bars=3)\nexport(\"beat.wav\")",
    )
    .unwrap();

    let outcomes = render_exports(&renderer(dir.path()), &graph, QualityProfile::Preview, dir.path());
    assert!(outcomes[0].result.is_ok(), "{:?}", outcomes[0].result);
    let reader = hound::WavReader::open(&outcomes[0].path).unwrap();
    // 96 bpm: 2.5 s per bar.
    assert_eq!(reader.duration(), (7.5 * SR as f64) as u32);
}
