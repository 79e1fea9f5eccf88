//! Offline mixdown of a whole graph.

use std::collections::HashMap;

use super::drums::render_beat;
use super::effects::{self, Voice};
use super::{
    AudioBuffer, Limiter, ProfileSettings, QualityProfile, RenderError, Renderer, SampleLoader,
    MAX_RENDER_SECONDS,
};
use crate::graph::{Graph, Node, NodeKind};

/// Loads every audible node, runs its chain and sums the results at their
/// placements, then limits the mix.
pub struct OfflineRenderer {
    loader: Box<dyn SampleLoader>,
    preview: ProfileSettings,
    export: ProfileSettings,
    limiter: Limiter,
}

impl OfflineRenderer {
    pub fn new(loader: impl SampleLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            preview: ProfileSettings::preview(),
            export: ProfileSettings::export(),
            limiter: Limiter::default(),
        }
    }

    pub fn with_profiles(mut self, preview: ProfileSettings, export: ProfileSettings) -> Self {
        self.preview = preview;
        self.export = export;
        self
    }

    pub fn with_limiter(mut self, limiter: Limiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn settings(&self, profile: QualityProfile) -> ProfileSettings {
        match profile {
            QualityProfile::Preview => self.preview,
            QualityProfile::Export => self.export,
        }
    }

    /// Raw audio a node starts from, before its own chain. Regions slice the
    /// source audio of the node they were cut from; beats are synthesized.
    fn source_audio(
        &self,
        graph: &Graph,
        node: &Node,
        sample_rate: u32,
        cache: &mut HashMap<String, Vec<f32>>,
        depth: usize,
    ) -> Result<Vec<f32>, RenderError> {
        match &node.kind {
            NodeKind::Track { source } => {
                if let Some(samples) = cache.get(source) {
                    return Ok(samples.clone());
                }
                let samples = self
                    .loader
                    .load(source, sample_rate)
                    .map_err(|source| RenderError::Source {
                        node: node.name.clone(),
                        line: node.line,
                        source,
                    })?
                    .into_samples();
                cache.insert(source.clone(), samples.clone());
                Ok(samples)
            }
            NodeKind::Beat {
                style,
                bars,
                seconds,
            } => {
                if *seconds > MAX_RENDER_SECONDS {
                    return Err(RenderError::TooLong {
                        node: node.name.clone(),
                        seconds: *seconds,
                    });
                }
                let bar = seconds / (*bars).max(1) as f64;
                Ok(render_beat(*style, *bars, bar, sample_rate))
            }
            NodeKind::Region { of, start, end } => {
                if depth > graph.nodes.len() {
                    return Err(RenderError::RegionCycle(node.name.clone()));
                }
                let parent = graph
                    .node(of)
                    .ok_or_else(|| RenderError::UnknownNode(of.clone()))?;
                let audio = self.source_audio(graph, parent, sample_rate, cache, depth + 1)?;
                let from = seconds_to_frames(*start, sample_rate);
                let to = seconds_to_frames(*end, sample_rate).max(from);
                let mut slice: Vec<f32> = audio.iter().skip(from).take(to - from).copied().collect();
                slice.resize(to - from, 0.0);
                Ok(slice)
            }
        }
    }
}

impl Renderer for OfflineRenderer {
    fn render(&self, graph: &Graph, profile: QualityProfile) -> Result<AudioBuffer, RenderError> {
        let settings = self.settings(profile);
        let sample_rate = settings.sample_rate;
        let mut cache = HashMap::new();

        let mut voices = Vec::new();
        for node in graph.nodes.iter().filter(|n| graph.is_audible(n)) {
            let end = node.placement + node.duration().unwrap_or(0.0);
            if end.is_nan() || end > MAX_RENDER_SECONDS {
                return Err(RenderError::TooLong {
                    node: node.name.clone(),
                    seconds: end,
                });
            }
            let samples = self.source_audio(graph, node, sample_rate, &mut cache, 0)?;
            let mut voice = Voice::new(samples, sample_rate);
            for effect in node.effects() {
                effects::apply(&mut voice, effect);
            }
            voices.push((seconds_to_frames(node.placement, sample_rate), voice));
        }

        let frames = voices
            .iter()
            .map(|(at, v)| at + v.samples.len())
            .max()
            .unwrap_or(0);
        let mut out = AudioBuffer::silent(frames, settings.channels, sample_rate);
        let channels = out.channels as usize;

        for (at, voice) in &voices {
            let (left, right) = if channels == 1 {
                (1.0, 1.0)
            } else {
                voice.pan_gains()
            };
            for (i, &s) in voice.samples.iter().enumerate() {
                let frame = (at + i) * channels;
                out.samples[frame] += s * left;
                if channels > 1 {
                    out.samples[frame + 1] += s * right;
                }
            }
        }

        let clipped = self.limiter.process_block(&mut out.samples);
        tracing::debug!(
            ?profile,
            voices = voices.len(),
            frames,
            clipped,
            "rendered graph"
        );
        Ok(out)
    }
}

fn seconds_to_frames(seconds: f64, sample_rate: u32) -> usize {
    (seconds * sample_rate as f64).round().max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::Compiler;
    use crate::render::{LoadError, SampleData};
    use assert_approx_eq::assert_approx_eq;

    const SR: u32 = 10;

    /// Serves fixed buffers by source name.
    struct MapLoader(HashMap<String, Vec<f32>>);

    impl MapLoader {
        fn with(entries: &[(&str, Vec<f32>)]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            )
        }
    }

    impl SampleLoader for MapLoader {
        fn load(&self, source: &str, sample_rate: u32) -> Result<SampleData, LoadError> {
            self.0
                .get(source)
                .map(|s| SampleData::from_mono(s.clone(), sample_rate))
                .ok_or_else(|| LoadError::SourceNotFound(source.into()))
        }
    }

    fn renderer(entries: &[(&str, Vec<f32>)]) -> OfflineRenderer {
        let settings = ProfileSettings {
            sample_rate: SR,
            channels: 1,
        };
        let stereo = ProfileSettings {
            sample_rate: SR,
            channels: 2,
        };
        OfflineRenderer::new(MapLoader::with(entries)).with_profiles(settings, stereo)
    }

    fn render(src: &str, r: &OfflineRenderer, profile: QualityProfile) -> AudioBuffer {
        r.render(&Compiler::compile(src).unwrap(), profile).unwrap()
    }

    #[test]
    fn empty_graph_is_silent() {
        let out = render("set(bpm=100)", &renderer(&[]), QualityProfile::Preview);
        assert_eq!(out.frames(), 0);
    }

    #[test]
    fn places_and_sums_voices() {
        let r = renderer(&[("a.wav", vec![0.25; 4]), ("b.wav", vec![0.5; 2])]);
        let out = render(
            "load a from \"a.wav\"\nload b from \"b.wav\"\nplay(b, at=300ms)",
            &r,
            QualityProfile::Preview,
        );
        assert_eq!(out.frames(), 5);
        assert_eq!(out.samples, vec![0.25, 0.25, 0.25, 0.75, 0.5]);
    }

    #[test]
    fn mute_and_solo() {
        let r = renderer(&[("a.wav", vec![0.1]), ("b.wav", vec![0.2]), ("c.wav", vec![0.4])]);
        let src = "load a from \"a.wav\"\nload b from \"b.wav\"\nload c from \"c.wav\"";
        let muted = render(&format!("{src}\nmute(a)"), &r, QualityProfile::Preview);
        assert_approx_eq!(muted.samples[0], 0.6);
        let solo = render(&format!("{src}\nsolo(c)\nsolo(a)"), &r, QualityProfile::Preview);
        assert_approx_eq!(solo.samples[0], 0.5);
    }

    #[test]
    fn chain_runs_in_order() {
        let r = renderer(&[("a.wav", vec![0.5, 0.25])]);
        // 1 bar at 120 bpm is 2 s, 20 frames.
        let out = render(
            "load a from \"a.wav\"\nloop(a, bars=1)\ngain(a, -6dB)",
            &r,
            QualityProfile::Preview,
        );
        assert_eq!(out.frames(), 20);
        assert_approx_eq!(out.samples[2], 0.25, 1e-3);
    }

    #[test]
    fn regions_slice_the_parent_source() {
        let source: Vec<f32> = (0..20).map(|i| i as f32 / 100.0).collect();
        let r = renderer(&[("a.wav", source)]);
        let out = render(
            "load a from \"a.wav\"\nmute(a)\nregion r = slice(a, start=500ms, end=800ms)",
            &r,
            QualityProfile::Preview,
        );
        assert_eq!(out.samples, vec![0.05, 0.06, 0.07]);
    }

    #[test]
    fn region_past_the_end_is_padded() {
        let r = renderer(&[("a.wav", vec![0.1; 3])]);
        let out = render(
            "load a from \"a.wav\"\nmute(a)\nregion r = slice(a, start=200ms, duration=400ms)",
            &r,
            QualityProfile::Preview,
        );
        assert_eq!(out.samples, vec![0.1, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn sources_are_loaded_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        struct Counting(Arc<AtomicUsize>);
        impl SampleLoader for Counting {
            fn load(&self, _: &str, sr: u32) -> Result<SampleData, LoadError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(SampleData::from_mono(vec![0.1; 10], sr))
            }
        }

        let count = Arc::new(AtomicUsize::new(0));
        let r = OfflineRenderer::new(Counting(Arc::clone(&count)));
        let g = Compiler::compile(
            "load a from \"a.wav\"\nregion r1 = slice(a, start=0s, end=1ms)\nregion r2 = slice(r1, start=0s, end=1ms)",
        )
        .unwrap();
        r.render(&g, QualityProfile::Export).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn load_failure_names_the_node() {
        let r = renderer(&[]);
        let g = Compiler::compile("set(bpm=90)\nload pad from \"missing.wav\"").unwrap();
        match r.render(&g, QualityProfile::Preview).unwrap_err() {
            RenderError::Source { node, line, .. } => {
                assert_eq!(node, "pad");
                assert_eq!(line, 2);
            }
            other => panic!("expected a source error, got {other:?}"),
        }
    }

    #[test]
    fn stereo_pans_with_constant_power() {
        let r = renderer(&[("a.wav", vec![0.5])]);
        let out = render("load a from \"a.wav\"\npan(a, -1)", &r, QualityProfile::Export);
        assert_eq!(out.channels, 2);
        assert_approx_eq!(out.samples[0], 0.5);
        assert!(out.samples[1].abs() < 1e-6);

        let centre = render("load a from \"a.wav\"", &r, QualityProfile::Export);
        assert_approx_eq!(centre.samples[0], centre.samples[1]);
    }

    #[test]
    fn beats_are_synthesized() {
        // 150 bpm: a bar is 1.6 s, 16 frames.
        let r = renderer(&[]);
        let out = render(
            "set(bpm=150)\nbeat(drums, style=\"hiphop\", bars=3)",
            &r,
            QualityProfile::Preview,
        );
        assert_eq!(out.frames(), 48);
        assert!(out.samples.iter().any(|s| *s != 0.0));
    }

    #[test]
    fn regions_of_a_beat() {
        let r = renderer(&[]);
        let g = Compiler::compile(
            "set(bpm=150)\nbeat(drums, bars=2)\nmute(drums)\nregion fill = slice(drums, start=bar(1), duration=bar(1))",
        )
        .unwrap();
        let out = r.render(&g, QualityProfile::Preview).unwrap();
        assert_eq!(out.frames(), 16);
    }

    #[test]
    fn too_long_timeline_is_an_error() {
        let r = renderer(&[("a.wav", vec![0.1])]);
        let g = Compiler::compile("load a from \"a.wav\"\nplay(a, at=7200s)").unwrap();
        match r.render(&g, QualityProfile::Preview).unwrap_err() {
            RenderError::TooLong { node, seconds } => {
                assert_eq!(node, "a");
                assert_approx_eq!(seconds, 7200.0);
            }
            other => panic!("expected a length error, got {other:?}"),
        }

        let g = Compiler::compile("set(bpm=0.001)\nbeat(d, bars=1)").unwrap();
        assert!(matches!(
            r.render(&g, QualityProfile::Preview),
            Err(RenderError::TooLong { .. })
        ));
    }

    #[test]
    fn extreme_pitch_renders() {
        let r = renderer(&[("a.wav", vec![0.1; 4])]);
        let g = Compiler::compile("load a from \"a.wav\"\npitch(a, -48semis)").unwrap();
        assert_eq!(r.render(&g, QualityProfile::Preview).unwrap().frames(), 64);
    }

    #[test]
    fn mix_is_limited() {
        let r = renderer(&[("a.wav", vec![0.8]), ("b.wav", vec![0.8])])
            .with_limiter(Limiter::new(0.9));
        let out = render(
            "load a from \"a.wav\"\nload b from \"b.wav\"",
            &r,
            QualityProfile::Preview,
        );
        assert_eq!(out.samples, vec![0.9]);
    }
}
