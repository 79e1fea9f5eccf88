//! Operation list → Graph.
//!
//! A single forward pass. Each `set(bpm=...)` applies to the statements
//! after it; bar and beat offsets are converted to seconds with the tempo
//! in effect where they appear.

use std::collections::HashMap;

use super::{Effect, EffectEntry, ExportDirective, Globals, Graph, Node, NodeKind};
use crate::dsl::ast::{DelayTime, Op, Operation, RegionEnd, SourcePos, TimeValue};
use crate::dsl::error::{CompileError, ErrorKind};
use crate::dsl::suggest::nearest;
use crate::time::{bar_seconds, offset_to_seconds, DEFAULT_BPM};

/// Build a Graph from parsed operations. Starts from empty state on every
/// call, so equal inputs give equal Graphs.
pub fn build(operations: &[Operation]) -> Result<Graph, CompileError> {
    let mut builder = GraphBuilder::new();
    for operation in operations {
        builder.apply(operation)?;
    }
    Ok(builder.finish())
}

struct GraphBuilder {
    bpm: f64,
    key: Option<String>,
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    exports: Vec<ExportDirective>,
}

impl GraphBuilder {
    fn new() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            key: None,
            nodes: Vec::new(),
            index: HashMap::new(),
            exports: Vec::new(),
        }
    }

    fn apply(&mut self, operation: &Operation) -> Result<(), CompileError> {
        let pos = operation.pos;
        match &operation.op {
            Op::Set { bpm, key } => {
                if let Some(bpm) = bpm {
                    self.bpm = *bpm;
                }
                if let Some(key) = key {
                    self.key = Some(key.clone());
                }
            }
            Op::Load { name, path } => {
                self.declare(
                    name,
                    NodeKind::Track {
                        source: path.clone(),
                    },
                    pos,
                )?;
            }
            Op::Beat { name, style, bars } => {
                let bar = self.bar(pos)?;
                self.declare(
                    name,
                    NodeKind::Beat {
                        style: *style,
                        bars: *bars,
                        seconds: *bars as f64 * bar,
                    },
                    pos,
                )?;
            }
            Op::Region {
                name,
                of,
                start,
                end,
            } => {
                self.lookup(of, pos)?;
                let start_s = self.seconds(start, pos)?;
                let end_s = match end {
                    RegionEnd::End(t) => self.seconds(t, pos)?,
                    RegionEnd::Duration(t) => start_s + self.seconds(t, pos)?,
                };
                if end_s <= start_s {
                    return Err(CompileError::new(
                        ErrorKind::InvalidRegion,
                        format!(
                            "region '{name}' ends at {end_s:.3}s, not after its start at {start_s:.3}s"
                        ),
                        pos.line,
                        pos.col,
                    ));
                }
                self.declare(
                    name,
                    NodeKind::Region {
                        of: of.clone(),
                        start: start_s,
                        end: end_s,
                    },
                    pos,
                )?;
            }
            Op::Play { target, at } => {
                let at = self.seconds(at, pos)?;
                self.lookup(target, pos)?.placement = at;
            }
            Op::Mute { target } => self.lookup(target, pos)?.muted = true,
            Op::Solo { target } => self.lookup(target, pos)?.solo = true,
            Op::Export { file } => self.exports.push(ExportDirective {
                file: file.clone(),
                line: pos.line,
            }),
            op => {
                let effect = self.effect(op, pos)?;
                let target = op.target().unwrap_or_default();
                self.lookup(target, pos)?.chain.push(EffectEntry {
                    effect,
                    line: pos.line,
                });
            }
        }
        Ok(())
    }

    fn effect(&self, op: &Op, pos: SourcePos) -> Result<Effect, CompileError> {
        let bar = self.bar(pos)?;
        Ok(match op {
            Op::Loop { bars, .. } => Effect::Loop {
                bars: *bars,
                seconds: *bars as f64 * bar,
            },
            Op::Trim { bars, .. } => Effect::Trim {
                bars: *bars,
                seconds: *bars as f64 * bar,
            },
            Op::Gain { db, .. } => Effect::Gain { db: *db },
            Op::Pan { value, .. } => Effect::Pan { value: *value },
            Op::FadeIn { seconds, .. } => Effect::FadeIn {
                seconds: self.seconds(seconds, pos)?,
            },
            Op::FadeOut { seconds, .. } => Effect::FadeOut {
                seconds: self.seconds(seconds, pos)?,
            },
            Op::Pitch { semis, .. } => Effect::Pitch { semis: *semis },
            Op::Reverb { amount, .. } => Effect::Reverb { amount: *amount },
            Op::Delay {
                time,
                feedback,
                mix,
                ..
            } => Effect::Delay {
                seconds: match time {
                    DelayTime::Time(t) => self.seconds(t, pos)?,
                    DelayTime::BarFraction(f) => f * bar,
                },
                feedback: *feedback,
                mix: *mix,
            },
            Op::Lowpass { freq, .. } => Effect::Lowpass { freq: *freq },
            Op::Highpass { freq, .. } => Effect::Highpass { freq: *freq },
            Op::Reverse { .. } => Effect::Reverse,
            Op::Normalize { headroom, .. } => Effect::Normalize {
                headroom: *headroom,
            },
            Op::Set { .. }
            | Op::Load { .. }
            | Op::Beat { .. }
            | Op::Region { .. }
            | Op::Play { .. }
            | Op::Mute { .. }
            | Op::Solo { .. }
            | Op::Export { .. } => {
                return Err(CompileError::argument(
                    format!("{} is not an effect", op.kind()),
                    pos.line,
                    pos.col,
                ))
            }
        })
    }

    fn bar(&self, pos: SourcePos) -> Result<f64, CompileError> {
        bar_seconds(self.bpm).map_err(|e| CompileError::time(&e, pos.line, pos.col))
    }

    fn seconds(&self, t: &TimeValue, pos: SourcePos) -> Result<f64, CompileError> {
        offset_to_seconds(t.value, t.unit, self.bpm)
            .map_err(|e| CompileError::time(&e, pos.line, pos.col))
    }

    fn declare(&mut self, name: &str, kind: NodeKind, pos: SourcePos) -> Result<(), CompileError> {
        if self.index.contains_key(name) {
            return Err(CompileError::duplicate_track(name, pos.line, pos.col));
        }
        self.index.insert(name.to_string(), self.nodes.len());
        self.nodes.push(Node {
            name: name.to_string(),
            kind,
            chain: Vec::new(),
            placement: 0.0,
            muted: false,
            solo: false,
            line: pos.line,
        });
        Ok(())
    }

    fn lookup(&mut self, name: &str, pos: SourcePos) -> Result<&mut Node, CompileError> {
        match self.index.get(name) {
            Some(&idx) => Ok(&mut self.nodes[idx]),
            None => Err(CompileError::unknown_reference(name, pos.line, pos.col)
                .with_suggestion(nearest(name, self.nodes.iter().map(|n| n.name.as_str())))),
        }
    }

    fn finish(self) -> Graph {
        let length = self
            .nodes
            .iter()
            .filter_map(|n| n.duration().map(|d| n.placement + d))
            .fold(None, |acc: Option<f64>, end| Some(acc.map_or(end, |a| a.max(end))));
        Graph {
            globals: Globals {
                bpm: self.bpm,
                key: self.key,
                length,
            },
            nodes: self.nodes,
            exports: self.exports,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::Compiler;
    use assert_approx_eq::assert_approx_eq;

    fn graph(src: &str) -> Graph {
        build(&Compiler::parse(src).unwrap().operations).unwrap()
    }

    fn op(op: Op, line: usize) -> Operation {
        Operation::new(op, SourcePos::new(line, 1))
    }

    #[test]
    fn drums_example() {
        let g = graph(
            "set(bpm=84); load drums from \"kit.wav\"; loop(drums, bars=8); gain(drums, -2dB); export(\"demo_mix.wav\")",
        );
        assert_eq!(g.nodes.len(), 1);
        let drums = &g.nodes[0];
        assert_eq!(drums.name, "drums");
        assert_eq!(
            drums.kind,
            NodeKind::Track {
                source: "kit.wav".into()
            }
        );
        let effects: Vec<_> = drums.effects().cloned().collect();
        assert_eq!(effects.len(), 2);
        match effects[0] {
            Effect::Loop { bars, seconds } => {
                assert_eq!(bars, 8);
                assert_approx_eq!(seconds, 8.0 * 4.0 * 60.0 / 84.0);
            }
            ref other => panic!("expected loop, got {other:?}"),
        }
        assert_eq!(effects[1], Effect::Gain { db: -2.0 });
        assert_eq!(g.exports.len(), 1);
        assert_eq!(g.exports[0].file, "demo_mix.wav");
        assert_approx_eq!(g.globals.length.unwrap(), 32.0 * 60.0 / 84.0);
    }

    #[test]
    fn build_is_deterministic() {
        let src = "set(bpm=100, key=\"E\")\nload a from \"a.wav\"\nload b from \"b.wav\"\nregion r = slice(a, start=bar(1), duration=2s)\nplay(r, at=bar(2))\ndelay(b, time=1/4)\nsolo(b)\nexport(\"x.wav\")";
        let ops = Compiler::parse(src).unwrap().operations;
        assert_eq!(build(&ops).unwrap(), build(&ops).unwrap());
    }

    #[test]
    fn region_at_90_bpm() {
        let g = graph("set(bpm=90)\nload pad from \"pad.wav\"\nregion r1 = slice(pad, start=bar(1), end=bar(9))");
        match &g.node("r1").unwrap().kind {
            NodeKind::Region { of, start, end } => {
                assert_eq!(of, "pad");
                assert_approx_eq!(*start, 8.0 / 3.0);
                assert_approx_eq!(*end, 24.0);
            }
            other => panic!("expected region, got {other:?}"),
        }
    }

    #[test]
    fn region_with_duration() {
        let g = graph("load a from \"a.wav\"\nregion r = slice(a, start=1s, duration=500ms)");
        assert_eq!(
            g.node("r").unwrap().kind,
            NodeKind::Region {
                of: "a".into(),
                start: 1.0,
                end: 1.5
            }
        );
    }

    #[test]
    fn empty_region_is_invalid() {
        let src = "load a from \"a.wav\"\nregion r = slice(a, start=bar(4), end=bar(2))";
        let err = build(&Compiler::parse(src).unwrap().operations).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRegion);
        assert_eq!(err.line, 2);

        let src = "load a from \"a.wav\"\nregion r = slice(a, start=2s, end=2s)";
        let err = build(&Compiler::parse(src).unwrap().operations).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRegion);
    }

    #[test]
    fn set_is_forward_only() {
        let g = graph("load a from \"a.wav\"\nload b from \"b.wav\"\nplay(a, at=bar(1))\nset(bpm=60)\nplay(b, at=bar(1))");
        assert_approx_eq!(g.node("a").unwrap().placement, 2.0);
        assert_approx_eq!(g.node("b").unwrap().placement, 4.0);
        assert_eq!(g.globals.bpm, 60.0);
    }

    #[test]
    fn default_tempo_before_set() {
        let g = graph("load a from \"a.wav\"\nloop(a, bars=1)");
        match g.nodes[0].chain[0].effect {
            Effect::Loop { seconds, .. } => assert_approx_eq!(seconds, 2.0),
            ref other => panic!("expected loop, got {other:?}"),
        }
        assert_eq!(g.globals.bpm, DEFAULT_BPM);
        assert_eq!(g.globals.key, None);
    }

    #[test]
    fn later_play_overrides() {
        let g = graph("load a from \"a.wav\"\nplay(a, at=3s)\nplay(a, at=1s)");
        assert_eq!(g.nodes[0].placement, 1.0);
    }

    #[test]
    fn unplaced_nodes_start_at_zero() {
        let g = graph("load a from \"a.wav\"");
        assert_eq!(g.nodes[0].placement, 0.0);
        assert_eq!(g.globals.length, None);
    }

    #[test]
    fn flags_and_chain_order() {
        let g = graph("load a from \"a.wav\"\nmute(a)\nlowpass(a, 2kHz)\nreverse(a)\ngain(a, 3dB)");
        let a = &g.nodes[0];
        assert!(a.muted);
        assert!(!a.solo);
        let lines: Vec<_> = a.chain.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
        assert_eq!(a.chain[0].effect, Effect::Lowpass { freq: 2000.0 });
        assert_eq!(a.chain[1].effect, Effect::Reverse);
    }

    #[test]
    fn delay_fraction_is_part_of_a_bar() {
        let g = graph("set(bpm=120)\nload a from \"a.wav\"\ndelay(a, time=1/4, feedback=0.5, mix=0.5)");
        assert_eq!(
            g.nodes[0].chain[0].effect,
            Effect::Delay {
                seconds: 0.5,
                feedback: 0.5,
                mix: 0.5
            }
        );
    }

    #[test]
    fn length_covers_latest_node() {
        let g = graph("set(bpm=120)\nload a from \"a.wav\"\nload b from \"b.wav\"\nloop(a, bars=2)\ntrim(b, bars=1)\nplay(b, at=bar(4))");
        assert_approx_eq!(g.globals.length.unwrap(), 10.0);
    }

    #[test]
    fn beat_length_follows_tempo() {
        let g = graph("set(bpm=96)\nbeat(drums, style=\"breakbeat\", bars=3)\nplay(drums, at=bar(1))");
        let drums = g.node("drums").unwrap();
        match drums.kind {
            NodeKind::Beat { style, bars, seconds } => {
                assert_eq!(style, crate::dsl::ast::BeatStyle::Breakbeat);
                assert_eq!(bars, 3);
                assert_approx_eq!(seconds, 60.0 / 96.0 * 4.0 * 3.0);
            }
            ref other => panic!("expected beat, got {other:?}"),
        }
        assert_approx_eq!(g.globals.length.unwrap(), 60.0 / 96.0 * 4.0 * 4.0);
        assert_eq!(g.tracks().count(), 1);
    }

    #[test]
    fn length_accounts_for_pitch() {
        let g = graph("set(bpm=120)\nload a from \"a.wav\"\nloop(a, bars=2)\npitch(a, 12semis)");
        assert_approx_eq!(g.globals.length.unwrap(), 2.0);

        let g = graph("set(bpm=120)\nbeat(d, bars=1)\npitch(d, -12semis)");
        assert_approx_eq!(g.globals.length.unwrap(), 4.0);
    }

    #[test]
    fn several_exports() {
        let g = graph("export(\"a.wav\")\nexport(\"b.wav\")");
        let files: Vec<_> = g.exports.iter().map(|e| e.file.as_str()).collect();
        assert_eq!(files, vec!["a.wav", "b.wav"]);
        assert_eq!(g.exports[1].line, 2);
    }

    // The parser rejects these first; the builder checks on its own as well.

    #[test]
    fn builder_rejects_duplicates() {
        let load = |line| {
            op(
                Op::Load {
                    name: "a".into(),
                    path: "a.wav".into(),
                },
                line,
            )
        };
        let err = build(&[load(1), load(2)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateTrack);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn builder_rejects_unknown_targets() {
        let ops = [
            op(
                Op::Load {
                    name: "drums".into(),
                    path: "kit.wav".into(),
                },
                1,
            ),
            op(
                Op::Gain {
                    target: "drum".into(),
                    db: 1.0,
                },
                2,
            ),
        ];
        let err = build(&ops).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownReference);
        assert_eq!(err.suggestion.as_deref(), Some("drums"));
    }
}
