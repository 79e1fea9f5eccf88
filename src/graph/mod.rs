//! Graph: the resolved, immutable processing structure built from a recipe.
//!
//! Every time value in a Graph is in seconds. Nodes keep their declaration
//! order, so two builds of the same recipe compare equal.

pub mod builder;
pub mod diff;

use std::fmt;

pub use builder::build;
pub use diff::{GraphChange, GraphDiff};

use crate::dsl::ast::BeatStyle;
use crate::time::DEFAULT_BPM;

/// Largest pitch shift, in semitones, either way.
pub const MAX_PITCH_SEMIS: f64 = 48.0;

/// Largest bar count a `loop`, `trim` or `beat` accepts.
pub const MAX_BARS: u32 = 1024;

/// Playback-rate factor of a pitch shift: up an octave plays twice as fast.
pub fn pitch_ratio(semis: f64) -> f64 {
    2f64.powf(semis / 12.0)
}

/// Recipe-wide settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Globals {
    /// Tempo after the last `set` in the recipe.
    pub bpm: f64,
    pub key: Option<String>,
    /// End of the latest node with a known duration, in seconds.
    pub length: Option<f64>,
}

impl Default for Globals {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            key: None,
            length: None,
        }
    }
}

/// What a node plays.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A loaded source. `source` is the path as written, stem selector included.
    Track { source: String },
    /// A time slice `[start, end)` of another node's source audio.
    Region { of: String, start: f64, end: f64 },
    /// A synthesized drum pattern `bars` bars long; `seconds` is that
    /// length at the tempo in effect where it was declared.
    Beat {
        style: BeatStyle,
        bars: u32,
        seconds: f64,
    },
}

/// A track or region with its effect chain and timeline placement.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    /// Effects in declaration order; the last entry is closest to the output.
    pub chain: Vec<EffectEntry>,
    /// Start on the timeline, in seconds.
    pub placement: f64,
    pub muted: bool,
    pub solo: bool,
    /// Line of the statement that declared the node.
    pub line: usize,
}

impl Node {
    /// Length of the node's output, when the recipe pins it down.
    ///
    /// Starts from a region's span or a beat's length and follows the chain:
    /// `loop`/`trim` set the length outright, `pitch` scales it by the
    /// playback rate. A loaded track has no known length until a `loop` or
    /// `trim`.
    pub fn duration(&self) -> Option<f64> {
        let mut length = match self.kind {
            NodeKind::Region { start, end, .. } => Some(end - start),
            NodeKind::Beat { seconds, .. } => Some(seconds),
            NodeKind::Track { .. } => None,
        };
        for effect in self.effects() {
            match *effect {
                Effect::Loop { seconds, .. } | Effect::Trim { seconds, .. } => {
                    length = Some(seconds)
                }
                Effect::Pitch { semis } => length = length.map(|l| l / pitch_ratio(semis)),
                _ => {}
            }
        }
        length
    }

    pub fn is_region(&self) -> bool {
        matches!(self.kind, NodeKind::Region { .. })
    }

    pub fn effects(&self) -> impl Iterator<Item = &Effect> {
        self.chain.iter().map(|e| &e.effect)
    }
}

/// One effect in a chain, tagged with the statement that added it.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectEntry {
    pub effect: Effect,
    pub line: usize,
}

/// An effect with all parameters resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Repeat the input to fill `bars` bars.
    Loop { bars: u32, seconds: f64 },
    /// Cut the input to `bars` bars.
    Trim { bars: u32, seconds: f64 },
    Gain { db: f64 },
    Pan { value: f64 },
    FadeIn { seconds: f64 },
    FadeOut { seconds: f64 },
    Pitch { semis: f64 },
    Reverb { amount: f64 },
    Delay { seconds: f64, feedback: f64, mix: f64 },
    Lowpass { freq: f64 },
    Highpass { freq: f64 },
    Reverse,
    Normalize { headroom: f64 },
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Loop { bars, .. } => write!(f, "loop({bars} bars)"),
            Effect::Trim { bars, .. } => write!(f, "trim({bars} bars)"),
            Effect::Gain { db } => write!(f, "gain({db}dB)"),
            Effect::Pan { value } => write!(f, "pan({value})"),
            Effect::FadeIn { seconds } => write!(f, "fadeIn({seconds}s)"),
            Effect::FadeOut { seconds } => write!(f, "fadeOut({seconds}s)"),
            Effect::Pitch { semis } => write!(f, "pitch({semis}semis)"),
            Effect::Reverb { amount } => write!(f, "reverb({amount})"),
            Effect::Delay {
                seconds,
                feedback,
                mix,
            } => write!(f, "delay({seconds:.3}s, feedback={feedback}, mix={mix})"),
            Effect::Lowpass { freq } => write!(f, "lowpass({freq}Hz)"),
            Effect::Highpass { freq } => write!(f, "highpass({freq}Hz)"),
            Effect::Reverse => write!(f, "reverse"),
            Effect::Normalize { headroom } => write!(f, "normalize({headroom}dB)"),
        }
    }
}

/// A request to render the graph to a file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDirective {
    pub file: String,
    pub line: usize,
}

/// The compiled recipe.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Graph {
    pub globals: Globals,
    /// Tracks and regions in declaration order.
    pub nodes: Vec<Node>,
    pub exports: Vec<ExportDirective>,
}

impl Graph {
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| !n.is_region())
    }

    pub fn regions(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_region())
    }

    /// Whether `node` reaches the mix: not muted, and soloed if anything is.
    pub fn is_audible(&self, node: &Node) -> bool {
        if node.muted {
            return false;
        }
        let any_solo = self.nodes.iter().any(|n| n.solo);
        !any_solo || node.solo
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tempo {} bpm", self.globals.bpm)?;
        if let Some(key) = &self.globals.key {
            write!(f, ", key {key}")?;
        }
        if let Some(length) = self.globals.length {
            write!(f, ", length {length:.3}s")?;
        }
        writeln!(f)?;

        for node in &self.nodes {
            match &node.kind {
                NodeKind::Track { source } => write!(f, "track {} <- \"{source}\"", node.name)?,
                NodeKind::Region { of, start, end } => {
                    write!(f, "region {} <- {of}[{start:.3}s..{end:.3}s]", node.name)?
                }
                NodeKind::Beat { style, bars, .. } => {
                    write!(f, "beat {} <- {style} x{bars} bars", node.name)?
                }
            }
            write!(f, " @ {:.3}s", node.placement)?;
            if node.muted {
                write!(f, " [muted]")?;
            }
            if node.solo {
                write!(f, " [solo]")?;
            }
            writeln!(f)?;
            for effect in node.effects() {
                writeln!(f, "  {effect}")?;
            }
        }

        for export in &self.exports {
            writeln!(f, "export {}", export.file)?;
        }
        Ok(())
    }
}
