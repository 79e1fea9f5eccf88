//! Typed operations: what a recipe says, with every argument resolved to
//! its parameter's type.
//!
//! Time arguments stay unresolved ([`TimeValue`]) because converting bars
//! and beats to seconds needs the tempo in effect at that point of the
//! recipe, which only the graph builder tracks.

use std::fmt;

use crate::time::TimeUnit;

/// Position of a statement in its source. For YAML recipes `line` is the
/// 1-based index of the statement in the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourcePos {
    pub line: usize,
    pub col: usize,
}

impl SourcePos {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

/// The result of parsing one recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub operations: Vec<Operation>,
    /// Track names in declaration order.
    pub tracks: Vec<String>,
}

/// One statement of a recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub op: Op,
    pub pos: SourcePos,
}

impl Operation {
    pub fn new(op: Op, pos: SourcePos) -> Self {
        Self { op, pos }
    }
}

/// A time argument as written: a magnitude and its unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeValue {
    pub value: f64,
    pub unit: TimeUnit,
}

impl TimeValue {
    pub fn new(value: f64, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    pub fn seconds(value: f64) -> Self {
        Self::new(value, TimeUnit::Seconds)
    }

    pub fn bars(value: f64) -> Self {
        Self::new(value, TimeUnit::Bars)
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            TimeUnit::Seconds => write!(f, "{}s", self.value),
            TimeUnit::Millis => write!(f, "{}ms", self.value),
            TimeUnit::Bars => write!(f, "bar({})", self.value),
            TimeUnit::Beats => write!(f, "beat({})", self.value),
        }
    }
}

/// How a region's far edge was written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegionEnd {
    End(TimeValue),
    Duration(TimeValue),
}

/// Delay time: an absolute time, or a note value as a fraction of a bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DelayTime {
    Time(TimeValue),
    BarFraction(f64),
}

/// Drum pattern of a `beat` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BeatStyle {
    #[default]
    House,
    HipHop,
    Breakbeat,
}

impl BeatStyle {
    pub const ALL: [BeatStyle; 3] = [BeatStyle::House, BeatStyle::HipHop, BeatStyle::Breakbeat];

    pub fn name(self) -> &'static str {
        match self {
            BeatStyle::House => "house",
            BeatStyle::HipHop => "hiphop",
            BeatStyle::Breakbeat => "breakbeat",
        }
    }

    pub fn from_name(name: &str) -> Option<BeatStyle> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

impl fmt::Display for BeatStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved statement. Field names match the recipe vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Set {
        bpm: Option<f64>,
        key: Option<String>,
    },
    Load {
        name: String,
        /// File path, optionally with a `#stem` selector. Opaque to the core.
        path: String,
    },
    /// Declares a generated drum track.
    Beat {
        name: String,
        style: BeatStyle,
        bars: u32,
    },
    Play {
        target: String,
        at: TimeValue,
    },
    Mute {
        target: String,
    },
    Solo {
        target: String,
    },
    Gain {
        target: String,
        db: f64,
    },
    Pan {
        target: String,
        value: f64,
    },
    FadeIn {
        target: String,
        seconds: TimeValue,
    },
    FadeOut {
        target: String,
        seconds: TimeValue,
    },
    Loop {
        target: String,
        bars: u32,
    },
    Trim {
        target: String,
        bars: u32,
    },
    Region {
        name: String,
        of: String,
        start: TimeValue,
        end: RegionEnd,
    },
    Pitch {
        target: String,
        semis: f64,
    },
    Reverb {
        target: String,
        amount: f64,
    },
    Delay {
        target: String,
        time: DelayTime,
        feedback: f64,
        mix: f64,
    },
    Lowpass {
        target: String,
        freq: f64,
    },
    Highpass {
        target: String,
        freq: f64,
    },
    Reverse {
        target: String,
    },
    Normalize {
        target: String,
        headroom: f64,
    },
    Export {
        file: String,
    },
}

impl Op {
    pub fn kind(&self) -> OpKind {
        match self {
            Op::Set { .. } => OpKind::Set,
            Op::Load { .. } => OpKind::Load,
            Op::Beat { .. } => OpKind::Beat,
            Op::Play { .. } => OpKind::Play,
            Op::Mute { .. } => OpKind::Mute,
            Op::Solo { .. } => OpKind::Solo,
            Op::Gain { .. } => OpKind::Gain,
            Op::Pan { .. } => OpKind::Pan,
            Op::FadeIn { .. } => OpKind::FadeIn,
            Op::FadeOut { .. } => OpKind::FadeOut,
            Op::Loop { .. } => OpKind::Loop,
            Op::Trim { .. } => OpKind::Trim,
            Op::Region { .. } => OpKind::Region,
            Op::Pitch { .. } => OpKind::Pitch,
            Op::Reverb { .. } => OpKind::Reverb,
            Op::Delay { .. } => OpKind::Delay,
            Op::Lowpass { .. } => OpKind::Lowpass,
            Op::Highpass { .. } => OpKind::Highpass,
            Op::Reverse { .. } => OpKind::Reverse,
            Op::Normalize { .. } => OpKind::Normalize,
            Op::Export { .. } => OpKind::Export,
        }
    }

    /// The track or region this operation acts on, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            Op::Play { target, .. }
            | Op::Mute { target }
            | Op::Solo { target }
            | Op::Gain { target, .. }
            | Op::Pan { target, .. }
            | Op::FadeIn { target, .. }
            | Op::FadeOut { target, .. }
            | Op::Loop { target, .. }
            | Op::Trim { target, .. }
            | Op::Pitch { target, .. }
            | Op::Reverb { target, .. }
            | Op::Delay { target, .. }
            | Op::Lowpass { target, .. }
            | Op::Highpass { target, .. }
            | Op::Reverse { target }
            | Op::Normalize { target, .. } => Some(target),
            Op::Region { of, .. } => Some(of),
            Op::Set { .. } | Op::Load { .. } | Op::Beat { .. } | Op::Export { .. } => None,
        }
    }
}

/// Operation names, without arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Set,
    Load,
    Beat,
    Play,
    Mute,
    Solo,
    Gain,
    Pan,
    FadeIn,
    FadeOut,
    Loop,
    Trim,
    Region,
    Pitch,
    Reverb,
    Delay,
    Lowpass,
    Highpass,
    Reverse,
    Normalize,
    Export,
}

impl OpKind {
    pub const ALL: [OpKind; 21] = [
        OpKind::Set,
        OpKind::Load,
        OpKind::Beat,
        OpKind::Play,
        OpKind::Mute,
        OpKind::Solo,
        OpKind::Gain,
        OpKind::Pan,
        OpKind::FadeIn,
        OpKind::FadeOut,
        OpKind::Loop,
        OpKind::Trim,
        OpKind::Region,
        OpKind::Pitch,
        OpKind::Reverb,
        OpKind::Delay,
        OpKind::Lowpass,
        OpKind::Highpass,
        OpKind::Reverse,
        OpKind::Normalize,
        OpKind::Export,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OpKind::Set => "set",
            OpKind::Load => "load",
            OpKind::Beat => "beat",
            OpKind::Play => "play",
            OpKind::Mute => "mute",
            OpKind::Solo => "solo",
            OpKind::Gain => "gain",
            OpKind::Pan => "pan",
            OpKind::FadeIn => "fadeIn",
            OpKind::FadeOut => "fadeOut",
            OpKind::Loop => "loop",
            OpKind::Trim => "trim",
            OpKind::Region => "region",
            OpKind::Pitch => "pitch",
            OpKind::Reverb => "reverb",
            OpKind::Delay => "delay",
            OpKind::Lowpass => "lowpass",
            OpKind::Highpass => "highpass",
            OpKind::Reverse => "reverse",
            OpKind::Normalize => "normalize",
            OpKind::Export => "export",
        }
    }

    pub fn from_name(name: &str) -> Option<OpKind> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Parameter names in positional order.
    pub fn params(self) -> &'static [&'static str] {
        match self {
            OpKind::Set => &["bpm", "key"],
            OpKind::Load => &["name", "path"],
            OpKind::Beat => &["name", "style", "bars"],
            OpKind::Play => &["target", "at"],
            OpKind::Mute | OpKind::Solo | OpKind::Reverse => &["target"],
            OpKind::Gain => &["target", "db"],
            OpKind::Pan => &["target", "value"],
            OpKind::FadeIn | OpKind::FadeOut => &["target", "seconds"],
            OpKind::Loop | OpKind::Trim => &["target", "bars"],
            OpKind::Region => &["name", "of", "start", "end", "duration"],
            OpKind::Pitch => &["target", "semis"],
            OpKind::Reverb => &["target", "amount"],
            OpKind::Delay => &["target", "time", "feedback", "mix"],
            OpKind::Lowpass | OpKind::Highpass => &["target", "freq"],
            OpKind::Normalize => &["target", "headroom"],
            OpKind::Export => &["file"],
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
