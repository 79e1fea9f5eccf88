//! Canonical DSL text for a list of operations.
//!
//! Used by `convert --to dsl` and by the diff preview. Output re-parses to
//! the same operations.

use super::ast::{DelayTime, Op, Operation, RegionEnd};
use super::yaml::fraction_text;

/// Render operations as DSL source, one statement per line.
pub fn to_source(operations: &[Operation]) -> String {
    let mut out = String::new();
    for op in operations {
        out.push_str(&statement(&op.op));
        out.push('\n');
    }
    out
}

/// One statement, without a trailing newline.
pub fn statement(op: &Op) -> String {
    let name = op.kind().name();
    match op {
        Op::Set { bpm, key } => {
            let mut args = Vec::new();
            if let Some(bpm) = bpm {
                args.push(format!("bpm={bpm}"));
            }
            if let Some(key) = key {
                args.push(format!("key={}", quote(key)));
            }
            format!("set({})", args.join(", "))
        }
        Op::Load { name, path } => format!("load {name} from {}", quote(path)),
        Op::Beat {
            name: track,
            style,
            bars,
        } => format!("beat({track}, style=\"{style}\", bars={bars})"),
        Op::Play { target, at } => format!("play({target}, at={at})"),
        Op::Mute { target } | Op::Solo { target } | Op::Reverse { target } => {
            format!("{name}({target})")
        }
        Op::Gain { target, db } => format!("gain({target}, {db}dB)"),
        Op::Pan { target, value } => format!("pan({target}, value={value})"),
        Op::FadeIn { target, seconds } | Op::FadeOut { target, seconds } => {
            format!("{name}({target}, seconds={seconds})")
        }
        Op::Loop { target, bars } | Op::Trim { target, bars } => {
            format!("{name}({target}, bars={bars})")
        }
        Op::Region {
            name,
            of,
            start,
            end,
        } => {
            let end = match end {
                RegionEnd::End(t) => format!("end={t}"),
                RegionEnd::Duration(t) => format!("duration={t}"),
            };
            format!("region {name} = slice({of}, start={start}, {end})")
        }
        Op::Pitch { target, semis } => format!("pitch({target}, {semis}semis)"),
        Op::Reverb { target, amount } => format!("reverb({target}, amount={amount})"),
        Op::Delay {
            target,
            time,
            feedback,
            mix,
        } => {
            let time = match time {
                DelayTime::Time(t) => t.to_string(),
                DelayTime::BarFraction(f) => fraction_text(*f),
            };
            format!("delay({target}, time={time}, feedback={feedback}, mix={mix})")
        }
        Op::Lowpass { target, freq } | Op::Highpass { target, freq } => {
            format!("{name}({target}, freq={freq}Hz)")
        }
        Op::Normalize { target, headroom } => {
            format!("normalize({target}, headroom={headroom}dB)")
        }
        Op::Export { file } => format!("export({})", quote(file)),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
