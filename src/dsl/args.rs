//! Argument binding: turns a statement's raw argument list into a typed
//! [`Op`].
//!
//! Shared by the DSL parser and the YAML reader so that both forms accept
//! exactly the same values and report exactly the same errors. Raw
//! arguments never leave this module.

use super::ast::{
    BeatStyle, DelayTime, Op, OpKind, Operation, RegionEnd, SourcePos, TimeValue,
};
use super::error::{CompileError, ErrorKind};
use super::parser::parse_literal;
use super::suggest::nearest;
use super::token::Unit;
use crate::graph::{MAX_BARS, MAX_PITCH_SEMIS};
use crate::time::TimeUnit;

/// Length of a `beat` when `bars` is not given.
pub(crate) const DEFAULT_BEAT_BARS: u32 = 4;

/// Parameters of the `slice(...)` expression in `region NAME = slice(...)`.
pub(crate) const SLICE_PARAMS: &[&str] = &["of", "start", "end", "duration"];

/// An argument value before it is matched against a parameter type.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ArgValue {
    Ident(String),
    Str(String),
    /// A YAML string: a name, a path or a literal, depending on the parameter.
    Text(String),
    Number(f64),
    Quantity(f64, Unit),
    Fraction(f64),
    /// `bar(n)` or `beat(n)`.
    Time(TimeValue),
    /// A YAML value with no DSL counterpart (bool, null, list, map).
    Other(&'static str),
}

impl ArgValue {
    fn describe(&self) -> String {
        match self {
            ArgValue::Ident(s) => format!("identifier '{s}'"),
            ArgValue::Str(s) | ArgValue::Text(s) => format!("string \"{s}\""),
            ArgValue::Number(n) => format!("number {n}"),
            ArgValue::Quantity(n, u) => format!("'{n}{}'", u.suffix()),
            ArgValue::Fraction(n) => format!("fraction {n}"),
            ArgValue::Time(t) => format!("'{t}'"),
            ArgValue::Other(what) => what.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Arg {
    pub name: Option<String>,
    pub value: ArgValue,
    pub pos: SourcePos,
}

/// Names declared so far in one parse pass.
#[derive(Debug, Default)]
pub(crate) struct Scope {
    declared: Vec<String>,
    tracks: Vec<String>,
}

impl Scope {
    pub fn tracks(self) -> Vec<String> {
        self.tracks
    }

    fn declare(&mut self, name: &str, pos: SourcePos) -> Result<(), CompileError> {
        if self.declared.iter().any(|n| n == name) {
            return Err(CompileError::duplicate_track(name, pos.line, pos.col));
        }
        self.declared.push(name.to_string());
        Ok(())
    }

    fn check(&self, name: &str, pos: SourcePos) -> Result<(), CompileError> {
        if self.declared.iter().any(|n| n == name) {
            Ok(())
        } else {
            Err(CompileError::unknown_reference(name, pos.line, pos.col)
                .with_suggestion(nearest(name, self.declared.iter().map(String::as_str))))
        }
    }
}

/// Resolve a call-form statement `name(args)`.
pub(crate) fn resolve_call(
    name: &str,
    pos: SourcePos,
    args: Vec<Arg>,
    scope: &mut Scope,
) -> Result<Operation, CompileError> {
    let kind = OpKind::from_name(name).ok_or_else(|| {
        CompileError::unknown_operation(name, pos.line, pos.col)
            .with_suggestion(nearest(name, OpKind::ALL.iter().map(|k| k.name())))
    })?;
    let bound = Bound::bind(kind, kind.params(), args, pos)?;
    resolve(kind, bound, scope)
}

/// Resolve `region NAME = slice(args)`.
pub(crate) fn resolve_slice(
    region: Arg,
    pos: SourcePos,
    args: Vec<Arg>,
    scope: &mut Scope,
) -> Result<Operation, CompileError> {
    let mut bound = Bound::bind(OpKind::Region, SLICE_PARAMS, args, pos)?;
    bound.params = OpKind::Region.params();
    bound.slots.insert(0, Some(region));
    resolve(OpKind::Region, bound, scope)
}

fn resolve(kind: OpKind, mut b: Bound, scope: &mut Scope) -> Result<Operation, CompileError> {
    let pos = b.pos;
    let op = match kind {
        OpKind::Set => {
            let bpm = b.take("bpm").map(|a| tempo(&a)).transpose()?;
            let key = b.take("key").map(|a| label(&a)).transpose()?;
            if bpm.is_none() && key.is_none() {
                return Err(CompileError::argument(
                    "set requires 'bpm' or 'key'",
                    pos.line,
                    pos.col,
                ));
            }
            Op::Set { bpm, key }
        }
        OpKind::Load => {
            let name_arg = b.required("name")?;
            let name = declared_name(&name_arg)?;
            let path = text(&b.required("path")?, "a file path")?;
            scope.declare(&name, name_arg.pos)?;
            scope.tracks.push(name.clone());
            Op::Load { name, path }
        }
        OpKind::Beat => {
            let name_arg = b.required("name")?;
            let name = declared_name(&name_arg)?;
            let style = b
                .take("style")
                .map(|a| beat_style(&a))
                .transpose()?
                .unwrap_or_default();
            let bars = b
                .take("bars")
                .map(|a| whole_bars(&a))
                .transpose()?
                .unwrap_or(DEFAULT_BEAT_BARS);
            scope.declare(&name, name_arg.pos)?;
            scope.tracks.push(name.clone());
            Op::Beat { name, style, bars }
        }
        OpKind::Region => {
            let name_arg = b.required("name")?;
            let name = declared_name(&name_arg)?;
            let of = reference(&b.required("of")?, scope)?;
            let start = time(&b.required("start")?)?;
            let end = match (b.take("end"), b.take("duration")) {
                (Some(e), None) => RegionEnd::End(time(&e)?),
                (None, Some(d)) => RegionEnd::Duration(time(&d)?),
                (Some(_), Some(d)) => {
                    return Err(CompileError::argument(
                        "region takes either 'end' or 'duration', not both",
                        d.pos.line,
                        d.pos.col,
                    ));
                }
                (None, None) => {
                    return Err(CompileError::argument(
                        "region requires 'end' or 'duration'",
                        pos.line,
                        pos.col,
                    ));
                }
            };
            scope.declare(&name, name_arg.pos)?;
            Op::Region {
                name,
                of,
                start,
                end,
            }
        }
        OpKind::Export => Op::Export {
            file: text(&b.required("file")?, "a file name")?,
        },
        _ => {
            let target = reference(&b.required("target")?, scope)?;
            resolve_targeted(kind, target, &mut b)?
        }
    };
    b.finish()?;
    Ok(Operation::new(op, pos))
}

fn resolve_targeted(kind: OpKind, target: String, b: &mut Bound) -> Result<Op, CompileError> {
    Ok(match kind {
        OpKind::Play => Op::Play {
            target,
            at: b
                .take("at")
                .map(|a| time(&a))
                .transpose()?
                .unwrap_or(TimeValue::seconds(0.0)),
        },
        OpKind::Mute => Op::Mute { target },
        OpKind::Solo => Op::Solo { target },
        OpKind::Reverse => Op::Reverse { target },
        OpKind::Gain => Op::Gain {
            target,
            db: quantity(&b.required("db")?, &[Unit::Db])?,
        },
        OpKind::Pan => Op::Pan {
            target,
            value: in_range(&b.required("value")?, -1.0, 1.0)?,
        },
        OpKind::FadeIn => Op::FadeIn {
            target,
            seconds: time(&b.required("seconds")?)?,
        },
        OpKind::FadeOut => Op::FadeOut {
            target,
            seconds: time(&b.required("seconds")?)?,
        },
        OpKind::Loop => Op::Loop {
            target,
            bars: whole_bars(&b.required("bars")?)?,
        },
        OpKind::Trim => Op::Trim {
            target,
            bars: whole_bars(&b.required("bars")?)?,
        },
        OpKind::Pitch => {
            let arg = b.required("semis")?;
            let semis = quantity(&arg, &[Unit::Semis])?;
            if semis.is_nan() || semis.abs() > MAX_PITCH_SEMIS {
                return Err(CompileError::literal(
                    format!("pitch shift must be within ±{MAX_PITCH_SEMIS} semitones, got {semis}"),
                    arg.pos.line,
                    arg.pos.col,
                ));
            }
            Op::Pitch { target, semis }
        }
        OpKind::Reverb => Op::Reverb {
            target,
            amount: in_range(&b.required("amount")?, 0.0, 1.0)?,
        },
        OpKind::Delay => {
            let time_arg = b.required("time")?;
            let time = match resolved(&time_arg)? {
                ArgValue::Fraction(f) if f > 0.0 => DelayTime::BarFraction(f),
                _ => DelayTime::Time(time(&time_arg)?),
            };
            let feedback = b
                .take("feedback")
                .map(|a| in_range(&a, 0.0, 1.0))
                .transpose()?
                .unwrap_or(0.3);
            let mix = b
                .take("mix")
                .map(|a| in_range(&a, 0.0, 1.0))
                .transpose()?
                .unwrap_or(0.25);
            Op::Delay {
                target,
                time,
                feedback,
                mix,
            }
        }
        OpKind::Lowpass => Op::Lowpass {
            target,
            freq: frequency(&b.required("freq")?)?,
        },
        OpKind::Highpass => Op::Highpass {
            target,
            freq: frequency(&b.required("freq")?)?,
        },
        OpKind::Normalize => {
            let headroom = match b.take("headroom") {
                Some(a) => quantity(&a, &[Unit::Db])?,
                None => 0.1,
            };
            if headroom < 0.0 {
                return Err(CompileError::literal(
                    format!("headroom must not be negative, got {headroom}"),
                    b.pos.line,
                    b.pos.col,
                ));
            }
            Op::Normalize { target, headroom }
        }
        OpKind::Set | OpKind::Load | OpKind::Beat | OpKind::Region | OpKind::Export => {
            unreachable!("{kind} has no target")
        }
    })
}

/// Arguments matched to parameter slots.
struct Bound {
    kind: OpKind,
    params: &'static [&'static str],
    slots: Vec<Option<Arg>>,
    pos: SourcePos,
}

impl Bound {
    fn bind(
        kind: OpKind,
        params: &'static [&'static str],
        args: Vec<Arg>,
        pos: SourcePos,
    ) -> Result<Self, CompileError> {
        let mut slots: Vec<Option<Arg>> = vec![None; params.len()];
        let mut next_positional = 0;
        let mut seen_named = false;

        for arg in args {
            let idx = match &arg.name {
                None => {
                    if seen_named {
                        return Err(CompileError::argument(
                            "positional argument follows a named one",
                            arg.pos.line,
                            arg.pos.col,
                        ));
                    }
                    if next_positional >= params.len() {
                        return Err(CompileError::argument(
                            format!(
                                "too many arguments: {kind} takes at most {}",
                                params.len()
                            ),
                            arg.pos.line,
                            arg.pos.col,
                        ));
                    }
                    next_positional += 1;
                    next_positional - 1
                }
                Some(name) => {
                    seen_named = true;
                    params.iter().position(|p| p == name).ok_or_else(|| {
                        CompileError::argument(
                            format!("{kind} has no parameter '{name}'"),
                            arg.pos.line,
                            arg.pos.col,
                        )
                        .with_suggestion(nearest(name, params.iter().copied()))
                    })?
                }
            };
            if slots[idx].is_some() {
                return Err(CompileError::argument(
                    format!("'{}' is given more than once", params[idx]),
                    arg.pos.line,
                    arg.pos.col,
                ));
            }
            slots[idx] = Some(arg);
        }

        Ok(Self {
            kind,
            params,
            slots,
            pos,
        })
    }

    fn take(&mut self, param: &str) -> Option<Arg> {
        let idx = self.params.iter().position(|p| *p == param)?;
        self.slots[idx].take()
    }

    fn required(&mut self, param: &str) -> Result<Arg, CompileError> {
        self.take(param).ok_or_else(|| {
            CompileError::argument(
                format!("{} requires '{param}'", self.kind),
                self.pos.line,
                self.pos.col,
            )
        })
    }

    /// Every bound argument must have been consumed.
    fn finish(self) -> Result<(), CompileError> {
        match self.slots.into_iter().flatten().next() {
            Some(arg) => Err(CompileError::argument(
                format!("unexpected argument for {}", self.kind),
                arg.pos.line,
                arg.pos.col,
            )),
            None => Ok(()),
        }
    }
}

/// YAML strings are re-read with the DSL literal rules.
fn resolved(arg: &Arg) -> Result<ArgValue, CompileError> {
    match &arg.value {
        ArgValue::Text(s) => parse_literal(s, arg.pos),
        other => Ok(other.clone()),
    }
}

fn mismatch(arg: &Arg, expected: &str) -> CompileError {
    CompileError::literal(
        format!("expected {expected}, got {}", arg.value.describe()),
        arg.pos.line,
        arg.pos.col,
    )
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn declared_name(arg: &Arg) -> Result<String, CompileError> {
    match &arg.value {
        ArgValue::Ident(s) => Ok(s.clone()),
        ArgValue::Text(s) if is_identifier(s) => Ok(s.clone()),
        _ => Err(mismatch(arg, "a track or region name")),
    }
}

fn reference(arg: &Arg, scope: &Scope) -> Result<String, CompileError> {
    let name = declared_name(arg)?;
    scope.check(&name, arg.pos)?;
    Ok(name)
}

fn text(arg: &Arg, expected: &str) -> Result<String, CompileError> {
    match &arg.value {
        ArgValue::Str(s) | ArgValue::Text(s) => printable(s, arg),
        _ => Err(mismatch(arg, expected)),
    }
}

/// A free-form label such as a key name; bare identifiers are accepted.
fn label(arg: &Arg) -> Result<String, CompileError> {
    match &arg.value {
        ArgValue::Str(s) | ArgValue::Text(s) | ArgValue::Ident(s) => printable(s, arg),
        _ => Err(mismatch(arg, "a key name")),
    }
}

/// Strings may hold tabs and line breaks, which DSL text writes as
/// escapes. Other control characters have no DSL spelling.
fn printable(s: &str, arg: &Arg) -> Result<String, CompileError> {
    match s.chars().find(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t')) {
        Some(c) => Err(CompileError::literal(
            format!("string contains control character {c:?}"),
            arg.pos.line,
            arg.pos.col,
        )),
        None => Ok(s.to_string()),
    }
}

fn beat_style(arg: &Arg) -> Result<BeatStyle, CompileError> {
    let name = match &arg.value {
        ArgValue::Str(s) | ArgValue::Text(s) | ArgValue::Ident(s) => s,
        _ => return Err(mismatch(arg, "a beat style")),
    };
    BeatStyle::from_name(name).ok_or_else(|| {
        CompileError::argument(
            format!("unknown beat style '{name}'"),
            arg.pos.line,
            arg.pos.col,
        )
        .with_suggestion(nearest(name, BeatStyle::ALL.iter().map(|s| s.name())))
    })
}

/// A number, optionally carrying one of `units`. kHz is scaled to Hz.
fn quantity(arg: &Arg, units: &[Unit]) -> Result<f64, CompileError> {
    let expected = match units {
        [] => "a number".to_string(),
        _ => format!(
            "a number or {}",
            units.iter().map(|u| u.suffix()).collect::<Vec<_>>().join("/")
        ),
    };
    match resolved(arg)? {
        ArgValue::Number(n) => Ok(n),
        ArgValue::Quantity(n, u) if units.contains(&u) => Ok(match u {
            Unit::KHz => n * 1000.0,
            _ => n,
        }),
        _ => Err(mismatch(arg, &expected)),
    }
}

fn in_range(arg: &Arg, lo: f64, hi: f64) -> Result<f64, CompileError> {
    let v = quantity(arg, &[])?;
    if v < lo || v > hi {
        return Err(CompileError::literal(
            format!("{v} is outside {lo}..={hi}"),
            arg.pos.line,
            arg.pos.col,
        ));
    }
    Ok(v)
}

fn frequency(arg: &Arg) -> Result<f64, CompileError> {
    let hz = quantity(arg, &[Unit::Hz, Unit::KHz])?;
    if hz <= 0.0 {
        return Err(CompileError::literal(
            format!("frequency must be positive, got {hz}"),
            arg.pos.line,
            arg.pos.col,
        ));
    }
    Ok(hz)
}

fn tempo(arg: &Arg) -> Result<f64, CompileError> {
    let bpm = quantity(arg, &[])?;
    if !(bpm > 0.0 && bpm.is_finite()) {
        return Err(CompileError::new(
            ErrorKind::InvalidTimeValue,
            format!("tempo must be positive, got {bpm}"),
            arg.pos.line,
            arg.pos.col,
        ));
    }
    Ok(bpm)
}

fn whole_bars(arg: &Arg) -> Result<u32, CompileError> {
    let n = quantity(arg, &[])?;
    if !(1.0..=MAX_BARS as f64).contains(&n) || n.fract() != 0.0 {
        return Err(CompileError::literal(
            format!("bar count must be a whole number in 1..={MAX_BARS}, got {n}"),
            arg.pos.line,
            arg.pos.col,
        ));
    }
    Ok(n as u32)
}

/// A time offset: `2s`, `250ms`, `bar(n)`, `beat(n)`, or a bare number of seconds.
fn time(arg: &Arg) -> Result<TimeValue, CompileError> {
    let tv = match resolved(arg)? {
        ArgValue::Number(n) => TimeValue::seconds(n),
        ArgValue::Quantity(n, Unit::Seconds) => TimeValue::seconds(n),
        ArgValue::Quantity(n, Unit::Millis) => TimeValue::new(n, TimeUnit::Millis),
        ArgValue::Time(t) => t,
        _ => return Err(mismatch(arg, "a time (s, ms, bar(n) or beat(n))")),
    };
    if !(tv.value >= 0.0 && tv.value.is_finite()) {
        return Err(CompileError::new(
            ErrorKind::InvalidTimeValue,
            format!("time '{tv}' must not be negative"),
            arg.pos.line,
            arg.pos.col,
        ));
    }
    Ok(tv)
}
