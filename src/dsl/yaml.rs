//! YAML form of a recipe.
//!
//! A YAML recipe is a sequence of mappings, one per statement, each with an
//! `action` key and the operation's field names:
//!
//! ```yaml
//! - action: set
//!   bpm: 84
//! - action: load
//!   name: drums
//!   path: kit.wav
//! - action: gain
//!   target: drums
//!   db: -2dB
//! ```
//!
//! String values are read with the DSL literal rules, so `"-2dB"`,
//! `"bar(4)"` and `"1/4"` mean what they mean in DSL text. Statements are
//! resolved by the same code as the DSL, so both forms accept and reject
//! exactly the same recipes.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use super::args::{resolve_call, Arg, ArgValue, Scope};
use super::ast::{DelayTime, Op, Operation, Recipe, RegionEnd, SourcePos, TimeValue};
use super::error::CompileError;
use crate::time::TimeUnit;

#[derive(Debug, Deserialize)]
struct YamlStatement {
    action: String,
    #[serde(flatten)]
    fields: BTreeMap<String, Value>,
}

/// Parse a YAML recipe. The n-th statement reports errors as line n.
pub fn parse_yaml(source: &str) -> Result<Recipe, CompileError> {
    let blank = source.lines().all(|l| {
        let l = l.trim();
        l.is_empty() || l.starts_with('#')
    });
    let statements: Vec<YamlStatement> = if blank {
        Vec::new()
    } else {
        serde_yaml::from_str::<Option<Vec<YamlStatement>>>(source)
            .map_err(|e| {
                let (line, col) = e
                    .location()
                    .map(|l| (l.line(), l.column()))
                    .unwrap_or((1, 1));
                CompileError::yaml(e.to_string(), line, col)
            })?
            .unwrap_or_default()
    };

    let mut scope = Scope::default();
    let mut operations = Vec::with_capacity(statements.len());

    for (idx, statement) in statements.into_iter().enumerate() {
        let pos = SourcePos::new(idx + 1, 1);
        let args = statement
            .fields
            .into_iter()
            .map(|(name, value)| Arg {
                name: Some(name),
                value: arg_value(value),
                pos,
            })
            .collect();
        operations.push(resolve_call(&statement.action, pos, args, &mut scope)?);
    }

    Ok(Recipe {
        operations,
        tracks: scope.tracks(),
    })
}

fn arg_value(value: Value) -> ArgValue {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) => ArgValue::Number(f),
            None => ArgValue::Other("an out-of-range number"),
        },
        Value::String(s) => ArgValue::Text(s),
        Value::Bool(_) => ArgValue::Other("a boolean"),
        Value::Null => ArgValue::Other("an empty value"),
        Value::Sequence(_) => ArgValue::Other("a list"),
        Value::Mapping(_) => ArgValue::Other("a mapping"),
        Value::Tagged(_) => ArgValue::Other("a tagged value"),
    }
}

/// Serialize operations to the YAML form.
pub fn to_yaml(operations: &[Operation]) -> Result<String, serde_yaml::Error> {
    let docs: Vec<Mapping> = operations.iter().map(|o| statement(&o.op)).collect();
    serde_yaml::to_string(&docs)
}

fn statement(op: &Op) -> Mapping {
    let mut m = Mapping::new();
    m.insert("action".into(), op.kind().name().into());
    let mut put = |key: &str, value: Value| {
        m.insert(key.into(), value);
    };

    match op {
        Op::Set { bpm, key } => {
            if let Some(bpm) = bpm {
                put("bpm", number(*bpm));
            }
            if let Some(key) = key {
                put("key", key.as_str().into());
            }
        }
        Op::Load { name, path } => {
            put("name", name.as_str().into());
            put("path", path.as_str().into());
        }
        Op::Beat { name, style, bars } => {
            put("name", name.as_str().into());
            put("style", style.name().into());
            put("bars", Value::Number((*bars).into()));
        }
        Op::Play { target, at } => {
            put("target", target.as_str().into());
            put("at", time(at));
        }
        Op::Mute { target } | Op::Solo { target } | Op::Reverse { target } => {
            put("target", target.as_str().into());
        }
        Op::Gain { target, db } => {
            put("target", target.as_str().into());
            put("db", number(*db));
        }
        Op::Pan { target, value } => {
            put("target", target.as_str().into());
            put("value", number(*value));
        }
        Op::FadeIn { target, seconds } | Op::FadeOut { target, seconds } => {
            put("target", target.as_str().into());
            put("seconds", time(seconds));
        }
        Op::Loop { target, bars } | Op::Trim { target, bars } => {
            put("target", target.as_str().into());
            put("bars", Value::Number((*bars).into()));
        }
        Op::Region {
            name,
            of,
            start,
            end,
        } => {
            put("name", name.as_str().into());
            put("of", of.as_str().into());
            put("start", time(start));
            match end {
                RegionEnd::End(t) => put("end", time(t)),
                RegionEnd::Duration(t) => put("duration", time(t)),
            }
        }
        Op::Pitch { target, semis } => {
            put("target", target.as_str().into());
            put("semis", number(*semis));
        }
        Op::Reverb { target, amount } => {
            put("target", target.as_str().into());
            put("amount", number(*amount));
        }
        Op::Delay {
            target,
            time: delay_time,
            feedback,
            mix,
        } => {
            put("target", target.as_str().into());
            put(
                "time",
                match delay_time {
                    DelayTime::Time(t) => time(t),
                    DelayTime::BarFraction(f) => fraction_text(*f).into(),
                },
            );
            put("feedback", number(*feedback));
            put("mix", number(*mix));
        }
        Op::Lowpass { target, freq } | Op::Highpass { target, freq } => {
            put("target", target.as_str().into());
            put("freq", number(*freq));
        }
        Op::Normalize { target, headroom } => {
            put("target", target.as_str().into());
            put("headroom", number(*headroom));
        }
        Op::Export { file } => {
            put("file", file.as_str().into());
        }
    }
    m
}

/// Whole numbers are written without a fractional part.
fn number(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Value::Number((v as i64).into())
    } else {
        Value::Number(v.into())
    }
}

fn time(t: &TimeValue) -> Value {
    match t.unit {
        TimeUnit::Seconds => number(t.value),
        _ => t.to_string().into(),
    }
}

/// `0.25` → `"1/4"`. Values with no small denominator fall back to the
/// equivalent `bar(n)`, which resolves to the same delay.
pub(crate) fn fraction_text(f: f64) -> String {
    for den in 1..=64u32 {
        let num = f * den as f64;
        if (num - num.round()).abs() < 1e-9 {
            return format!("{}/{den}", num.round() as i64);
        }
    }
    TimeValue::bars(f).to_string()
}
