//! Rule-based prompt → recipe translation.
//!
//! Recognises a handful of English phrases and emits DSL text for them.
//! The output is ordinary recipe source; callers compile it like any
//! other recipe.

use once_cell::sync::Lazy;
use regex::Regex;

static SET_BPM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)set\s+bpm\s+to\s+(\d+(?:\.\d+)?)").unwrap());
static KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)key\s+to\s+([^,.\n]+)").unwrap());
static LOAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)load\s+([A-Za-z_]\w*)\s+from\s+['"]([^'"]+)['"]"#).unwrap()
});
static BEAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(hip\s*-?\s*hop|house|break\s*beat)\s+beat\b").unwrap()
});
static LOOP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)loop\s+([A-Za-z_]\w*)\s+for\s+(\d+)\s+bars?").unwrap());
static GAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)gain\s+([A-Za-z_]\w*)\s+by\s+(-?\d+(?:\.\d+)?)\s*db").unwrap()
});
static FADE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)fade\s+(in|out)\s+([A-Za-z_]\w*)\s+over\s+(\d+(?:\.\d+)?)\s+seconds?")
        .unwrap()
});
static REVERB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)add\s+reverb\s+to\s+([A-Za-z_]\w*)").unwrap());
static EXPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)export\s+to\s+['"]([^'"]+)['"]"#).unwrap());

/// Reverb amount used for "add reverb to T".
const PROMPT_REVERB_AMOUNT: f64 = 0.5;

/// Track declared by "a hip hop beat" and friends.
const PROMPT_BEAT_TRACK: &str = "drums";
const PROMPT_BEAT_BARS: u32 = 4;

/// Translate `prompt` into recipe source.
///
/// Statements come out grouped by kind (set, load, beat, loop, gain, fade,
/// reverb, export), each group in prompt order. Only the first beat phrase
/// counts, since every beat declares the same track. When nothing is
/// recognised the result is a comment block quoting the prompt, which
/// compiles to an empty recipe.
pub fn prompt_to_recipe(prompt: &str) -> String {
    let mut lines = Vec::new();

    let bpm = SET_BPM.captures(prompt).map(|c| format!("bpm={}", &c[1]));
    let key = KEY.captures(prompt).and_then(|c| {
        let key = c[1].trim().replace(['"', '\\'], "");
        (!key.is_empty()).then(|| format!("key=\"{key}\""))
    });
    let set_args: Vec<String> = bpm.into_iter().chain(key).collect();
    if !set_args.is_empty() {
        lines.push(format!("set({})", set_args.join(", ")));
    }

    for c in LOAD.captures_iter(prompt) {
        lines.push(format!("load {} from \"{}\"", &c[1], &c[2]));
    }
    if let Some(c) = BEAT.captures(prompt) {
        let words: String = c[1].chars().filter(|ch| ch.is_alphabetic()).collect();
        lines.push(format!(
            "beat({PROMPT_BEAT_TRACK}, style=\"{}\", bars={PROMPT_BEAT_BARS})",
            words.to_lowercase()
        ));
    }
    for c in LOOP.captures_iter(prompt) {
        lines.push(format!("loop({}, bars={})", &c[1], &c[2]));
    }
    for c in GAIN.captures_iter(prompt) {
        lines.push(format!("gain({}, {}dB)", &c[1], &c[2]));
    }
    for c in FADE.captures_iter(prompt) {
        let op = if c[1].eq_ignore_ascii_case("in") {
            "fadeIn"
        } else {
            "fadeOut"
        };
        lines.push(format!("{op}({}, seconds={}s)", &c[2], &c[3]));
    }
    for c in REVERB.captures_iter(prompt) {
        lines.push(format!("reverb({}, amount={PROMPT_REVERB_AMOUNT})", &c[1]));
    }
    for c in EXPORT.captures_iter(prompt) {
        lines.push(format!("export(\"{}\")", &c[1]));
    }

    if lines.is_empty() {
        let mut out = String::from("# no recognised instructions\n");
        for line in prompt.lines() {
            out.push_str("# prompt: ");
            out.push_str(line);
            out.push('\n');
        }
        return out;
    }

    tracing::debug!(statements = lines.len(), "translated prompt");
    lines.join("\n")
}
