//! Drum machine behind `beat` nodes: kick, snare and hat voices on a
//! 16-step grid.

use std::f64::consts::PI;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::effects::{self, Voice};
use crate::dsl::ast::BeatStyle;

pub const STEPS_PER_BAR: usize = 16;

/// Peak level of a rendered pattern, in dB below full scale.
const HEADROOM_DB: f64 = 1.5;

const SNARE_SEED: u64 = 42;
const HAT_SEED: u64 = 99;

/// One bar per drum; `x` marks a hit.
struct Pattern {
    kick: &'static str,
    snare: &'static str,
    hat: &'static str,
}

const HOUSE: Pattern = Pattern {
    kick: "x...x...x...x...",
    snare: "....x.......x...",
    hat: ".x.x.x.x.x.x.x.x",
};

const HIPHOP: Pattern = Pattern {
    kick: "x.....x....x..x.",
    snare: "....x.......x...",
    hat: ".x..x..x.x..x..x",
};

const BREAKBEAT: Pattern = Pattern {
    kick: "x..x..x.x..x.x..",
    snare: "..x..x....x..x..",
    hat: ".xxx.xxx.xxx.xxx",
};

fn pattern(style: BeatStyle) -> &'static Pattern {
    match style {
        BeatStyle::House => &HOUSE,
        BeatStyle::HipHop => &HIPHOP,
        BeatStyle::Breakbeat => &BREAKBEAT,
    }
}

/// Render `bars` bars of `style`, each `bar_seconds` long. The result is
/// exactly `bars * bar_seconds` long; hits running past the end are cut.
pub fn render_beat(style: BeatStyle, bars: u32, bar_seconds: f64, sample_rate: u32) -> Vec<f32> {
    let sr = sample_rate.max(1);
    let frames = (bars as f64 * bar_seconds * sr as f64).round().max(0.0) as usize;
    let step = bar_seconds / STEPS_PER_BAR as f64;
    let p = pattern(style);

    let mut out = vec![0.0f32; frames];
    for (hit, grid) in [(kick(sr), p.kick), (snare(sr), p.snare), (hat(sr), p.hat)] {
        for bar in 0..bars as usize {
            for (i, _) in grid.bytes().enumerate().filter(|(_, c)| *c == b'x') {
                let at = ((bar * STEPS_PER_BAR + i) as f64 * step * sr as f64).round() as usize;
                overlay(&mut out, &hit, at);
            }
        }
    }

    let mut voice = Voice::new(out, sr);
    effects::normalize(&mut voice, HEADROOM_DB);
    tracing::trace!(%style, bars, frames, "rendered beat");
    voice.samples
}

fn overlay(out: &mut [f32], hit: &[f32], at: usize) {
    if let Some(tail) = out.get_mut(at..) {
        for (o, h) in tail.iter_mut().zip(hit) {
            *o += h;
        }
    }
}

fn frames(seconds: f64, sample_rate: u32) -> usize {
    (seconds * sample_rate as f64) as usize
}

/// Position of sample `i` of `n` on `[0, 1]`.
fn unit_ramp(i: usize, n: usize) -> f64 {
    if n > 1 {
        i as f64 / (n - 1) as f64
    } else {
        0.0
    }
}

/// 240 ms sine sweeping 120 Hz down to 50 Hz.
fn kick(sample_rate: u32) -> Vec<f32> {
    let n = frames(0.24, sample_rate);
    let sr = sample_rate as f64;
    let t_max = n.saturating_sub(1).max(1) as f64 / sr;
    let samples = (0..n)
        .map(|i| {
            let t = i as f64 / sr;
            let freq = 120.0 * (50.0f64 / 120.0).powf(t / t_max);
            ((2.0 * PI * freq * t).sin() * (-6.0 * t).exp()) as f32
        })
        .collect();
    let mut voice = Voice::new(samples, sample_rate);
    effects::fade_out(&mut voice, 0.08);
    voice.samples
}

/// Decaying seeded noise through a high-pass.
fn noise_hit(
    sample_rate: u32,
    seconds: f64,
    seed: u64,
    decay: f64,
    cutoff: f64,
    fade: f64,
) -> Vec<f32> {
    let n = frames(seconds, sample_rate);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let samples = (0..n)
        .map(|i| {
            let noise: f64 = rng.gen_range(-1.0..1.0);
            (noise * (-decay * unit_ramp(i, n)).exp()) as f32
        })
        .collect();
    let mut voice = Voice::new(samples, sample_rate);
    effects::highpass(&mut voice, cutoff);
    effects::fade_out(&mut voice, fade);
    voice.samples
}

fn snare(sample_rate: u32) -> Vec<f32> {
    noise_hit(sample_rate, 0.18, SNARE_SEED, 10.0, 2000.0, 0.06)
}

fn hat(sample_rate: u32) -> Vec<f32> {
    noise_hit(sample_rate, 0.12, HAT_SEED, 12.0, 6000.0, 0.04)
}
