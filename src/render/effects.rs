//! Offline effect processing on mono voices.
//!
//! Every function works in place on a [`Voice`]. Lengths change only for
//! `loop`, `trim` and `pitch`.

use std::f32::consts::{FRAC_PI_4, PI};

use super::loader::resample_by_ratio;
use super::MAX_RENDER_SECONDS;
use crate::graph::{pitch_ratio, Effect, MAX_PITCH_SEMIS};

/// Early-reflection taps used by `reverb`, in seconds.
const REVERB_TAP: f64 = 0.03;
const REVERB_TAPS: usize = 3;

/// One node's audio on its way to the mix.
#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Stereo position in `[-1, 1]`, applied when mixing.
    pub pan: f32,
}

impl Voice {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            pan: 0.0,
        }
    }

    fn frames(&self, seconds: f64) -> usize {
        (seconds.min(MAX_RENDER_SECONDS) * self.sample_rate as f64)
            .round()
            .max(0.0) as usize
    }

    /// Constant-power gains for the left and right channels.
    pub fn pan_gains(&self) -> (f32, f32) {
        let angle = (self.pan.clamp(-1.0, 1.0) + 1.0) * FRAC_PI_4;
        (angle.cos(), angle.sin())
    }
}

pub fn apply(voice: &mut Voice, effect: &Effect) {
    match *effect {
        Effect::Loop { seconds, .. } => loop_to(voice, seconds),
        Effect::Trim { seconds, .. } => trim_to(voice, seconds),
        Effect::Gain { db } => gain(voice, db),
        Effect::Pan { value } => voice.pan = value as f32,
        Effect::FadeIn { seconds } => fade_in(voice, seconds),
        Effect::FadeOut { seconds } => fade_out(voice, seconds),
        Effect::Pitch { semis } => pitch(voice, semis),
        Effect::Reverb { amount } => reverb(voice, amount),
        Effect::Delay {
            seconds,
            feedback,
            mix,
        } => delay(voice, seconds, feedback, mix),
        Effect::Lowpass { freq } => lowpass(voice, freq),
        Effect::Highpass { freq } => highpass(voice, freq),
        Effect::Reverse => voice.samples.reverse(),
        Effect::Normalize { headroom } => normalize(voice, headroom),
    }
}

pub fn db_to_linear(db: f64) -> f32 {
    10f64.powf(db / 20.0) as f32
}

/// Repeat the input to exactly `seconds`. Silence in, silence out.
pub fn loop_to(voice: &mut Voice, seconds: f64) {
    let target = voice.frames(seconds);
    if voice.samples.is_empty() {
        voice.samples = vec![0.0; target];
        return;
    }
    let source = std::mem::take(&mut voice.samples);
    voice.samples = source.iter().copied().cycle().take(target).collect();
}

/// Cut (or pad with silence) to exactly `seconds`.
pub fn trim_to(voice: &mut Voice, seconds: f64) {
    let target = voice.frames(seconds);
    voice.samples.resize(target, 0.0);
}

pub fn gain(voice: &mut Voice, db: f64) {
    let g = db_to_linear(db);
    for s in voice.samples.iter_mut() {
        *s *= g;
    }
}

pub fn fade_in(voice: &mut Voice, seconds: f64) {
    let n = voice.frames(seconds).min(voice.samples.len());
    for (i, s) in voice.samples.iter_mut().take(n).enumerate() {
        *s *= i as f32 / n as f32;
    }
}

pub fn fade_out(voice: &mut Voice, seconds: f64) {
    let len = voice.samples.len();
    let n = voice.frames(seconds).min(len);
    for (i, s) in voice.samples[len - n..].iter_mut().enumerate() {
        *s *= (n - 1 - i) as f32 / n as f32;
    }
}

/// Varispeed pitch shift: up an octave plays twice as fast.
pub fn pitch(voice: &mut Voice, semis: f64) {
    if semis == 0.0 {
        return;
    }
    let ratio = pitch_ratio(semis.clamp(-MAX_PITCH_SEMIS, MAX_PITCH_SEMIS));
    voice.samples = resample_by_ratio(&voice.samples, ratio);
}

/// A few attenuated early reflections.
pub fn reverb(voice: &mut Voice, amount: f64) {
    let tap = voice.frames(REVERB_TAP).max(1);
    let dry = voice.samples.clone();
    for i in 1..=REVERB_TAPS {
        let offset = tap * i;
        if offset >= dry.len() {
            break;
        }
        let atten = (amount / (i as f64 + 1.0)) as f32;
        for (out, &x) in voice.samples[offset..].iter_mut().zip(&dry) {
            *out += x * atten;
        }
    }
}

/// Feedback delay, blended with the dry signal. No tail is added.
pub fn delay(voice: &mut Voice, seconds: f64, feedback: f64, mix: f64) {
    let d = voice.frames(seconds);
    if d == 0 || d >= voice.samples.len() {
        return;
    }
    let feedback = feedback as f32;
    let mix = mix as f32;
    let mut wet = vec![0.0f32; voice.samples.len()];
    for n in d..wet.len() {
        wet[n] = voice.samples[n - d] + feedback * wet[n - d];
    }
    for (s, w) in voice.samples.iter_mut().zip(wet) {
        *s = *s * (1.0 - mix) + w * mix;
    }
}

/// One-pole low-pass.
pub fn lowpass(voice: &mut Voice, freq: f64) {
    let dt = 1.0 / voice.sample_rate as f32;
    let rc = 1.0 / (2.0 * PI * freq as f32);
    let alpha = dt / (rc + dt);
    let mut y = 0.0f32;
    for s in voice.samples.iter_mut() {
        y += alpha * (*s - y);
        *s = y;
    }
}

/// One-pole high-pass.
pub fn highpass(voice: &mut Voice, freq: f64) {
    let dt = 1.0 / voice.sample_rate as f32;
    let rc = 1.0 / (2.0 * PI * freq as f32);
    let alpha = rc / (rc + dt);
    let mut prev_x = 0.0f32;
    let mut y = 0.0f32;
    for s in voice.samples.iter_mut() {
        let x = *s;
        y = alpha * (y + x - prev_x);
        prev_x = x;
        *s = y;
    }
}

/// Scale so the peak sits `headroom` dB below full scale.
pub fn normalize(voice: &mut Voice, headroom: f64) {
    let peak = peak(&voice.samples);
    if peak <= f32::EPSILON {
        return;
    }
    let g = db_to_linear(-headroom) / peak;
    for s in voice.samples.iter_mut() {
        *s *= g;
    }
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const SR: u32 = 8000;

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    fn sine(freq: f32, seconds: f32) -> Voice {
        let n = (seconds * SR as f32) as usize;
        Voice::new(
            (0..n)
                .map(|i| (2.0 * PI * freq * i as f32 / SR as f32).sin())
                .collect(),
            SR,
        )
    }

    #[test]
    fn loop_fills_exactly() {
        let mut v = Voice::new(vec![1.0, 2.0, 3.0], SR);
        loop_to(&mut v, 8.0 / SR as f64);
        assert_eq!(v.samples, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0, 2.0]);
    }

    #[test]
    fn loop_of_silence() {
        let mut v = Voice::new(vec![], SR);
        loop_to(&mut v, 1.0);
        assert_eq!(v.samples.len(), SR as usize);
    }

    #[test]
    fn trim_cuts_and_pads() {
        let mut v = Voice::new(vec![1.0; 10], SR);
        trim_to(&mut v, 4.0 / SR as f64);
        assert_eq!(v.samples, vec![1.0; 4]);
        trim_to(&mut v, 6.0 / SR as f64);
        assert_eq!(v.samples, vec![1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn gain_in_db() {
        let mut v = Voice::new(vec![1.0], SR);
        gain(&mut v, -6.0);
        assert_approx_eq!(v.samples[0], 0.501, 1e-3);
    }

    #[test]
    fn fades_reach_silence() {
        let mut v = Voice::new(vec![1.0; 100], SR);
        fade_in(&mut v, 10.0 / SR as f64);
        assert_eq!(v.samples[0], 0.0);
        assert!(v.samples[5] > 0.0 && v.samples[5] < 1.0);
        assert_eq!(v.samples[10], 1.0);

        let mut v = Voice::new(vec![1.0; 100], SR);
        fade_out(&mut v, 10.0 / SR as f64);
        assert_eq!(v.samples[89], 1.0);
        assert!(v.samples[95] < 1.0);
        assert_approx_eq!(v.samples[99], 0.0);
    }

    #[test]
    fn fade_longer_than_voice() {
        let mut v = Voice::new(vec![1.0; 4], SR);
        fade_out(&mut v, 1.0);
        assert_approx_eq!(v.samples[3], 0.0);
    }

    #[test]
    fn pitch_up_an_octave_halves_length() {
        let mut v = Voice::new(vec![0.0; 1000], SR);
        pitch(&mut v, 12.0);
        assert_eq!(v.samples.len(), 500);
    }

    #[test]
    fn extreme_pitch_is_clamped() {
        let mut v = Voice::new(vec![0.5; 100], SR);
        pitch(&mut v, -1200.0);
        assert_eq!(v.samples.len(), 1600);
        let mut v = Voice::new(vec![0.5; 100], SR);
        pitch(&mut v, f64::INFINITY);
        assert_eq!(v.samples.len(), 7);
    }

    #[test]
    fn loop_length_is_capped() {
        let mut v = Voice::new(vec![1.0, 0.0], 10);
        loop_to(&mut v, 1e12);
        assert_eq!(v.samples.len(), (MAX_RENDER_SECONDS * 10.0) as usize);
        trim_to(&mut v, f64::INFINITY);
        assert_eq!(v.samples.len(), (MAX_RENDER_SECONDS * 10.0) as usize);
    }

    #[test]
    fn reverb_adds_reflections() {
        let mut v = Voice::new(vec![0.0; 1000], SR);
        v.samples[0] = 1.0;
        reverb(&mut v, 0.5);
        let tap = (REVERB_TAP * SR as f64).round() as usize;
        assert_approx_eq!(v.samples[tap], 0.25);
        assert_approx_eq!(v.samples[2 * tap], 0.5 / 3.0);
    }

    #[test]
    fn delay_echoes_with_feedback() {
        let mut v = Voice::new(vec![0.0; 40], SR);
        v.samples[0] = 1.0;
        delay(&mut v, 10.0 / SR as f64, 0.5, 0.5);
        assert_approx_eq!(v.samples[0], 0.5);
        assert_approx_eq!(v.samples[10], 0.5);
        assert_approx_eq!(v.samples[20], 0.25);
        assert_approx_eq!(v.samples[30], 0.125);
    }

    #[test]
    fn lowpass_attenuates_highs() {
        let mut v = sine(3000.0, 0.5);
        let before = rms(&v.samples);
        lowpass(&mut v, 200.0);
        assert!(rms(&v.samples) < before * 0.2);
    }

    #[test]
    fn highpass_attenuates_lows() {
        let mut v = sine(20.0, 0.5);
        let before = rms(&v.samples);
        highpass(&mut v, 2000.0);
        assert!(rms(&v.samples) < before * 0.2);
    }

    #[test]
    fn normalize_to_headroom() {
        let mut v = Voice::new(vec![0.1, -0.25, 0.2], SR);
        normalize(&mut v, 0.0);
        assert_approx_eq!(peak(&v.samples), 1.0);
        normalize(&mut v, 6.0);
        assert_approx_eq!(peak(&v.samples), 0.501, 1e-3);
    }

    #[test]
    fn hard_left_silences_right() {
        let mut v = Voice::new(vec![1.0], SR);
        apply(&mut v, &Effect::Pan { value: -1.0 });
        let (l, r) = v.pan_gains();
        assert_approx_eq!(l, 1.0);
        assert!(r.abs() < 1e-6);
    }

    #[test]
    fn reverse() {
        let mut v = Voice::new(vec![1.0, 2.0, 3.0], SR);
        apply(&mut v, &Effect::Reverse);
        assert_eq!(v.samples, vec![3.0, 2.0, 1.0]);
    }
}
