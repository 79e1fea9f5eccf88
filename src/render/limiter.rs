//! Master limiter applied to every rendered mix.

/// Ceiling used when the config does not set one.
pub const DEFAULT_CEILING: f32 = 0.95;

/// Hard clamp to `[-ceiling, ceiling]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limiter {
    ceiling: f32,
}

impl Limiter {
    /// Out-of-range ceilings are clamped into `(0, 1]`.
    pub fn new(ceiling: f32) -> Self {
        let ceiling = if ceiling.is_finite() && ceiling > 0.0 {
            ceiling.min(1.0)
        } else {
            tracing::warn!(ceiling, "invalid limiter ceiling, using default");
            DEFAULT_CEILING
        };
        Self { ceiling }
    }

    #[inline]
    pub fn process(&self, sample: f32) -> f32 {
        sample.clamp(-self.ceiling, self.ceiling)
    }

    /// Clamp a buffer in place; returns how many samples were limited.
    pub fn process_block(&self, buffer: &mut [f32]) -> usize {
        let mut clipped = 0;
        for sample in buffer.iter_mut() {
            let limited = self.process(*sample);
            if limited != *sample {
                clipped += 1;
            }
            *sample = limited;
        }
        clipped
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self {
            ceiling: DEFAULT_CEILING,
        }
    }
}
