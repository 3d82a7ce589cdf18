use crate::device::Kernel;
use crate::effects::descriptor::{ParamValue, Params};
use crate::effects::registry::EffectKind;
use crate::effects::{Capability, Effect, EffectFailure};
use crate::foundation::core::{AudioChunk, UnitContext, peak_abs};

/// Impulse taps below this weight are dropped from the reverb kernel.
const REVERB_TAIL_EPSILON: f64 = 1e-6;
const BASS_CUTOFF_HZ: f64 = 150.0;

/// Instantiated audio effect with coerced parameters.
///
/// Intensity-driven effects take `intensity` in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub enum AudioEffect {
    /// `x * gain`.
    Gain {
        /// Linear gain.
        gain: f64,
    },
    /// `x * 0.5 * (1 + sin(2π f t))`, with `t` measured from the start of the stream.
    Tremolo {
        /// Modulation frequency in Hz.
        frequency: f64,
    },
    /// One repeat delayed by `0.1 + 0.3 * intensity` seconds.
    Echo {
        /// Delay and feedback amount.
        intensity: f64,
    },
    /// Dry/wet blend with an exponentially decaying impulse.
    Reverb {
        /// Decay and wet amount.
        intensity: f64,
    },
    /// Threshold `0.5 - 0.3 i`, ratio `1 + 3 i`.
    Compression {
        /// Compression amount.
        intensity: f64,
    },
    /// Scale the chunk so its peak equals `0.3 + 0.7 * intensity`.
    Normalize {
        /// Target level.
        intensity: f64,
    },
    /// Add `2 * intensity` times the content below 150 Hz.
    BassBoost {
        /// Boost amount.
        intensity: f64,
    },
    /// Resample by `0.5 + intensity`, keeping the chunk length.
    PitchShift {
        /// Shift amount; 0.5 leaves the pitch unchanged.
        intensity: f64,
    },
}

impl AudioEffect {
    /// Registry kind of this effect.
    pub fn kind(&self) -> EffectKind {
        match self {
            Self::Gain { .. } => EffectKind::Gain,
            Self::Tremolo { .. } => EffectKind::Tremolo,
            Self::Echo { .. } => EffectKind::Echo,
            Self::Reverb { .. } => EffectKind::Reverb,
            Self::Compression { .. } => EffectKind::Compression,
            Self::Normalize { .. } => EffectKind::Normalize,
            Self::BassBoost { .. } => EffectKind::BassBoost,
            Self::PitchShift { .. } => EffectKind::PitchShift,
        }
    }

    fn require_rate(&self, ctx: &UnitContext) -> Result<f64, EffectFailure> {
        if ctx.sample_rate == 0 {
            return Err(EffectFailure::new(format!(
                "{} needs a non-zero sample rate",
                self.kind().name()
            )));
        }
        Ok(f64::from(ctx.sample_rate))
    }
}

impl Effect<AudioChunk> for AudioEffect {
    fn name(&self) -> &str {
        self.kind().name()
    }

    fn apply(&self, mut input: AudioChunk, ctx: &UnitContext) -> Result<AudioChunk, EffectFailure> {
        match *self {
            Self::Gain { gain } => {
                Kernel::Gain {
                    factor: gain as f32,
                }
                .run_host(&mut input);
                Ok(input)
            }
            Self::Tremolo { frequency } => {
                self.require_rate(ctx)?;
                Kernel::tremolo(frequency as f32, ctx.sample_rate, ctx.offset).run_host(&mut input);
                Ok(input)
            }
            Self::Echo { intensity } => {
                let sr = self.require_rate(ctx)?;
                Ok(echo(input, sr, intensity))
            }
            Self::Reverb { intensity } => {
                let sr = self.require_rate(ctx)?;
                Ok(reverb(&input, sr, intensity))
            }
            Self::Compression { intensity } => {
                compress(&mut input, intensity);
                Ok(input)
            }
            Self::Normalize { intensity } => {
                let peak = peak_abs(&input);
                if peak > 0.0 {
                    let target = 0.3 + 0.7 * intensity as f32;
                    let scale = target / peak;
                    for s in input.iter_mut() {
                        *s *= scale;
                    }
                }
                Ok(input)
            }
            Self::BassBoost { intensity } => {
                let sr = self.require_rate(ctx)?;
                Ok(bass_boost(input, sr, intensity))
            }
            Self::PitchShift { intensity } => Ok(pitch_shift(&input, 0.5 + intensity)),
        }
    }

    fn capability(&self, _len: usize, ctx: &UnitContext) -> Capability {
        match *self {
            Self::Gain { gain } => Capability::DualPath(Kernel::Gain {
                factor: gain as f32,
            }),
            // Without a rate the host path reports the failure.
            Self::Tremolo { frequency } if ctx.sample_rate > 0 => Capability::DualPath(
                Kernel::tremolo(frequency as f32, ctx.sample_rate, ctx.offset),
            ),
            _ => Capability::HostOnly,
        }
    }

    fn params(&self) -> Params {
        let (name, value) = match *self {
            Self::Gain { gain } => ("gain", gain),
            Self::Tremolo { frequency } => ("frequency", frequency),
            Self::Echo { intensity }
            | Self::Reverb { intensity }
            | Self::Compression { intensity }
            | Self::Normalize { intensity }
            | Self::BassBoost { intensity }
            | Self::PitchShift { intensity } => ("intensity", intensity),
        };
        let mut p = Params::default();
        p.set(name, ParamValue::Float(value));
        p
    }
}

fn echo(mut x: AudioChunk, sr: f64, intensity: f64) -> AudioChunk {
    let len = x.len();
    let mut delay = (sr * (0.1 + 0.3 * intensity)) as usize;
    if delay >= len {
        delay = len / 4;
    }
    if delay == 0 {
        return x;
    }
    let mix = (intensity * 0.7) as f32;
    // Walk backwards so each read sees the dry sample.
    for n in (delay..len).rev() {
        x[n] += x[n - delay] * mix;
    }
    x
}

fn reverb_impulse(sr: f64, intensity: f64, len: usize) -> Vec<f32> {
    let mut taps = (sr * (0.1 + 0.3 * intensity)) as usize;
    if taps >= len {
        taps = len / 4;
    }
    let decay = 0.1 + 0.5 * intensity;
    let tail = ((-REVERB_TAIL_EPSILON.ln()) / decay).ceil() as usize + 1;
    let taps = taps.min(tail);
    let raw: Vec<f64> = (0..taps).map(|k| (-decay * k as f64).exp()).collect();
    let sum: f64 = raw.iter().sum();
    if sum <= 0.0 {
        return Vec::new();
    }
    raw.into_iter().map(|v| (v / sum) as f32).collect()
}

fn reverb(x: &[f32], sr: f64, intensity: f64) -> AudioChunk {
    let impulse = reverb_impulse(sr, intensity, x.len());
    if impulse.is_empty() {
        return x.to_vec();
    }
    let wet_mix = intensity as f32;
    let dry_mix = 1.0 - wet_mix;
    (0..x.len())
        .map(|n| {
            let wet: f32 = impulse
                .iter()
                .take(n + 1)
                .enumerate()
                .map(|(k, h)| h * x[n - k])
                .sum();
            dry_mix * x[n] + wet_mix * wet
        })
        .collect()
}

fn compress(x: &mut [f32], intensity: f64) {
    let threshold = (0.5 - 0.3 * intensity) as f32;
    let ratio = (1.0 + 3.0 * intensity) as f32;
    for s in x.iter_mut() {
        let mag = s.abs();
        if mag > threshold {
            *s = s.signum() * (threshold + (mag - threshold) / ratio);
        }
    }
}

fn bass_boost(mut x: AudioChunk, sr: f64, intensity: f64) -> AudioChunk {
    if x.is_empty() {
        return x;
    }
    // One-pole lowpass run forward then backward for zero phase shift.
    let alpha = (1.0 - (-std::f64::consts::TAU * BASS_CUTOFF_HZ / sr).exp()) as f32;
    let mut bass = Vec::with_capacity(x.len());
    let mut y = x[0];
    for &s in &x {
        y += alpha * (s - y);
        bass.push(y);
    }
    let mut y = bass[bass.len() - 1];
    for b in bass.iter_mut().rev() {
        y += alpha * (*b - y);
        *b = y;
    }
    let boost = (2.0 * intensity) as f32;
    for (s, b) in x.iter_mut().zip(&bass) {
        *s += b * boost;
    }
    x
}

fn pitch_shift(x: &[f32], factor: f64) -> AudioChunk {
    let len = x.len();
    if len < 2 || factor <= 0.0 {
        return x.to_vec();
    }
    let resampled_len = (len as f64 / factor) as usize;
    let mut out = Vec::with_capacity(len);
    for n in 0..resampled_len.min(len) {
        let pos = n as f64 * factor;
        let i = pos.floor() as usize;
        let frac = (pos - i as f64) as f32;
        let a = x[i.min(len - 1)];
        let b = x[(i + 1).min(len - 1)];
        out.push(a + (b - a) * frac);
    }
    out.resize(len, 0.0);
    out
}

#[cfg(test)]
#[path = "../../tests/unit/effects/audio.rs"]
mod tests;
