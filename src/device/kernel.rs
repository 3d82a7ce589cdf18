use std::f32::consts::TAU;

/// Element-wise transforms a [`ComputeDevice`](crate::ComputeDevice) can run in place on an
/// `f32` buffer.
///
/// Every kernel has a host reference implementation ([`Kernel::run_host`]); device backends
/// must match it within floating-point tolerance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Kernel {
    /// Multiply every element by `factor`.
    Gain {
        /// Linear gain.
        factor: f32,
    },
    /// Amplitude modulation `x * 0.5 * (1 + sin(2π (phase0 + i * step)))`.
    Tremolo {
        /// Phase (in cycles) of element 0, already reduced to `[0, 1)`.
        phase0: f32,
        /// Phase advance per element (cycles).
        step: f32,
    },
    /// Gaussian vignette over interleaved RGBA values; alpha is untouched.
    Vignette {
        /// Frame width in pixels.
        width: u32,
        /// Frame height in pixels.
        height: u32,
        /// Mix between no darkening (0) and the full mask (1).
        strength: f32,
    },
}

impl Kernel {
    /// Tremolo kernel for a unit starting at absolute sample `start_sample`.
    ///
    /// The phase is derived from the absolute position so adjacent units join seamlessly.
    pub fn tremolo(frequency_hz: f32, sample_rate: u32, start_sample: u64) -> Self {
        let step = f64::from(frequency_hz) / f64::from(sample_rate.max(1));
        let phase0 = (start_sample as f64 * step).fract();
        Self::Tremolo {
            phase0: phase0 as f32,
            step: step as f32,
        }
    }

    /// Short stable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gain { .. } => "gain",
            Self::Tremolo { .. } => "tremolo",
            Self::Vignette { .. } => "vignette",
        }
    }

    /// Host reference implementation.
    pub fn run_host(&self, data: &mut [f32]) {
        match *self {
            Self::Gain { factor } => {
                for v in data.iter_mut() {
                    *v *= factor;
                }
            }
            Self::Tremolo { phase0, step } => {
                for (i, v) in data.iter_mut().enumerate() {
                    let phase = phase0 + i as f32 * step;
                    *v *= 0.5 * (1.0 + (TAU * phase).sin());
                }
            }
            Self::Vignette {
                width,
                height,
                strength,
            } => {
                if width == 0 || height == 0 {
                    return;
                }
                let gx: Vec<f32> = (0..width).map(|x| axis_weight(x as f32, width)).collect();
                let gy: Vec<f32> = (0..height).map(|y| axis_weight(y as f32, height)).collect();
                for (p, px) in data.chunks_exact_mut(4).enumerate() {
                    let x = p % width as usize;
                    let y = p / width as usize;
                    let Some(wy) = gy.get(y) else {
                        break;
                    };
                    let mask = (1.0 - strength) + gx[x] * wy * strength;
                    for c in &mut px[..3] {
                        *c *= mask;
                    }
                }
            }
        }
    }
}

/// Separable Gaussian weight along one axis, normalized so the peak sample is 1.
///
/// Sigma is half the axis length; even lengths peak half a pixel off centre.
pub(crate) fn axis_weight(v: f32, n: u32) -> f32 {
    let nf = n as f32;
    let sigma = nf * 0.5;
    let center = (nf - 1.0) * 0.5;
    let dmin = if n.is_multiple_of(2) { 0.5 } else { 0.0 };
    let d = v - center;
    (-(d * d - dmin * dmin) / (2.0 * sigma * sigma)).exp()
}

#[cfg(test)]
#[path = "../../tests/unit/device/kernel.rs"]
mod tests;
