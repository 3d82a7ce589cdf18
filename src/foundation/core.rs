use serde::{Deserialize, Serialize};

use crate::foundation::error::{FxError, FxResult};

/// Stream kind an effect (and its chain) operates on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Mono `f32` sample chunks.
    Audio,
    /// Straight-alpha RGBA8 frames.
    Video,
}

impl Modality {
    /// Lowercase name used in presets and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio unit payload: a contiguous slice of mono samples.
pub type AudioChunk = Vec<f32>;

/// One independently processable slice of a stream.
///
/// Units are immutable once created: processing produces a new payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Unit<P> {
    /// Position of the unit in its stream, starting at 0.
    pub index: usize,
    /// Stream position of the first element (sample offset for audio, frame number for video).
    pub offset: u64,
    /// Unit data.
    pub payload: P,
}

impl<P> Unit<P> {
    /// Processing context for this unit.
    pub fn context(&self, sample_rate: u32) -> UnitContext {
        UnitContext {
            index: self.index,
            offset: self.offset,
            sample_rate,
        }
    }
}

/// Per-unit information handed to effects alongside the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnitContext {
    /// Unit index within the job.
    pub index: usize,
    /// Absolute stream position of the unit's first element.
    pub offset: u64,
    /// Sample rate in Hz (0 for video).
    pub sample_rate: u32,
}

/// Decoded RGBA8 video frame (straight alpha, row-major, tightly packed).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes.
    pub data: Vec<u8>,
}

impl Frame {
    /// Wrap raw RGBA8 bytes, checking the buffer length.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> FxResult<Self> {
        let expected = frame_len(width, height)?;
        if data.len() != expected {
            return Err(FxError::validation(format!(
                "frame buffer has {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Frame filled with a single RGBA color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let px = width as usize * height as usize;
        let mut data = Vec::with_capacity(px * 4);
        for _ in 0..px {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Convert into an `image` buffer for `imageops`-based effects.
    pub fn into_image(self) -> FxResult<image::RgbaImage> {
        let (w, h) = (self.width, self.height);
        image::RgbaImage::from_raw(w, h, self.data)
            .ok_or_else(|| FxError::validation(format!("frame buffer does not match {w}x{h}")))
    }

    /// Rebuild a frame from an `image` buffer.
    pub fn from_image(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }
}

/// Byte length of a `width x height` RGBA8 frame.
pub fn frame_len(width: u32, height: u32) -> FxResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| FxError::validation("frame size overflow"))
}

/// Whole audio track: mono samples at a fixed rate.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Mono samples in `[-1, 1]` nominal range.
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    /// Largest absolute sample value (0 for silence or empty buffers).
    pub fn peak(&self) -> f32 {
        peak_abs(&self.samples)
    }

    /// Duration in seconds.
    pub fn duration_sec(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f64 / f64::from(self.sample_rate)
        }
    }
}

/// Largest absolute value in `samples`, ignoring non-finite values.
pub fn peak_abs(samples: &[f32]) -> f32 {
    samples
        .iter()
        .filter(|s| s.is_finite())
        .fold(0.0f32, |acc, s| acc.max(s.abs()))
}

/// Rational frames-per-second value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fps {
    /// Numerator.
    pub num: u32,
    /// Denominator.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> FxResult<Self> {
        if num == 0 || den == 0 {
            return Err(FxError::validation("fps num/den must be non-zero"));
        }
        Ok(Self { num, den })
    }

    /// FPS as a float.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
