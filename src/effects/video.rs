use image::imageops;

use crate::device::{DevicePayload, Kernel};
use crate::effects::descriptor::{ParamValue, Params};
use crate::effects::registry::EffectKind;
use crate::effects::{Capability, Effect, EffectFailure};
use crate::foundation::core::{Frame, UnitContext};
use crate::foundation::error::{FxError, FxResult};

/// Frames the light bar takes to sweep across the frame and back.
const LIGHT_BAR_PERIOD: u64 = 200;

/// Flip direction for [`VideoEffect::Mirror`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MirrorAxis {
    /// Swap left and right.
    Horizontal,
    /// Swap top and bottom.
    Vertical,
}

impl MirrorAxis {
    /// Parse a coerced `axis` choice.
    pub fn from_choice(s: &str) -> Self {
        match s {
            "vertical" => Self::Vertical,
            _ => Self::Horizontal,
        }
    }

    /// Choice string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
        }
    }
}

/// Target aspect ratio for [`VideoEffect::Crop`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CropRatio {
    /// 16:9 landscape.
    Landscape16x9,
    /// 9:16 portrait.
    Portrait9x16,
    /// 4:3.
    Standard4x3,
    /// 1:1.
    Square,
    /// 21:9 ultrawide.
    Ultrawide21x9,
}

impl CropRatio {
    /// Parse a coerced `ratio` choice.
    pub fn from_choice(s: &str) -> Self {
        match s {
            "9:16" => Self::Portrait9x16,
            "4:3" => Self::Standard4x3,
            "1:1" => Self::Square,
            "21:9" => Self::Ultrawide21x9,
            _ => Self::Landscape16x9,
        }
    }

    /// Choice string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landscape16x9 => "16:9",
            Self::Portrait9x16 => "9:16",
            Self::Standard4x3 => "4:3",
            Self::Square => "1:1",
            Self::Ultrawide21x9 => "21:9",
        }
    }

    /// `(width, height)` terms of the ratio.
    pub fn terms(self) -> (u64, u64) {
        match self {
            Self::Landscape16x9 => (16, 9),
            Self::Portrait9x16 => (9, 16),
            Self::Standard4x3 => (4, 3),
            Self::Square => (1, 1),
            Self::Ultrawide21x9 => (21, 9),
        }
    }
}

/// Instantiated video effect with coerced parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum VideoEffect {
    /// Gaussian blur with an odd kernel of `2 * floor(20 i) + 1` pixels.
    Blur {
        /// Blur amount.
        intensity: f64,
    },
    /// Flip along one axis.
    Mirror {
        /// Flip direction.
        axis: MirrorAxis,
    },
    /// Saturation boost by `1 + intensity`.
    ColorFilter {
        /// Boost amount.
        intensity: f64,
    },
    /// Gaussian edge darkening.
    Vignette {
        /// Mask strength.
        intensity: f64,
    },
    /// Centre crop to an aspect ratio. Both output sides are rounded down to even values.
    Crop {
        /// Target ratio.
        ratio: CropRatio,
    },
    /// Add `amount` to every colour channel.
    Brightness {
        /// Offset in `[-255, 255]`.
        amount: i32,
        /// Saturate at 0/255 instead of wrapping.
        clamp: bool,
    },
    /// A 4-pixel bright column sweeping left to right and back, 1% of the width per frame.
    ///
    /// The position depends only on the absolute frame number.
    LightBar {
        /// Brightness added inside the bar, up to 50.
        intensity: f64,
    },
}

impl VideoEffect {
    /// Registry kind of this effect.
    pub fn kind(&self) -> EffectKind {
        match self {
            Self::Blur { .. } => EffectKind::Blur,
            Self::Mirror { .. } => EffectKind::Mirror,
            Self::ColorFilter { .. } => EffectKind::ColorFilter,
            Self::Vignette { .. } => EffectKind::Vignette,
            Self::Crop { .. } => EffectKind::Crop,
            Self::Brightness { .. } => EffectKind::Brightness,
            Self::LightBar { .. } => EffectKind::LightBar,
        }
    }
}

impl Effect<Frame> for VideoEffect {
    fn name(&self) -> &str {
        self.kind().name()
    }

    fn apply(&self, input: Frame, ctx: &UnitContext) -> Result<Frame, EffectFailure> {
        match *self {
            Self::Blur { intensity } => {
                let Some(sigma) = blur_sigma(intensity) else {
                    return Ok(input);
                };
                let img = to_image(input)?;
                Ok(Frame::from_image(imageops::blur(&img, sigma)))
            }
            Self::Mirror { axis } => {
                let mut img = to_image(input)?;
                match axis {
                    MirrorAxis::Horizontal => imageops::flip_horizontal_in_place(&mut img),
                    MirrorAxis::Vertical => imageops::flip_vertical_in_place(&mut img),
                }
                Ok(Frame::from_image(img))
            }
            Self::ColorFilter { intensity } => Ok(saturate(input, 1.0 + intensity as f32)),
            Self::Vignette { intensity } => {
                let shape = input.shape();
                let mut data = input.to_f32();
                vignette_kernel(shape, intensity).run_host(&mut data);
                Frame::from_f32(data, shape).map_err(|e| EffectFailure::new(e.to_string()))
            }
            Self::Crop { ratio } => centre_crop(input, ratio),
            Self::Brightness { amount, clamp } => Ok(brighten(input, amount, clamp)),
            Self::LightBar { intensity } => Ok(light_bar(input, ctx.offset, intensity)),
        }
    }

    fn output_shape(&self, (width, height): (u32, u32)) -> (u32, u32) {
        match *self {
            Self::Crop { ratio } => crop_dims(width, height, ratio),
            _ => (width, height),
        }
    }

    fn capability(&self, shape: (u32, u32), _ctx: &UnitContext) -> Capability {
        match *self {
            Self::Vignette { intensity } => Capability::DualPath(vignette_kernel(shape, intensity)),
            _ => Capability::HostOnly,
        }
    }

    fn params(&self) -> Params {
        let mut p = Params::default();
        match *self {
            Self::Blur { intensity }
            | Self::ColorFilter { intensity }
            | Self::Vignette { intensity }
            | Self::LightBar { intensity } => p.set("intensity", ParamValue::Float(intensity)),
            Self::Mirror { axis } => p.set("axis", ParamValue::Choice(axis.as_str().to_string())),
            Self::Crop { ratio } => p.set("ratio", ParamValue::Choice(ratio.as_str().to_string())),
            Self::Brightness { amount, clamp } => {
                p.set("amount", ParamValue::Int(i64::from(amount)));
                p.set("clamp", ParamValue::Bool(clamp));
            }
        }
        p
    }
}

fn vignette_kernel((width, height): (u32, u32), intensity: f64) -> Kernel {
    Kernel::Vignette {
        width,
        height,
        strength: intensity as f32,
    }
}

fn to_image(frame: Frame) -> Result<image::RgbaImage, EffectFailure> {
    frame
        .into_image()
        .map_err(|e| EffectFailure::new(e.to_string()))
}

/// Gaussian sigma for the blur kernel size, or `None` when the kernel is a single pixel.
fn blur_sigma(intensity: f64) -> Option<f32> {
    let k = (intensity * 20.0) as u32 * 2 + 1;
    if k <= 1 {
        return None;
    }
    Some(0.3 * ((k as f32 - 1.0) * 0.5 - 1.0) + 0.8)
}

fn saturate(mut frame: Frame, factor: f32) -> Frame {
    for px in frame.data.chunks_exact_mut(4) {
        let [r, g, b] = [px[0], px[1], px[2]].map(f32::from);
        let lum = 0.299 * r + 0.587 * g + 0.114 * b;
        for c in &mut px[..3] {
            let v = lum + (f32::from(*c) - lum) * factor;
            *c = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    frame
}

/// Largest centred `ratio` region with even sides; the input size when that region is empty.
fn crop_dims(width: u32, height: u32, ratio: CropRatio) -> (u32, u32) {
    let (w, h) = (u64::from(width), u64::from(height));
    let (rw, rh) = ratio.terms();
    let (cw, ch) = if w * rh > h * rw {
        (h * rw / rh, h)
    } else {
        (w, w * rh / rw)
    };
    let (cw, ch) = (cw & !1, ch & !1);
    if cw == 0 || ch == 0 {
        return (width, height);
    }
    (cw as u32, ch as u32)
}

fn centre_crop(frame: Frame, ratio: CropRatio) -> Result<Frame, EffectFailure> {
    let (cw, ch) = crop_dims(frame.width, frame.height, ratio);
    if (cw, ch) == (frame.width, frame.height) {
        return Ok(frame);
    }
    let x = (frame.width - cw) / 2;
    let y = (frame.height - ch) / 2;
    let img = to_image(frame)?;
    Ok(Frame::from_image(imageops::crop_imm(&img, x, y, cw, ch).to_image()))
}

/// Bring `frame` to exactly `width x height`: centre crop to that aspect ratio, then resize.
///
/// Used to keep a video stream at one size when a unit kept its original payload after its
/// chain failed.
pub fn fit_frame(frame: Frame, (width, height): (u32, u32)) -> FxResult<Frame> {
    if (frame.width, frame.height) == (width, height) {
        return Ok(frame);
    }
    if width == 0 || height == 0 || frame.width == 0 || frame.height == 0 {
        return Err(FxError::validation(format!(
            "cannot fit a {}x{} frame to {width}x{height}",
            frame.width, frame.height
        )));
    }
    let (w, h) = (u64::from(frame.width), u64::from(frame.height));
    let (tw, th) = (u64::from(width), u64::from(height));
    let (cw, ch) = if w * th > h * tw {
        ((h * tw / th).max(1), h)
    } else {
        (w, (w * th / tw).max(1))
    };
    let img = frame.into_image()?;
    let (x, y) = (((w - cw) / 2) as u32, ((h - ch) / 2) as u32);
    let region = imageops::crop_imm(&img, x, y, cw as u32, ch as u32).to_image();
    let fitted = if region.dimensions() == (width, height) {
        region
    } else {
        imageops::resize(&region, width, height, imageops::FilterType::Triangle)
    };
    Ok(Frame::from_image(fitted))
}

/// Column the bar is centred on for absolute frame `frame`: a triangle wave moving one
/// percent of `width` per frame.
fn light_bar_column(frame: u64, width: usize) -> usize {
    let k = frame % LIGHT_BAR_PERIOD;
    let steps = if k <= LIGHT_BAR_PERIOD / 2 {
        k
    } else {
        LIGHT_BAR_PERIOD - k
    };
    steps as usize * width / 100
}

fn light_bar(mut frame: Frame, frame_number: u64, intensity: f64) -> Frame {
    let width = frame.width as usize;
    let lift = (50.0 * intensity) as u8;
    if width == 0 || lift == 0 {
        return frame;
    }
    let bar = light_bar_column(frame_number, width);
    let (x0, x1) = (bar.saturating_sub(2), (bar + 2).min(width));
    if x0 >= x1 {
        return frame;
    }
    for row in frame.data.chunks_exact_mut(width * 4) {
        for px in row[x0 * 4..x1 * 4].chunks_exact_mut(4) {
            for c in &mut px[..3] {
                *c = c.saturating_add(lift);
            }
        }
    }
    frame
}

fn brighten(mut frame: Frame, amount: i32, clamp: bool) -> Frame {
    for px in frame.data.chunks_exact_mut(4) {
        for c in &mut px[..3] {
            let v = i32::from(*c) + amount;
            *c = if clamp {
                v.clamp(0, 255) as u8
            } else {
                v.rem_euclid(256) as u8
            };
        }
    }
    frame
}

#[cfg(test)]
#[path = "../../tests/unit/effects/video.rs"]
mod tests;
