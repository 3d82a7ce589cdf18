use crate::effects::audio::AudioEffect;
use crate::effects::descriptor::{EffectDescriptor, ParamDefault, ParamKind, ParamSpec, Params};
use crate::effects::video::{CropRatio, MirrorAxis, VideoEffect};
use crate::foundation::core::Modality;
use crate::foundation::error::{FxError, FxResult};

/// Closed set of effect kinds known to the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectKind {
    /// Linear gain (audio, dual path).
    Gain,
    /// Sinusoidal amplitude modulation (audio, dual path).
    Tremolo,
    /// Single delayed repeat (audio).
    Echo,
    /// Decaying impulse-response convolution (audio).
    Reverb,
    /// Threshold/ratio dynamic range compression (audio).
    Compression,
    /// Peak normalisation of each chunk (audio).
    Normalize,
    /// Low-frequency boost (audio).
    BassBoost,
    /// Length-preserving resample (audio).
    PitchShift,
    /// Gaussian blur (video).
    Blur,
    /// Horizontal or vertical flip (video).
    Mirror,
    /// Saturation boost (video).
    ColorFilter,
    /// Gaussian vignette (video, dual path).
    Vignette,
    /// Centre crop to an aspect ratio (video).
    Crop,
    /// Additive brightness offset (video).
    Brightness,
    /// Bright column sweeping across the frame (video).
    LightBar,
}

const UNIT_INTENSITY: &[ParamSpec] = &[ParamSpec {
    name: "intensity",
    kind: ParamKind::Float {
        min: Some(0.0),
        max: Some(1.0),
    },
    default: ParamDefault::Float(0.5),
}];

/// Aspect ratios accepted by the crop effect.
pub const CROP_RATIOS: &[&str] = &["16:9", "9:16", "4:3", "1:1", "21:9"];

static DESCRIPTORS: &[EffectDescriptor] = &[
    EffectDescriptor {
        name: "gain",
        modality: Modality::Audio,
        summary: "multiply samples by a constant gain",
        params: &[ParamSpec {
            name: "gain",
            kind: ParamKind::Float {
                min: Some(0.0),
                max: Some(4.0),
            },
            default: ParamDefault::Float(1.0),
        }],
    },
    EffectDescriptor {
        name: "tremolo",
        modality: Modality::Audio,
        summary: "sinusoidal volume modulation",
        params: &[ParamSpec {
            name: "frequency",
            kind: ParamKind::Float {
                min: Some(0.1),
                max: Some(20.0),
            },
            default: ParamDefault::Float(5.0),
        }],
    },
    EffectDescriptor {
        name: "echo",
        modality: Modality::Audio,
        summary: "add a delayed repeat (0.1s to 0.4s)",
        params: UNIT_INTENSITY,
    },
    EffectDescriptor {
        name: "reverb",
        modality: Modality::Audio,
        summary: "blend with a decaying impulse response",
        params: UNIT_INTENSITY,
    },
    EffectDescriptor {
        name: "compression",
        modality: Modality::Audio,
        summary: "compress peaks above a threshold",
        params: UNIT_INTENSITY,
    },
    EffectDescriptor {
        name: "normalize",
        modality: Modality::Audio,
        summary: "scale each chunk to a target peak (0.3 to 1.0)",
        params: UNIT_INTENSITY,
    },
    EffectDescriptor {
        name: "bass_boost",
        modality: Modality::Audio,
        summary: "boost content below 150 Hz",
        params: UNIT_INTENSITY,
    },
    EffectDescriptor {
        name: "pitch_shift",
        modality: Modality::Audio,
        summary: "resample by 0.5x to 1.5x keeping the chunk length",
        params: UNIT_INTENSITY,
    },
    EffectDescriptor {
        name: "blur",
        modality: Modality::Video,
        summary: "gaussian blur",
        params: UNIT_INTENSITY,
    },
    EffectDescriptor {
        name: "mirror",
        modality: Modality::Video,
        summary: "flip the frame",
        params: &[ParamSpec {
            name: "axis",
            kind: ParamKind::Choice {
                choices: &["horizontal", "vertical"],
            },
            default: ParamDefault::Choice("horizontal"),
        }],
    },
    EffectDescriptor {
        name: "color_filter",
        modality: Modality::Video,
        summary: "boost saturation",
        params: UNIT_INTENSITY,
    },
    EffectDescriptor {
        name: "vignette",
        modality: Modality::Video,
        summary: "darken towards the edges",
        params: UNIT_INTENSITY,
    },
    EffectDescriptor {
        name: "crop",
        modality: Modality::Video,
        summary: "centre crop to an aspect ratio",
        params: &[ParamSpec {
            name: "ratio",
            kind: ParamKind::Choice {
                choices: CROP_RATIOS,
            },
            default: ParamDefault::Choice("16:9"),
        }],
    },
    EffectDescriptor {
        name: "brightness",
        modality: Modality::Video,
        summary: "add a constant to every colour channel",
        params: &[
            ParamSpec {
                name: "amount",
                kind: ParamKind::Int {
                    min: Some(-255),
                    max: Some(255),
                },
                default: ParamDefault::Int(0),
            },
            ParamSpec {
                name: "clamp",
                kind: ParamKind::Bool,
                default: ParamDefault::Bool(true),
            },
        ],
    },
    EffectDescriptor {
        name: "light_bar",
        modality: Modality::Video,
        summary: "sweep a bright vertical bar across the frame and back",
        params: UNIT_INTENSITY,
    },
];

impl EffectKind {
    /// Every kind, in registry order.
    pub const ALL: [EffectKind; 15] = [
        Self::Gain,
        Self::Tremolo,
        Self::Echo,
        Self::Reverb,
        Self::Compression,
        Self::Normalize,
        Self::BassBoost,
        Self::PitchShift,
        Self::Blur,
        Self::Mirror,
        Self::ColorFilter,
        Self::Vignette,
        Self::Crop,
        Self::Brightness,
        Self::LightBar,
    ];

    /// Static descriptor for this kind.
    pub fn descriptor(self) -> &'static EffectDescriptor {
        // DESCRIPTORS is laid out in the same order as `ALL`.
        &DESCRIPTORS[self as usize]
    }

    /// Canonical name.
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Modality of this kind.
    pub fn modality(self) -> Modality {
        self.descriptor().modality
    }

    /// Look up a kind by name; case-insensitive, `-`, `_` and spaces are ignored.
    pub fn from_name(name: &str) -> Option<Self> {
        let key = squash(name);
        if key.is_empty() {
            return None;
        }
        Self::ALL.into_iter().find(|k| squash(k.name()) == key)
    }
}

fn squash(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// An instantiated effect of either modality.
#[derive(Clone, Debug, PartialEq)]
pub enum AnyEffect {
    /// Audio effect.
    Audio(AudioEffect),
    /// Video effect.
    Video(VideoEffect),
}

impl AnyEffect {
    /// Modality of the wrapped effect.
    pub fn modality(&self) -> Modality {
        match self {
            Self::Audio(_) => Modality::Audio,
            Self::Video(_) => Modality::Video,
        }
    }
}

/// Descriptors for every effect of `modality`.
pub fn list_effects(modality: Modality) -> Vec<&'static EffectDescriptor> {
    DESCRIPTORS.iter().filter(|d| d.modality == modality).collect()
}

/// Validate `raw_params` against the named effect's schema and build the effect.
///
/// Coercion happens here, once; effects never re-validate on `apply`.
pub fn instantiate(
    name: &str,
    raw_params: &serde_json::Map<String, serde_json::Value>,
) -> FxResult<AnyEffect> {
    let kind = EffectKind::from_name(name)
        .ok_or_else(|| FxError::validation(format!("unknown effect '{name}'")))?;
    let params = kind.descriptor().coerce(raw_params)?;
    Ok(build(kind, &params))
}

/// Build an effect from already-coerced parameters.
pub fn build(kind: EffectKind, params: &Params) -> AnyEffect {
    let intensity = params.float("intensity");
    match kind {
        EffectKind::Gain => AnyEffect::Audio(AudioEffect::Gain {
            gain: params.float("gain"),
        }),
        EffectKind::Tremolo => AnyEffect::Audio(AudioEffect::Tremolo {
            frequency: params.float("frequency"),
        }),
        EffectKind::Echo => AnyEffect::Audio(AudioEffect::Echo { intensity }),
        EffectKind::Reverb => AnyEffect::Audio(AudioEffect::Reverb { intensity }),
        EffectKind::Compression => AnyEffect::Audio(AudioEffect::Compression { intensity }),
        EffectKind::Normalize => AnyEffect::Audio(AudioEffect::Normalize { intensity }),
        EffectKind::BassBoost => AnyEffect::Audio(AudioEffect::BassBoost { intensity }),
        EffectKind::PitchShift => AnyEffect::Audio(AudioEffect::PitchShift { intensity }),
        EffectKind::Blur => AnyEffect::Video(VideoEffect::Blur { intensity }),
        EffectKind::Mirror => AnyEffect::Video(VideoEffect::Mirror {
            axis: MirrorAxis::from_choice(params.choice("axis")),
        }),
        EffectKind::ColorFilter => AnyEffect::Video(VideoEffect::ColorFilter { intensity }),
        EffectKind::Vignette => AnyEffect::Video(VideoEffect::Vignette { intensity }),
        EffectKind::Crop => AnyEffect::Video(VideoEffect::Crop {
            ratio: CropRatio::from_choice(params.choice("ratio")),
        }),
        EffectKind::Brightness => AnyEffect::Video(VideoEffect::Brightness {
            amount: params.int("amount") as i32,
            clamp: params.bool("clamp"),
        }),
        EffectKind::LightBar => AnyEffect::Video(VideoEffect::LightBar { intensity }),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/registry.rs"]
mod tests;
