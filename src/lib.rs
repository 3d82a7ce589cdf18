//! fxpipe applies ordered effect chains to the audio and video of a media file.
//!
//! Input streams are split into units (audio chunks, video frames), every unit is run through
//! its modality's [`EffectChain`] on a bounded worker pool, and the results are reassembled in
//! their original order before an external encoder muxes them into the output.
//!
//! - Build chains from the effect registry ([`instantiate`]) or a [`Preset`]
//! - Configure a job with [`ExportConfig`]
//! - Run it with [`ExportOrchestrator::export`]
//!
//! Effects that support it run on a compute device (a `wgpu` backend behind the `gpu` feature);
//! any device failure re-runs the affected unit on the host.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Effect chains and presets.
pub mod chain;
/// Export configuration.
pub mod config;
/// Compute devices and kernels.
pub mod device;
/// Effect trait, catalogue and parameter schemas.
pub mod effects;
/// Per-unit execution and parallel dispatch.
pub mod exec;
/// Export jobs.
pub mod export;
/// Media decoding, encoding and probing.
pub mod media;
/// Weighted job progress.
pub mod progress;
/// Unit splitters.
pub mod split;

pub use crate::foundation::core::{
    AudioBuffer, AudioChunk, Fps, Frame, Modality, Unit, UnitContext, frame_len, peak_abs,
};
pub use crate::foundation::error::{FxError, FxResult};

pub use crate::chain::{
    ChainSet, EffectApplicationError, EffectChain, EffectEntry, Preset, PresetStore,
};
pub use crate::config::ExportConfig;
pub use crate::device::{
    ComputeDevice, DeviceChoice, DeviceError, DeviceFactory, DeviceLease, Kernel, device_factory,
};
pub use crate::effects::descriptor::{
    EffectDescriptor, ParamDefault, ParamKind, ParamSpec, ParamValue, Params,
};
pub use crate::effects::registry::{AnyEffect, EffectKind, instantiate, list_effects};
pub use crate::effects::{Capability, Effect, EffectFailure};
pub use crate::exec::{
    Dispatcher, ExecutionContext, StageReport, UnitFailurePolicy, UnitOutcome, normalize_to_peak,
    run_unit,
};
pub use crate::export::{ArtifactId, ExportOrchestrator, ExportReport, ExportState, TempArtifactSet};
pub use crate::media::{FfmpegEncoder, FfmpegIo, MediaEncoder, MediaInfo, MediaIo};
pub use crate::progress::{JobProgress, NoProgress, ProgressSink, Stage, StageWeights};
pub use crate::split::{AudioSplitter, FrameUnits, VideoSplitter};
