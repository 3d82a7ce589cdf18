//! Export configuration.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::device::DeviceChoice;
use crate::exec::UnitFailurePolicy;
use crate::foundation::error::{FxError, FxResult};
use crate::progress::StageWeights;

/// Settings for one [`ExportOrchestrator`](crate::ExportOrchestrator).
///
/// Every field has a default, so a JSON file only needs the fields it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Audio unit size in samples.
    pub audio_chunk_samples: usize,
    /// Frames decoded and dispatched per batch.
    pub video_batch_frames: usize,
    /// Worker thread count; `None` uses the hardware parallelism.
    pub threads: Option<usize>,
    /// Preferred execution device.
    pub device: DeviceChoice,
    /// Peak the processed audio is scaled to; `None` disables the final normalize pass.
    #[serde(default = "default_normalize_peak")]
    pub normalize_peak: Option<f32>,
    /// Handling of units whose effects fail on the host.
    pub unit_failure_policy: UnitFailurePolicy,
    /// Progress share of each stage.
    pub stage_weights: StageWeights,
    /// Codec of the muxed audio track.
    pub audio_codec: String,
    /// Bitrate of the muxed audio track.
    pub audio_bitrate: String,
    /// `ffmpeg` program name or path.
    pub ffmpeg: String,
    /// `ffprobe` program name or path.
    pub ffprobe: String,
    /// Directory for job artifacts; defaults to the system temp directory.
    pub temp_dir: Option<PathBuf>,
}

fn default_normalize_peak() -> Option<f32> {
    Some(0.9)
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            audio_chunk_samples: 32_768,
            video_batch_frames: 64,
            threads: None,
            device: DeviceChoice::Cpu,
            normalize_peak: default_normalize_peak(),
            unit_failure_policy: UnitFailurePolicy::SubstituteOriginal,
            stage_weights: StageWeights::default(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            temp_dir: None,
        }
    }
}

impl ExportConfig {
    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: &Path) -> FxResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| FxError::serde(format!("invalid config '{}': {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> FxResult<()> {
        if self.audio_chunk_samples == 0 {
            return Err(FxError::validation("audio_chunk_samples must be >= 1"));
        }
        if self.video_batch_frames == 0 {
            return Err(FxError::validation("video_batch_frames must be >= 1"));
        }
        if self.threads == Some(0) {
            return Err(FxError::validation("threads must be >= 1 when set"));
        }
        if let Some(peak) = self.normalize_peak
            && !(peak > 0.0 && peak <= 1.0)
        {
            return Err(FxError::validation(format!(
                "normalize_peak must be in (0, 1], got {peak}"
            )));
        }
        if self.audio_codec.trim().is_empty() || self.audio_bitrate.trim().is_empty() {
            return Err(FxError::validation("audio_codec and audio_bitrate must be set"));
        }
        self.stage_weights.validate()
    }

    /// Directory job artifacts are created under.
    pub fn temp_root(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
