use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::chain::{ChainSet, EffectChain};
use crate::config::ExportConfig;
use crate::device::{DeviceFactory, DeviceLease, device_factory};
use crate::effects::video::fit_frame;
use crate::exec::{Dispatcher, ExecutionContext, StageReport};
use crate::export::artifacts::{ArtifactId, TempArtifactSet};
use crate::foundation::core::{Frame, Unit};
use crate::foundation::error::{FxError, FxResult};
use crate::media::{
    FfmpegEncoder, FfmpegIo, FrameWriter, MediaEncoder, MediaInfo, MediaIo, ensure_parent_dir,
};
use crate::progress::{JobProgress, ProgressSink, Stage};
use crate::split::VideoSplitter;

/// Lifecycle of an export job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportState {
    /// No job has started.
    Idle,
    /// Frames are being processed.
    VideoProcessing,
    /// Audio is being extracted and processed.
    AudioProcessing,
    /// The final container is being written.
    Muxing,
    /// The output is in place.
    Done,
    /// The job stopped on an error.
    Failed,
}

impl ExportState {
    /// `true` for `Done` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Outcome of a successful export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportReport {
    /// Path the result was written to.
    pub output: PathBuf,
    /// Video pass accounting; `None` when the video chain was empty.
    pub video: Option<StageReport>,
    /// Audio pass accounting; `None` when the pass was skipped.
    pub audio: Option<StageReport>,
    /// `true` when the encoder muxed an audio track, `false` when the video was copied.
    pub muxed: bool,
}

/// Runs the video pass, the audio pass and the final mux for one input at a time.
///
/// Every job owns a [`TempArtifactSet`] that is emptied when the job reaches `Done` or
/// `Failed`. The result is written next to the other artifacts first and only moved to the
/// requested output path once complete.
pub struct ExportOrchestrator {
    config: ExportConfig,
    io: Arc<dyn MediaIo>,
    encoder: Arc<dyn MediaEncoder>,
    devices: Option<Arc<dyn DeviceFactory>>,
    dispatcher: Dispatcher,
    history: Vec<ExportState>,
}

impl std::fmt::Debug for ExportOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportOrchestrator")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ExportOrchestrator {
    /// Orchestrator using `ffmpeg`/`ffprobe` and the device named by the configuration.
    pub fn new(config: ExportConfig) -> FxResult<Self> {
        let io = Arc::new(FfmpegIo::new(&config.ffmpeg, &config.ffprobe));
        let encoder = Arc::new(FfmpegEncoder::new(
            &config.ffmpeg,
            &config.audio_codec,
            &config.audio_bitrate,
        ));
        let devices = device_factory(config.device);
        Ok(Self::with_collaborators(config, io, encoder)?.with_device_factory(devices))
    }

    /// Orchestrator over explicit media collaborators, host-only until a device factory is set.
    pub fn with_collaborators(
        config: ExportConfig,
        io: Arc<dyn MediaIo>,
        encoder: Arc<dyn MediaEncoder>,
    ) -> FxResult<Self> {
        config.validate()?;
        let dispatcher = Dispatcher::new(config.threads)?;
        Ok(Self {
            config,
            io,
            encoder,
            devices: None,
            dispatcher,
            history: vec![ExportState::Idle],
        })
    }

    /// Replace the device factory used to lease a device per job.
    pub fn with_device_factory(mut self, devices: Option<Arc<dyn DeviceFactory>>) -> Self {
        self.devices = devices;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> ExportState {
        self.history.last().copied().unwrap_or(ExportState::Idle)
    }

    /// States visited by the most recent job, starting with `Idle`.
    pub fn history(&self) -> &[ExportState] {
        &self.history
    }

    fn transition(&mut self, next: ExportState) {
        tracing::info!(from = ?self.state(), to = ?next, "export state");
        self.history.push(next);
    }

    /// Process `input` with `chains` and write the result to `output`.
    ///
    /// `progress` receives non-decreasing percentages and exactly 100 on success. On failure
    /// `output` is left untouched and every temporary artifact is removed.
    #[tracing::instrument(skip(self, chains, progress), fields(input = %input.display(), output = %output.display()))]
    pub fn export(
        &mut self,
        input: &Path,
        output: &Path,
        chains: &ChainSet,
        progress: &dyn ProgressSink,
    ) -> FxResult<ExportReport> {
        self.history.clear();
        self.history.push(ExportState::Idle);
        if input == output {
            self.transition(ExportState::Failed);
            return Err(FxError::validation("output path must differ from the input path"));
        }

        let mut artifacts = match TempArtifactSet::create(&self.config.temp_root()) {
            Ok(set) => set,
            Err(e) => {
                self.transition(ExportState::Failed);
                return Err(e);
            }
        };
        let mut job = JobProgress::new(progress, self.config.stage_weights);
        let result = self.run_stages(input, output, chains, &mut artifacts, &mut job);

        let next = if result.is_ok() {
            ExportState::Done
        } else {
            ExportState::Failed
        };
        self.transition(next);
        let leftovers = artifacts.cleanup();
        if leftovers > 0 {
            tracing::warn!(leftovers, "some temporary artifacts could not be removed");
        }
        if result.is_ok() {
            job.complete();
        }
        result
    }

    fn run_stages(
        &mut self,
        input: &Path,
        output: &Path,
        chains: &ChainSet,
        artifacts: &mut TempArtifactSet,
        job: &mut JobProgress<'_>,
    ) -> FxResult<ExportReport> {
        let info = self.io.probe(input)?;
        tracing::info!(
            width = info.width,
            height = info.height,
            frames = info.frame_count,
            has_audio = info.has_audio,
            "input probed"
        );

        // Released on every exit path when the lease drops.
        let lease = match self.devices.as_deref() {
            Some(factory) => match DeviceLease::acquire(factory) {
                Ok(lease) => Some(lease),
                Err(e) => {
                    tracing::warn!(error = %e, "no compute device; running on host");
                    None
                }
            },
            None => None,
        };
        let exec = ExecutionContext {
            device: lease.as_ref().map(|l| l.device().clone()),
            policy: self.config.unit_failure_policy,
        };

        self.transition(ExportState::VideoProcessing);
        let (video_src, video_report) = if chains.video.is_empty() {
            job.skip_stage(Stage::Video);
            (input.to_path_buf(), None)
        } else {
            job.begin_stage(Stage::Video);
            let dest = artifacts.register(ArtifactId::ProcessedVideo, "mp4");
            let report = self.process_video(input, &info, &chains.video, &exec, &dest, job)?;
            job.finish_stage();
            (dest, Some(report))
        };

        self.transition(ExportState::AudioProcessing);
        let (audio_src, audio_report) = if !info.has_audio {
            job.skip_stage(Stage::Audio);
            (None, None)
        } else if chains.audio.is_empty() {
            job.skip_stage(Stage::Audio);
            (Some(input.to_path_buf()), None)
        } else {
            job.begin_stage(Stage::Audio);
            let (dest, report) = self.process_audio(input, chains, &exec, artifacts, job)?;
            job.finish_stage();
            (Some(dest), Some(report))
        };

        self.transition(ExportState::Muxing);
        job.begin_stage(Stage::Mux);
        let extension = output
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        let staged = artifacts.register(ArtifactId::StagedOutput, extension);
        let muxed = match audio_src.as_deref() {
            Some(audio) => {
                self.encoder.mux(&video_src, Some(audio), &staged)?;
                true
            }
            None => {
                tracing::info!("no audio track; copying video to output");
                std::fs::copy(&video_src, &staged).with_context(|| {
                    format!("failed to copy '{}' to '{}'", video_src.display(), staged.display())
                })?;
                false
            }
        };
        job.update(0.9);
        publish(&staged, output)?;
        job.finish_stage();

        Ok(ExportReport {
            output: output.to_path_buf(),
            video: video_report,
            audio: audio_report,
            muxed,
        })
    }

    #[tracing::instrument(skip_all, fields(batch = self.config.video_batch_frames))]
    fn process_video(
        &self,
        input: &Path,
        info: &MediaInfo,
        chain: &EffectChain<Frame>,
        exec: &ExecutionContext,
        dest: &Path,
        job: &mut JobProgress<'_>,
    ) -> FxResult<StageReport> {
        let splitter = VideoSplitter::new(self.io.as_ref(), input, info);
        let mut frames = splitter.units()?;
        // Containers without a frame count get no per-frame progress.
        let expected = (info.frame_count > 0).then_some(info.frame_count as f64);
        let mut writer: Option<(Box<dyn FrameWriter>, (u32, u32))> = None;
        let mut report = StageReport::default();

        loop {
            let batch = frames
                .by_ref()
                .take(self.config.video_batch_frames)
                .collect::<FxResult<Vec<Unit<Frame>>>>()?;
            let Some(first) = batch.first() else {
                break;
            };
            if writer.is_none() {
                let size = chain.output_shape((first.payload.width, first.payload.height));
                let w = self.io.create_frame_writer(dest, size.0, size.1, info.fps)?;
                writer = Some((w, size));
            }
            let before = report.units;
            let (out, batch_report) = self.dispatcher.run(chain, &batch, 0, exec, |done| {
                if let Some(expected) = expected {
                    job.update((before + done) as f64 / expected);
                }
            })?;
            report.absorb(batch_report);

            if let Some((w, size)) = writer.as_mut() {
                for (unit, frame) in batch.iter().zip(out) {
                    let frame = if (frame.width, frame.height) == *size {
                        frame
                    } else {
                        tracing::warn!(
                            unit = unit.index,
                            from = ?(frame.width, frame.height),
                            to = ?size,
                            "resizing frame to the stream size"
                        );
                        fit_frame(frame, *size)?
                    };
                    w.write_frame(&frame)?;
                }
            }
        }

        let (writer, _) = writer.ok_or_else(|| FxError::media_read("input has no video frames"))?;
        writer.finish()?;
        tracing::info!(?report, "video pass complete");
        Ok(report)
    }

    fn process_audio(
        &self,
        input: &Path,
        chains: &ChainSet,
        exec: &ExecutionContext,
        artifacts: &mut TempArtifactSet,
        job: &mut JobProgress<'_>,
    ) -> FxResult<(PathBuf, StageReport)> {
        let extracted = artifacts.register(ArtifactId::ExtractedAudio, "wav");
        let extracted = self.encoder.extract_audio(input, &extracted)?;
        let audio = self.io.read_audio(&extracted)?;
        job.update(0.05);

        let (processed, report) = self.dispatcher.process_audio(
            &chains.audio,
            &audio,
            self.config.audio_chunk_samples,
            exec,
            self.config.normalize_peak,
            |fraction| job.update(0.05 + 0.9 * fraction),
        )?;

        let dest = artifacts.register(ArtifactId::ProcessedAudio, "wav");
        self.io.write_audio(&dest, &processed)?;
        Ok((dest, report))
    }
}

/// Move the finished file into place, falling back to copy across filesystems.
fn publish(staged: &Path, output: &Path) -> FxResult<()> {
    ensure_parent_dir(output)?;
    if std::fs::rename(staged, output).is_ok() {
        return Ok(());
    }
    if let Err(e) = std::fs::copy(staged, output) {
        let _ = std::fs::remove_file(output);
        return Err(anyhow::Error::new(e)
            .context(format!("failed to write output '{}'", output.display()))
            .into());
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/export/orchestrator.rs"]
mod tests;
