use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::foundation::error::{FxError, FxResult};
use crate::media::ensure_parent_dir;

/// External encoder collaborator: audio extraction and final multiplexing.
pub trait MediaEncoder: Send + Sync {
    /// Extract the first audio stream of `input` into `dest` as mono float WAV.
    fn extract_audio(&self, input: &Path, dest: &Path) -> FxResult<PathBuf>;

    /// Combine `video` with `audio` (when given) into `output`. Video is stream-copied.
    fn mux(&self, video: &Path, audio: Option<&Path>, output: &Path) -> FxResult<()>;
}

/// [`MediaEncoder`] that shells out to `ffmpeg`.
#[derive(Clone, Debug)]
pub struct FfmpegEncoder {
    program: String,
    audio_codec: String,
    audio_bitrate: String,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg", "aac", "192k")
    }
}

impl FfmpegEncoder {
    /// Encoder invoking `program`, encoding muxed audio with `audio_codec` at `audio_bitrate`.
    pub fn new(
        program: impl Into<String>,
        audio_codec: impl Into<String>,
        audio_bitrate: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            audio_codec: audio_codec.into(),
            audio_bitrate: audio_bitrate.into(),
        }
    }

    /// Argument vector for audio extraction.
    pub fn extract_args(&self, input: &Path, dest: &Path) -> Vec<String> {
        let mut args = strings(["-y", "-v", "error", "-nostdin", "-i"]);
        args.push(input.display().to_string());
        args.extend(strings([
            "-vn", "-map", "0:a:0", "-ac", "1", "-c:a", "pcm_f32le", "-f", "wav",
        ]));
        args.push(dest.display().to_string());
        args
    }

    /// Argument vector for muxing.
    pub fn mux_args(&self, video: &Path, audio: Option<&Path>, output: &Path) -> Vec<String> {
        let mut args = strings(["-y", "-v", "error", "-nostdin", "-i"]);
        args.push(video.display().to_string());
        match audio {
            Some(audio) => {
                args.push("-i".into());
                args.push(audio.display().to_string());
                args.extend(strings(["-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy"]));
                args.extend(["-c:a".to_string(), self.audio_codec.clone()]);
                args.extend(["-b:a".to_string(), self.audio_bitrate.clone()]);
                args.push("-shortest".into());
            }
            None => args.extend(strings(["-map", "0:v:0", "-c:v", "copy", "-an"])),
        }
        args.push(output.display().to_string());
        args
    }

    fn run(&self, args: &[String]) -> FxResult<()> {
        tracing::debug!(program = %self.program, ?args, "running encoder");
        let out = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                FxError::external_tool(&self.program, None, format!("failed to spawn: {e}"))
            })?;
        if !out.status.success() {
            return Err(FxError::external_tool(
                &self.program,
                out.status.code(),
                String::from_utf8_lossy(&out.stderr),
            ));
        }
        Ok(())
    }
}

fn strings<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.into_iter().map(str::to_string).collect()
}

impl MediaEncoder for FfmpegEncoder {
    #[tracing::instrument(skip(self))]
    fn extract_audio(&self, input: &Path, dest: &Path) -> FxResult<PathBuf> {
        ensure_parent_dir(dest)?;
        self.run(&self.extract_args(input, dest))?;
        Ok(dest.to_path_buf())
    }

    #[tracing::instrument(skip(self))]
    fn mux(&self, video: &Path, audio: Option<&Path>, output: &Path) -> FxResult<()> {
        ensure_parent_dir(output)?;
        self.run(&self.mux_args(video, audio, output))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/encoder.rs"]
mod tests;
