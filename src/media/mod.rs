//! Media collaborators: decoding frames and audio, writing them back, and the external encoder.
//!
//! This is the only layer that touches raw media files. The pipeline talks to it through the
//! [`MediaIo`] and [`MediaEncoder`] traits so tests can substitute in-process fakes.

use std::path::Path;

use crate::foundation::core::{AudioBuffer, Fps, Frame};
use crate::foundation::error::FxResult;

/// `ffmpeg` muxing and audio extraction.
pub mod encoder;
/// `ffmpeg`/`hound` implementation of [`MediaIo`].
pub mod ffmpeg_io;
/// `ffprobe` metadata parsing.
pub mod probe;

pub use encoder::{FfmpegEncoder, MediaEncoder};
pub use ffmpeg_io::FfmpegIo;
pub use probe::MediaInfo;

/// Sequential decoder of an input's video frames.
pub trait FrameSource: Send {
    /// Next frame in presentation order, or `None` at end of stream.
    fn next_frame(&mut self) -> FxResult<Option<Frame>>;
}

/// Sequential encoder of processed frames.
pub trait FrameWriter: Send {
    /// Append one frame; frames arrive in index order.
    fn write_frame(&mut self, frame: &Frame) -> FxResult<()>;
    /// Flush and close the output.
    fn finish(self: Box<Self>) -> FxResult<()>;
}

/// Source/sink stream collaborator.
pub trait MediaIo: Send + Sync {
    /// Inspect an input file.
    fn probe(&self, input: &Path) -> FxResult<MediaInfo>;
    /// Start decoding the frames of `input` from the beginning.
    fn open_frames(&self, input: &Path, info: &MediaInfo) -> FxResult<Box<dyn FrameSource>>;
    /// Create a video-only output of the given frame size.
    fn create_frame_writer(
        &self,
        output: &Path,
        width: u32,
        height: u32,
        fps: Fps,
    ) -> FxResult<Box<dyn FrameWriter>>;
    /// Load a mono audio file.
    fn read_audio(&self, path: &Path) -> FxResult<AudioBuffer>;
    /// Write a mono audio file.
    fn write_audio(&self, path: &Path, audio: &AudioBuffer) -> FxResult<()>;
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> FxResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `program -version` runs successfully.
pub fn is_tool_on_path(program: &str) -> bool {
    std::process::Command::new(program)
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
