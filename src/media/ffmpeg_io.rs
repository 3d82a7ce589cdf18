use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use anyhow::Context as _;

use crate::foundation::core::{AudioBuffer, Fps, Frame, frame_len};
use crate::foundation::error::{FxError, FxResult};
use crate::media::probe::{MediaInfo, probe_with};
use crate::media::{FrameSource, FrameWriter, MediaIo, ensure_parent_dir};

type StderrDrain = JoinHandle<std::io::Result<Vec<u8>>>;

/// [`MediaIo`] backed by the system `ffmpeg`/`ffprobe` for video and `hound` for WAV audio.
///
/// Frames travel as raw RGBA8 over pipes; audio is exchanged as mono 32-bit float WAV.
#[derive(Clone, Debug)]
pub struct FfmpegIo {
    ffmpeg: String,
    ffprobe: String,
}

impl Default for FfmpegIo {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegIo {
    /// Use the given program names (or paths).
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

fn spawn_stderr_drain(child: &mut Child, tool: &str) -> FxResult<StderrDrain> {
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow::anyhow!("failed to open {tool} stderr (unexpected)"))?;
    Ok(std::thread::spawn(move || {
        let mut bytes = Vec::new();
        stderr.read_to_end(&mut bytes)?;
        Ok(bytes)
    }))
}

fn join_drain(drain: Option<StderrDrain>) -> String {
    let bytes = match drain.map(JoinHandle::join) {
        Some(Ok(Ok(bytes))) => bytes,
        _ => Vec::new(),
    };
    String::from_utf8_lossy(&bytes).trim().to_string()
}

impl MediaIo for FfmpegIo {
    fn probe(&self, input: &Path) -> FxResult<MediaInfo> {
        probe_with(&self.ffprobe, input)
    }

    fn open_frames(&self, input: &Path, info: &MediaInfo) -> FxResult<Box<dyn FrameSource>> {
        let frame_bytes = frame_len(info.width, info.height)?;
        if frame_bytes == 0 {
            return Err(FxError::media_read("input has zero-sized frames"));
        }
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-v", "error", "-nostdin", "-i"])
            .arg(input)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        tracing::debug!(?cmd, "spawning frame decoder");
        let mut child = cmd.spawn().map_err(|e| {
            FxError::media_read(format!("failed to spawn {} for decoding: {e}", self.ffmpeg))
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FxError::media_read("failed to open decoder stdout (unexpected)"))?;
        let stderr_drain = spawn_stderr_drain(&mut child, &self.ffmpeg)?;
        Ok(Box::new(FfmpegFrameSource {
            child: Some(child),
            stdout,
            stderr_drain: Some(stderr_drain),
            width: info.width,
            height: info.height,
            frame_bytes,
        }))
    }

    fn create_frame_writer(
        &self,
        output: &Path,
        width: u32,
        height: u32,
        fps: Fps,
    ) -> FxResult<Box<dyn FrameWriter>> {
        if width == 0 || height == 0 {
            return Err(FxError::validation("frame writer width/height must be non-zero"));
        }
        ensure_parent_dir(output)?;
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .args(["-y", "-loglevel", "error", "-f", "rawvideo", "-pix_fmt", "rgba"])
            .args(["-s", &format!("{width}x{height}")])
            .args(["-r", &format!("{}/{}", fps.num, fps.den)])
            .args(["-i", "pipe:0", "-an", "-c:v", "libx264", "-pix_fmt", "yuv420p"]);
        if !width.is_multiple_of(2) || !height.is_multiple_of(2) {
            // yuv420p needs even dimensions.
            cmd.args(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2"]);
        }
        cmd.arg(output);
        tracing::debug!(?cmd, "spawning frame encoder");

        let mut child = cmd
            .spawn()
            .map_err(|e| anyhow::anyhow!("failed to spawn {} for encoding: {e}", self.ffmpeg))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("failed to open encoder stdin (unexpected)"))?;
        let stderr_drain = spawn_stderr_drain(&mut child, &self.ffmpeg)?;
        Ok(Box::new(FfmpegFrameWriter {
            tool: self.ffmpeg.clone(),
            child,
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
            width,
            height,
        }))
    }

    fn read_audio(&self, path: &Path) -> FxResult<AudioBuffer> {
        let mut reader = hound::WavReader::open(path).map_err(|e| {
            FxError::media_read(format!("failed to open WAV '{}': {e}", path.display()))
        })?;
        let spec = reader.spec();
        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Int => {
                let max_val = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_val))
                    .collect::<Result<Vec<f32>, _>>()
            }
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<f32>, _>>(),
        }
        .map_err(|e| FxError::media_read(format!("failed to read WAV samples: {e}")))?;

        let channels = usize::from(spec.channels.max(1));
        let samples = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect()
        };
        Ok(AudioBuffer {
            sample_rate: spec.sample_rate,
            samples,
        })
    }

    fn write_audio(&self, path: &Path, audio: &AudioBuffer) -> FxResult<()> {
        if audio.sample_rate == 0 {
            return Err(FxError::validation("audio sample_rate must be non-zero"));
        }
        ensure_parent_dir(path)?;
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: audio.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)
            .with_context(|| format!("failed to create WAV '{}'", path.display()))?;
        for &s in &audio.samples {
            writer
                .write_sample(s)
                .with_context(|| format!("failed to write WAV '{}'", path.display()))?;
        }
        writer
            .finalize()
            .with_context(|| format!("failed to finalize WAV '{}'", path.display()))?;
        Ok(())
    }
}

struct FfmpegFrameSource {
    child: Option<Child>,
    stdout: ChildStdout,
    stderr_drain: Option<StderrDrain>,
    width: u32,
    height: u32,
    frame_bytes: usize,
}

impl FfmpegFrameSource {
    /// Fill `buf` completely; returns the number of bytes read before EOF.
    fn read_full(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn finish_decoder(&mut self) -> FxResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| FxError::media_read(format!("failed to wait for decoder: {e}")))?;
        let stderr = join_drain(self.stderr_drain.take());
        if !status.success() {
            return Err(FxError::media_read(format!(
                "decoder exited with {status}: {stderr}"
            )));
        }
        Ok(())
    }
}

impl FrameSource for FfmpegFrameSource {
    fn next_frame(&mut self) -> FxResult<Option<Frame>> {
        if self.child.is_none() {
            return Ok(None);
        }
        let mut buf = vec![0u8; self.frame_bytes];
        let n = self
            .read_full(&mut buf)
            .map_err(|e| FxError::media_read(format!("failed to read decoded frame: {e}")))?;
        if n == 0 {
            self.finish_decoder()?;
            return Ok(None);
        }
        if n < self.frame_bytes {
            self.finish_decoder()?;
            return Err(FxError::media_read(format!(
                "truncated frame: got {n} of {} bytes",
                self.frame_bytes
            )));
        }
        Frame::new(self.width, self.height, buf).map(Some)
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

struct FfmpegFrameWriter {
    tool: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<StderrDrain>,
    width: u32,
    height: u32,
}

impl FrameWriter for FfmpegFrameWriter {
    fn write_frame(&mut self, frame: &Frame) -> FxResult<()> {
        if frame.width != self.width || frame.height != self.height {
            return Err(FxError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(anyhow::anyhow!("frame writer is already finished").into());
        };
        if let Err(e) = stdin.write_all(&frame.data) {
            // A closed pipe means the encoder died; report its diagnostics instead.
            drop(self.stdin.take());
            let status = self.child.wait().ok();
            let stderr = join_drain(self.stderr_drain.take());
            return Err(FxError::external_tool(
                self.tool.clone(),
                status.and_then(|s| s.code()),
                format!("failed to write frame: {e}; {stderr}"),
            ));
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> FxResult<()> {
        drop(self.stdin.take());
        let status = self
            .child
            .wait()
            .with_context(|| format!("failed to wait for {}", self.tool))?;
        let stderr = join_drain(self.stderr_drain.take());
        if !status.success() {
            return Err(FxError::external_tool(self.tool.clone(), status.code(), stderr));
        }
        Ok(())
    }
}

impl Drop for FfmpegFrameWriter {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            drop(self.stdin.take());
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
