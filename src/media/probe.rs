use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::foundation::core::Fps;
use crate::foundation::error::{FxError, FxResult};

/// Stream metadata the pipeline needs from an input file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Video width in pixels.
    pub width: u32,
    /// Video height in pixels.
    pub height: u32,
    /// Video frame rate.
    pub fps: Fps,
    /// Frame count, from the container or estimated from the duration.
    pub frame_count: u64,
    /// Whether the input has at least one audio stream.
    pub has_audio: bool,
    /// Sample rate of the first audio stream (0 without audio).
    pub sample_rate: u32,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    sample_rate: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

/// Run `ffprobe` on `input`.
#[tracing::instrument(skip_all, fields(input = %input.display()))]
pub fn probe_with(ffprobe: &str, input: &Path) -> FxResult<MediaInfo> {
    let out = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(input)
        .output()
        .map_err(|e| FxError::media_read(format!("failed to run {ffprobe}: {e}")))?;
    if !out.status.success() {
        return Err(FxError::media_read(format!(
            "{ffprobe} failed for '{}': {}",
            input.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    let info = parse_probe_json(&out.stdout)?;
    tracing::debug!(?info, "probed input");
    Ok(info)
}

/// Parse `ffprobe -print_format json -show_streams -show_format` output.
pub fn parse_probe_json(bytes: &[u8]) -> FxResult<MediaInfo> {
    let parsed: ProbeOut = serde_json::from_slice(bytes)
        .map_err(|e| FxError::media_read(format!("ffprobe json parse failed: {e}")))?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| FxError::media_read("no video stream found"))?;
    let width = video
        .width
        .ok_or_else(|| FxError::media_read("missing video width from ffprobe"))?;
    let height = video
        .height
        .ok_or_else(|| FxError::media_read("missing video height from ffprobe"))?;
    let fps = [&video.avg_frame_rate, &video.r_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|s| parse_rate(s))
        .ok_or_else(|| FxError::media_read("missing or invalid video frame rate"))?;

    let duration = video
        .duration
        .as_deref()
        .or(parsed.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.trim().parse::<f64>().ok());
    let frame_count = video
        .nb_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<u64>().ok())
        .or_else(|| duration.map(|d| (d * fps.as_f64()).round().max(0.0) as u64))
        .unwrap_or(0);

    let audio = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));
    let sample_rate = audio
        .and_then(|a| a.sample_rate.as_deref())
        .and_then(|r| r.trim().parse::<u32>().ok())
        .unwrap_or(0);

    Ok(MediaInfo {
        width,
        height,
        fps,
        frame_count,
        has_audio: audio.is_some(),
        sample_rate,
    })
}

/// Parse an ffprobe rational such as `30000/1001` or `25`.
fn parse_rate(s: &str) -> Option<Fps> {
    let (num, den) = match s.split_once('/') {
        Some((n, d)) => (n.trim().parse().ok()?, d.trim().parse().ok()?),
        None => (s.trim().parse().ok()?, 1),
    };
    Fps::new(num, den).ok()
}

#[cfg(test)]
#[path = "../../tests/unit/media/probe.rs"]
mod tests;
