use super::*;
use std::sync::Mutex;

use crate::foundation::core::{AudioBuffer, Fps};
use crate::media::FrameWriter;

#[test]
fn audio_chunks_cover_every_sample_in_order() {
    let samples: Vec<f32> = (0..100_000).map(|i| i as f32).collect();
    let splitter = AudioSplitter::new(&samples, 32_768).unwrap();
    assert_eq!(splitter.unit_count(), 4);

    let units: Vec<_> = splitter.units().collect();
    assert_eq!(units.len(), 4);
    assert_eq!(
        units.iter().map(|u| u.payload.len()).collect::<Vec<_>>(),
        vec![32_768, 32_768, 32_768, 2_696]
    );
    for (i, u) in units.iter().enumerate() {
        assert_eq!(u.index, i);
        assert_eq!(u.offset, (i * 32_768) as u64);
        assert_eq!(u.payload[0], u.offset as f32);
    }
    let joined: Vec<f32> = units.into_iter().flat_map(|u| u.payload).collect();
    assert_eq!(joined, samples);
}

#[test]
fn audio_splitting_restarts_from_scratch() {
    let samples = vec![0.5f32; 10];
    let splitter = AudioSplitter::new(&samples, 4).unwrap();
    let first: Vec<_> = splitter.units().collect();
    let second: Vec<_> = splitter.units().collect();
    assert_eq!(first, second);
}

#[test]
fn empty_audio_yields_no_units() {
    let splitter = AudioSplitter::new(&[], 4).unwrap();
    assert_eq!(splitter.unit_count(), 0);
    assert_eq!(splitter.units().count(), 0);
}

#[test]
fn zero_chunk_size_is_rejected() {
    assert!(matches!(
        AudioSplitter::new(&[0.0], 0),
        Err(FxError::Validation(_))
    ));
}

/// Decodes `frames` solid frames, failing at `fail_at` when set.
struct FakeIo {
    frames: usize,
    fail_at: Option<usize>,
    unreadable: bool,
    opens: Mutex<usize>,
}

impl FakeIo {
    fn new(frames: usize) -> Self {
        Self {
            frames,
            fail_at: None,
            unreadable: false,
            opens: Mutex::new(0),
        }
    }
}

struct FakeSource {
    next: usize,
    frames: usize,
    fail_at: Option<usize>,
}

impl FrameSource for FakeSource {
    fn next_frame(&mut self) -> FxResult<Option<Frame>> {
        if Some(self.next) == self.fail_at {
            return Err(FxError::media_read("corrupt packet"));
        }
        if self.next == self.frames {
            return Ok(None);
        }
        let shade = self.next as u8;
        self.next += 1;
        Ok(Some(Frame::solid(2, 2, [shade, shade, shade, 255])))
    }
}

impl MediaIo for FakeIo {
    fn probe(&self, _input: &Path) -> FxResult<MediaInfo> {
        Ok(info())
    }

    fn open_frames(&self, _input: &Path, _info: &MediaInfo) -> FxResult<Box<dyn FrameSource>> {
        *self.opens.lock().unwrap() += 1;
        if self.unreadable {
            return Err(FxError::media_read("cannot decode input"));
        }
        Ok(Box::new(FakeSource {
            next: 0,
            frames: self.frames,
            fail_at: self.fail_at,
        }))
    }

    fn create_frame_writer(
        &self,
        _output: &Path,
        _width: u32,
        _height: u32,
        _fps: Fps,
    ) -> FxResult<Box<dyn FrameWriter>> {
        unreachable!("splitter never writes")
    }

    fn read_audio(&self, _path: &Path) -> FxResult<AudioBuffer> {
        unreachable!("splitter never reads audio")
    }

    fn write_audio(&self, _path: &Path, _audio: &AudioBuffer) -> FxResult<()> {
        unreachable!("splitter never writes audio")
    }
}

fn info() -> MediaInfo {
    MediaInfo {
        width: 2,
        height: 2,
        fps: Fps { num: 25, den: 1 },
        frame_count: 5,
        has_audio: false,
        sample_rate: 0,
    }
}

#[test]
fn video_units_follow_frame_order() {
    let io = FakeIo::new(5);
    let info = info();
    let splitter = VideoSplitter::new(&io, Path::new("in.mp4"), &info);
    let units: Vec<_> = splitter.units().unwrap().collect::<FxResult<_>>().unwrap();
    assert_eq!(units.len(), 5);
    for (i, u) in units.iter().enumerate() {
        assert_eq!(u.index, i);
        assert_eq!(u.offset, i as u64);
        assert_eq!(u.payload.data[0], i as u8);
    }
}

#[test]
fn video_units_restart_by_reopening_input() {
    let io = FakeIo::new(3);
    let info = info();
    let splitter = VideoSplitter::new(&io, Path::new("in.mp4"), &info);
    assert_eq!(splitter.units().unwrap().count(), 3);
    assert_eq!(splitter.units().unwrap().count(), 3);
    assert_eq!(*io.opens.lock().unwrap(), 2);
}

#[test]
fn decode_error_is_yielded_once_and_ends_iteration() {
    let io = FakeIo {
        fail_at: Some(2),
        ..FakeIo::new(5)
    };
    let info = info();
    let splitter = VideoSplitter::new(&io, Path::new("in.mp4"), &info);
    let mut units = splitter.units().unwrap();
    assert!(units.next().unwrap().is_ok());
    assert!(units.next().unwrap().is_ok());
    assert!(matches!(units.next(), Some(Err(FxError::MediaRead(_)))));
    assert!(units.next().is_none());
}

#[test]
fn unreadable_input_fails_before_yielding() {
    let io = FakeIo {
        unreadable: true,
        ..FakeIo::new(5)
    };
    let info = info();
    let splitter = VideoSplitter::new(&io, Path::new("in.mp4"), &info);
    assert!(matches!(splitter.units(), Err(FxError::MediaRead(_))));
}
