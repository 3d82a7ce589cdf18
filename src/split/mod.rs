//! Unit splitters: turn a loaded stream into a lazy, restartable sequence of units.
//!
//! Indices start at 0 and increase by one; splitting never re-orders elements.

use std::path::{Path, PathBuf};

use crate::foundation::core::{AudioChunk, Frame, Unit};
use crate::foundation::error::{FxError, FxResult};
use crate::media::{FrameSource, MediaInfo, MediaIo};

/// Fixed-size chunking of a mono sample buffer.
///
/// The final chunk may be shorter than `chunk_samples`; it is never padded or dropped.
#[derive(Clone, Copy, Debug)]
pub struct AudioSplitter<'a> {
    samples: &'a [f32],
    chunk_samples: usize,
}

impl<'a> AudioSplitter<'a> {
    /// Split `samples` into chunks of `chunk_samples`.
    pub fn new(samples: &'a [f32], chunk_samples: usize) -> FxResult<Self> {
        if chunk_samples == 0 {
            return Err(FxError::validation("audio chunk size must be non-zero"));
        }
        Ok(Self {
            samples,
            chunk_samples,
        })
    }

    /// Number of units [`AudioSplitter::units`] yields.
    pub fn unit_count(&self) -> usize {
        self.samples.len().div_ceil(self.chunk_samples)
    }

    /// Fresh iterator over the chunks; each call starts from the beginning.
    pub fn units(&self) -> impl Iterator<Item = Unit<AudioChunk>> + use<'a> {
        let chunk = self.chunk_samples;
        self.samples
            .chunks(chunk)
            .enumerate()
            .map(move |(index, payload)| Unit {
                index,
                offset: (index * chunk) as u64,
                payload: payload.to_vec(),
            })
    }
}

/// One unit per decoded frame of a video input.
pub struct VideoSplitter<'a> {
    io: &'a dyn MediaIo,
    input: PathBuf,
    info: &'a MediaInfo,
}

impl<'a> VideoSplitter<'a> {
    /// Splitter over `input`, decoded through `io`.
    pub fn new(io: &'a dyn MediaIo, input: &Path, info: &'a MediaInfo) -> Self {
        Self {
            io,
            input: input.to_path_buf(),
            info,
        }
    }

    /// Re-open the input and iterate its frames from the first one.
    ///
    /// Fails with `MediaRead` when the input cannot be opened; a decode failure mid-stream
    /// is yielded once and ends the iteration.
    pub fn units(&self) -> FxResult<FrameUnits> {
        let source = self.io.open_frames(&self.input, self.info)?;
        Ok(FrameUnits {
            source,
            next_index: 0,
            done: false,
        })
    }
}

/// Iterator over decoded frames as units.
pub struct FrameUnits {
    source: Box<dyn FrameSource>,
    next_index: usize,
    done: bool,
}

impl Iterator for FrameUnits {
    type Item = FxResult<Unit<Frame>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.source.next_frame() {
            Ok(Some(frame)) => {
                let index = self.next_index;
                self.next_index += 1;
                Some(Ok(Unit {
                    index,
                    offset: index as u64,
                    payload: frame,
                }))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for FrameUnits {}

#[cfg(test)]
#[path = "../../tests/unit/split/mod.rs"]
mod tests;
