use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context as _;

use crate::foundation::error::FxResult;

static NEXT_JOB: AtomicU64 = AtomicU64::new(0);

/// Logical names of the temporary files an export job creates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactId {
    /// Audio track extracted from the input.
    ExtractedAudio,
    /// Output of the video pass.
    ProcessedVideo,
    /// Output of the audio pass.
    ProcessedAudio,
    /// Final container before it is moved to the requested output path.
    StagedOutput,
}

impl ArtifactId {
    fn stem(self) -> &'static str {
        match self {
            Self::ExtractedAudio => "extracted_audio",
            Self::ProcessedVideo => "processed_video",
            Self::ProcessedAudio => "processed_audio",
            Self::StagedOutput => "staged_output",
        }
    }
}

/// Temporary files owned by one export job, kept in a job-private directory.
///
/// [`TempArtifactSet::cleanup`] (also run on drop) deletes every registered file once and then
/// the directory. Deletion failures are logged as warnings and never returned.
#[derive(Debug)]
pub struct TempArtifactSet {
    dir: PathBuf,
    entries: BTreeMap<ArtifactId, PathBuf>,
    cleaned: bool,
}

impl TempArtifactSet {
    /// Create a fresh job directory under `root`.
    pub fn create(root: &Path) -> FxResult<Self> {
        let dir = root.join(format!(
            "fxpipe_job_{}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0),
            NEXT_JOB.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create temp directory '{}'", dir.display()))?;
        tracing::debug!(dir = %dir.display(), "artifact directory created");
        Ok(Self {
            dir,
            entries: BTreeMap::new(),
            cleaned: false,
        })
    }

    /// Job directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Register `id` with the given file extension and return its path.
    ///
    /// Registering the same id again returns the existing path.
    pub fn register(&mut self, id: ArtifactId, extension: &str) -> PathBuf {
        let dir = &self.dir;
        self.entries
            .entry(id)
            .or_insert_with(|| dir.join(format!("{}.{extension}", id.stem())))
            .clone()
    }

    /// Path of a registered artifact.
    pub fn get(&self, id: ArtifactId) -> Option<&Path> {
        self.entries.get(&id).map(PathBuf::as_path)
    }

    /// Every registered path.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.values().cloned().collect()
    }

    /// Delete every registered artifact and the job directory. Returns the number of
    /// deletions that failed. Later calls do nothing.
    pub fn cleanup(&mut self) -> usize {
        if self.cleaned {
            return 0;
        }
        self.cleaned = true;
        let mut failures = 0;
        for (id, path) in std::mem::take(&mut self.entries) {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!(?id, path = %path.display(), "artifact removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    failures += 1;
                    tracing::warn!(?id, path = %path.display(), error = %e, "failed to remove temporary artifact");
                }
            }
        }
        if let Err(e) = std::fs::remove_dir(&self.dir)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            failures += 1;
            tracing::warn!(dir = %self.dir.display(), error = %e, "failed to remove temporary directory");
        }
        failures
    }
}

impl Drop for TempArtifactSet {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/artifacts.rs"]
mod tests;
