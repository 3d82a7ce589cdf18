//! Weighted, monotonic job progress.

use serde::{Deserialize, Serialize};

use crate::foundation::error::{FxError, FxResult};

/// Receives overall job progress as a percentage in `[0, 100]`.
pub trait ProgressSink: Send + Sync {
    /// Report the current percentage.
    fn report(&self, percent: f64);
}

impl<F> ProgressSink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn report(&self, percent: f64) {
        self(percent)
    }
}

/// Sink that drops every report.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: f64) {}
}

/// Phases of an export job, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Frame processing.
    Video,
    /// Audio chunk processing.
    Audio,
    /// Final multiplexing.
    Mux,
}

/// Share of the overall percentage each stage owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageWeights {
    /// Video pass weight.
    pub video: u32,
    /// Audio pass weight.
    pub audio: u32,
    /// Mux weight.
    pub mux: u32,
}

impl Default for StageWeights {
    fn default() -> Self {
        Self {
            video: 60,
            audio: 20,
            mux: 20,
        }
    }
}

impl StageWeights {
    /// Weight of `stage`.
    pub fn of(&self, stage: Stage) -> u32 {
        match stage {
            Stage::Video => self.video,
            Stage::Audio => self.audio,
            Stage::Mux => self.mux,
        }
    }

    /// Weights must sum to exactly 100.
    pub fn validate(&self) -> FxResult<()> {
        let total = u64::from(self.video) + u64::from(self.audio) + u64::from(self.mux);
        if total != 100 {
            return Err(FxError::validation(format!(
                "stage weights must sum to 100, got {total}"
            )));
        }
        Ok(())
    }
}

/// Maps `(stage, fraction within stage)` to a job percentage.
///
/// Reported values never decrease and the last report of a completed job is exactly 100.
/// Skipped stages jump over their share.
pub struct JobProgress<'a> {
    sink: &'a dyn ProgressSink,
    weights: StageWeights,
    base: f64,
    active: Option<Stage>,
    last: f64,
    completed: bool,
}

impl<'a> JobProgress<'a> {
    /// Tracker reporting into `sink`.
    pub fn new(sink: &'a dyn ProgressSink, weights: StageWeights) -> Self {
        Self {
            sink,
            weights,
            base: 0.0,
            active: None,
            last: 0.0,
            completed: false,
        }
    }

    /// Last value reported.
    pub fn current(&self) -> f64 {
        self.last
    }

    /// Start `stage`, closing any stage still open.
    pub fn begin_stage(&mut self, stage: Stage) {
        if self.active.is_some() {
            self.finish_stage();
        }
        self.active = Some(stage);
        self.emit(self.base);
    }

    /// Report progress within the active stage; `fraction` is clamped to `[0, 1]`.
    pub fn update(&mut self, fraction: f64) {
        let Some(stage) = self.active else {
            return;
        };
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.emit(self.base + f64::from(self.weights.of(stage)) * fraction);
    }

    /// Close the active stage at its full share.
    pub fn finish_stage(&mut self) {
        if let Some(stage) = self.active.take() {
            self.base += f64::from(self.weights.of(stage));
            self.emit(self.base);
        }
    }

    /// Consume the share of a stage that will not run.
    pub fn skip_stage(&mut self, stage: Stage) {
        tracing::debug!(?stage, "stage skipped");
        self.base += f64::from(self.weights.of(stage));
        self.emit(self.base);
    }

    /// Report exactly 100.
    pub fn complete(&mut self) {
        self.active = None;
        if !self.completed {
            self.completed = true;
            self.last = 100.0;
            self.sink.report(100.0);
        }
    }

    fn emit(&mut self, value: f64) {
        // Rounding can push intermediate values to 100; only `complete` may report it.
        let value = value.clamp(0.0, 100.0).min(99.999);
        if value > self.last {
            self.last = value;
            self.sink.report(value);
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/progress/mod.rs"]
mod tests;
