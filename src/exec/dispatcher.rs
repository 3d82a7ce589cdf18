use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use crate::chain::EffectChain;
use crate::device::DevicePayload;
use crate::exec::selector::{ExecutionContext, UnitOutcome, panic_message, run_unit};
use crate::foundation::core::{AudioBuffer, AudioChunk, Unit, peak_abs};
use crate::foundation::error::{FxError, FxResult};
use crate::split::AudioSplitter;

/// Per-stage unit accounting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    /// Units processed.
    pub units: usize,
    /// Units whose original payload was substituted after a host failure.
    pub failed_units: usize,
    /// Units re-run on the host after a device failure.
    pub device_fallbacks: usize,
}

impl StageReport {
    fn record<P>(&mut self, outcome: &UnitOutcome<P>) {
        self.units += 1;
        self.failed_units += usize::from(outcome.failed);
        self.device_fallbacks += usize::from(outcome.fell_back);
    }

    /// Add the counts of another batch of the same stage.
    pub fn absorb(&mut self, other: StageReport) {
        self.units += other.units;
        self.failed_units += other.failed_units;
        self.device_fallbacks += other.device_fallbacks;
    }
}

/// Bounded worker pool running one task per unit and collecting results in submission order.
pub struct Dispatcher {
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("threads", &self.threads())
            .finish()
    }
}

impl Dispatcher {
    /// Pool of `threads` workers, or one per hardware thread when `None`.
    pub fn new(threads: Option<usize>) -> FxResult<Self> {
        Ok(Self {
            pool: build_thread_pool(threads)?,
        })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `chain` over every unit and return the outputs in unit order.
    ///
    /// One task is spawned per unit in index order; the caller then waits on each task's
    /// result in that same order, so the n-th output is always the n-th unit's, however the
    /// workers interleave. `on_collect` receives the number of units collected so far.
    /// Unit failures are contained per [`ExecutionContext::policy`]; the first error under an
    /// aborting policy is returned after outstanding tasks have finished.
    #[tracing::instrument(skip_all, fields(units = units.len(), threads = self.threads()))]
    pub fn run<P>(
        &self,
        chain: &EffectChain<P>,
        units: &[Unit<P>],
        sample_rate: u32,
        exec: &ExecutionContext,
        mut on_collect: impl FnMut(usize),
    ) -> FxResult<(Vec<P>, StageReport)>
    where
        P: DevicePayload + Clone + Send + Sync,
    {
        let span = tracing::Span::current();
        self.pool.in_place_scope(|scope| -> FxResult<(Vec<P>, StageReport)> {
            let mut pending = Vec::with_capacity(units.len());
            for unit in units {
                let (tx, rx) = crossbeam_channel::bounded(1);
                let span = span.clone();
                scope.spawn(move |_| {
                    let _entered = span.enter();
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        run_unit(chain, unit, sample_rate, exec)
                    }))
                    .unwrap_or_else(|payload| {
                        Err(FxError::effect("<worker>", panic_message(payload.as_ref())))
                    });
                    // The receiver is gone only when collection already stopped on an error.
                    let _ = tx.send(outcome);
                });
                pending.push((unit.index, rx));
            }

            let mut out = Vec::with_capacity(pending.len());
            let mut report = StageReport::default();
            for (done, (index, rx)) in pending.into_iter().enumerate() {
                let outcome = rx.recv().map_err(|_| {
                    anyhow::anyhow!("worker for unit {index} exited without a result")
                })??;
                report.record(&outcome);
                out.push(outcome.payload);
                on_collect(done + 1);
            }
            Ok((out, report))
        })
    }

    /// Run the audio pass: split into chunks, process, concatenate in order and normalize once.
    ///
    /// `normalize_peak` scales the whole track so its peak equals the target; silence is left
    /// untouched. `on_progress` receives the completed fraction of the stage.
    #[tracing::instrument(skip_all, fields(samples = audio.samples.len(), chunk_samples = chunk_samples))]
    pub fn process_audio(
        &self,
        chain: &EffectChain<AudioChunk>,
        audio: &AudioBuffer,
        chunk_samples: usize,
        exec: &ExecutionContext,
        normalize_peak: Option<f32>,
        mut on_progress: impl FnMut(f64),
    ) -> FxResult<(AudioBuffer, StageReport)> {
        let splitter = AudioSplitter::new(&audio.samples, chunk_samples)?;
        let units: Vec<Unit<AudioChunk>> = splitter.units().collect();
        let total = units.len().max(1) as f64;
        let (chunks, report) = self.run(chain, &units, audio.sample_rate, exec, |done| {
            on_progress(done as f64 / total)
        })?;

        let mut samples = Vec::with_capacity(audio.samples.len());
        for chunk in chunks {
            samples.extend_from_slice(&chunk);
        }
        if let Some(target) = normalize_peak {
            normalize_to_peak(&mut samples, target);
        }
        tracing::info!(?report, "audio pass complete");
        Ok((
            AudioBuffer {
                sample_rate: audio.sample_rate,
                samples,
            },
            report,
        ))
    }
}

/// Scale `samples` so the absolute peak equals `target`. Returns the applied factor.
///
/// Silent input is left as is. A factor of exactly 1 leaves the samples bit-identical.
pub fn normalize_to_peak(samples: &mut [f32], target: f32) -> f32 {
    let peak = peak_abs(samples);
    if peak <= 0.0 {
        return 1.0;
    }
    let factor = target / peak;
    if factor != 1.0 {
        for s in samples.iter_mut() {
            *s *= factor;
        }
    }
    factor
}

fn build_thread_pool(threads: Option<usize>) -> FxResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(FxError::validation("threads must be >= 1 when set"));
    }
    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("fxpipe-worker-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| FxError::from(anyhow::anyhow!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/exec/dispatcher.rs"]
mod tests;
