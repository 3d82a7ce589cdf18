use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chain::{EffectApplicationError, EffectChain};
use crate::device::{ComputeDevice, DeviceBuffer, DeviceError, DevicePayload};
use crate::effects::Capability;
use crate::foundation::core::{Unit, UnitContext};
use crate::foundation::error::FxResult;

/// What to do with a unit whose host path fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitFailurePolicy {
    /// Emit the unit's original payload, log a warning and keep going.
    #[default]
    SubstituteOriginal,
    /// Fail the whole stage with the effect error.
    Abort,
}

/// Per-job execution settings shared by every unit task.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    /// Leased compute device; `None` runs every unit on the host.
    pub device: Option<Arc<dyn ComputeDevice>>,
    /// Host failure handling.
    pub policy: UnitFailurePolicy,
}

impl ExecutionContext {
    /// Host-only context with the given policy.
    pub fn host(policy: UnitFailurePolicy) -> Self {
        Self {
            device: None,
            policy,
        }
    }

    /// Context that tries `device` first.
    pub fn with_device(device: Arc<dyn ComputeDevice>, policy: UnitFailurePolicy) -> Self {
        Self {
            device: Some(device),
            policy,
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("device", &self.device.as_ref().map(|d| d.name().to_string()))
            .field("policy", &self.policy)
            .finish()
    }
}

/// Result of running one unit through its chain.
#[derive(Clone, Debug, PartialEq)]
pub struct UnitOutcome<P> {
    /// Output payload (the original payload when `failed`).
    pub payload: P,
    /// The host path failed and the original payload was substituted.
    pub failed: bool,
    /// The device path failed and the unit was re-run on the host.
    pub fell_back: bool,
}

enum DevicePathError {
    Device(DeviceError),
    Effect(EffectApplicationError),
}

impl From<DeviceError> for DevicePathError {
    fn from(e: DeviceError) -> Self {
        Self::Device(e)
    }
}

enum Residence<P> {
    Host(P),
    Device(DeviceBuffer),
}

/// Produce the chain's output for `unit`.
///
/// With a device, dual-path effects run in place on a device buffer and host-only effects run
/// on host memory; transfers happen only when consecutive effects disagree on where the data
/// lives. Any device failure abandons the device attempt and re-runs the whole chain on the
/// host from the original payload. A host failure (including a panic inside an effect) is
/// handled according to [`UnitFailurePolicy`].
pub fn run_unit<P>(
    chain: &EffectChain<P>,
    unit: &Unit<P>,
    sample_rate: u32,
    exec: &ExecutionContext,
) -> FxResult<UnitOutcome<P>>
where
    P: DevicePayload + Clone,
{
    let ctx = unit.context(sample_rate);
    let mut fell_back = false;

    if let Some(device) = exec.device.as_deref() {
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            device_path(device, chain, &unit.payload, &ctx)
        }))
        .unwrap_or_else(|payload| {
            Err(DevicePathError::Device(DeviceError::Kernel {
                kernel: "device path",
                reason: panic_message(payload.as_ref()),
            }))
        });
        match attempt {
            Ok(payload) => {
                return Ok(UnitOutcome {
                    payload,
                    failed: false,
                    fell_back: false,
                });
            }
            Err(DevicePathError::Device(err)) => {
                tracing::warn!(
                    unit = unit.index,
                    device = device.name(),
                    error = %err,
                    "device path failed; re-running unit on host"
                );
                fell_back = true;
            }
            Err(DevicePathError::Effect(err)) => return on_host_failure(unit, exec, err, false),
        }
    }

    match host_path(chain, &unit.payload, &ctx) {
        Ok(payload) => Ok(UnitOutcome {
            payload,
            failed: false,
            fell_back,
        }),
        Err(err) => on_host_failure(unit, exec, err, fell_back),
    }
}

fn host_path<P>(
    chain: &EffectChain<P>,
    input: &P,
    ctx: &UnitContext,
) -> Result<P, EffectApplicationError>
where
    P: DevicePayload + Clone,
{
    panic::catch_unwind(AssertUnwindSafe(|| chain.apply_all(input.clone(), ctx))).unwrap_or_else(
        |payload| {
            Err(EffectApplicationError {
                effect: "<panic>".to_string(),
                index: 0,
                cause: panic_message(payload.as_ref()),
            })
        },
    )
}

fn device_path<P>(
    device: &dyn ComputeDevice,
    chain: &EffectChain<P>,
    input: &P,
    ctx: &UnitContext,
) -> Result<P, DevicePathError>
where
    P: DevicePayload + Clone,
{
    let mut shape = input.shape();
    let mut data = Residence::Host(input.clone());

    for (index, effect) in chain.effects().iter().enumerate() {
        data = match effect.capability(shape, ctx) {
            Capability::DualPath(kernel) => {
                let mut buf = match data {
                    Residence::Device(buf) => buf,
                    Residence::Host(payload) => {
                        tracing::debug!(unit = ctx.index, effect = effect.name(), "upload");
                        device.upload(&payload.to_f32())?
                    }
                };
                device.dispatch(&mut buf, &kernel)?;
                Residence::Device(buf)
            }
            Capability::HostOnly => {
                let payload = match data {
                    Residence::Host(payload) => payload,
                    Residence::Device(buf) => {
                        tracing::debug!(unit = ctx.index, effect = effect.name(), "download");
                        P::from_f32(device.download(&buf)?, shape)?
                    }
                };
                let out = effect.apply(payload, ctx).map_err(|e| {
                    DevicePathError::Effect(EffectApplicationError {
                        effect: effect.name().to_string(),
                        index,
                        cause: e.reason,
                    })
                })?;
                shape = out.shape();
                Residence::Host(out)
            }
        };
    }

    match data {
        Residence::Host(payload) => Ok(payload),
        Residence::Device(buf) => Ok(P::from_f32(device.download(&buf)?, shape)?),
    }
}

fn on_host_failure<P: Clone>(
    unit: &Unit<P>,
    exec: &ExecutionContext,
    err: EffectApplicationError,
    fell_back: bool,
) -> FxResult<UnitOutcome<P>> {
    match exec.policy {
        UnitFailurePolicy::Abort => Err(err.into()),
        UnitFailurePolicy::SubstituteOriginal => {
            tracing::warn!(
                unit = unit.index,
                effect = %err.effect,
                cause = %err.cause,
                "effect failed; substituting original unit"
            );
            Ok(UnitOutcome {
                payload: unit.payload.clone(),
                failed: true,
                fell_back,
            })
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/exec/selector.rs"]
mod tests;
