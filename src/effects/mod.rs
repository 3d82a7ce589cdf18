//! Effects: the pluggable per-unit transforms applied by a chain.
//!
//! Every effect has a host implementation. Effects that can also run on a compute device
//! report [`Capability::DualPath`] with the [`Kernel`] to dispatch; the execution path selector
//! matches on the capability instead of probing for a GPU method.

use crate::device::{DevicePayload, Kernel};
use crate::effects::descriptor::Params;
use crate::foundation::core::UnitContext;

/// Audio effects.
pub mod audio;
/// Parameter schemas and coercion.
pub mod descriptor;
/// Closed effect-kind registry and factory.
pub mod registry;
/// Video effects.
pub mod video;

/// Failure raised by one effect for one unit.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct EffectFailure {
    /// What went wrong.
    pub reason: String,
}

impl EffectFailure {
    /// Build a failure from any message.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// How an effect may be executed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Capability {
    /// Host memory only.
    HostOnly,
    /// Host, or in place on a device buffer via the given kernel.
    DualPath(Kernel),
}

/// A unit transform over payload type `P`.
///
/// Effects are stateless across calls apart from their tuning parameters, so the same instance
/// can be applied to many units concurrently.
pub trait Effect<P: DevicePayload>: Send + Sync + std::fmt::Debug {
    /// Registry name of the effect.
    fn name(&self) -> &str;

    /// Host implementation: consume the input payload and produce the output payload.
    fn apply(&self, input: P, ctx: &UnitContext) -> Result<P, EffectFailure>;

    /// Execution capability for a payload of `shape` in the unit described by `ctx`.
    fn capability(&self, _shape: P::Shape, _ctx: &UnitContext) -> Capability {
        Capability::HostOnly
    }

    /// Shape of the output for an input of `shape`. Only effects that resize their payload
    /// override this.
    fn output_shape(&self, shape: P::Shape) -> P::Shape {
        shape
    }

    /// Coerced parameters, used when saving a chain as a preset.
    fn params(&self) -> Params {
        Params::default()
    }
}
