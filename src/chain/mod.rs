//! Effect chains and the presets they are saved as.

#[allow(clippy::module_inception)]
mod chain;
mod preset;

pub use chain::{EffectApplicationError, EffectChain};
pub use preset::{ChainSet, EffectEntry, Preset, PresetStore};
