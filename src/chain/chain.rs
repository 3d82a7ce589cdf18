use crate::device::DevicePayload;
use crate::effects::Effect;
use crate::foundation::core::UnitContext;
use crate::foundation::error::{FxError, FxResult};

/// One effect of a chain failed for one unit.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("effect '{effect}' (position {index}) failed: {cause}")]
pub struct EffectApplicationError {
    /// Name of the failing effect.
    pub effect: String,
    /// Position of the failing effect in the chain.
    pub index: usize,
    /// Reason reported by the effect.
    pub cause: String,
}

impl From<EffectApplicationError> for FxError {
    fn from(e: EffectApplicationError) -> Self {
        FxError::effect(e.effect, e.cause)
    }
}

/// Ordered effect sequence for one modality.
///
/// Insertion order is execution order. An empty chain is the identity transform. Mutation
/// takes `&mut self`, so a chain cannot change while a dispatch holds it by shared reference.
pub struct EffectChain<P: DevicePayload> {
    effects: Vec<Box<dyn Effect<P>>>,
}

impl<P: DevicePayload> Default for EffectChain<P> {
    fn default() -> Self {
        Self {
            effects: Vec::new(),
        }
    }
}

impl<P: DevicePayload> std::fmt::Debug for EffectChain<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.effects.iter()).finish()
    }
}

impl<P: DevicePayload> EffectChain<P> {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an effect at the end.
    pub fn add(&mut self, effect: Box<dyn Effect<P>>) {
        self.effects.push(effect);
    }

    /// Remove and return the effect at `index`.
    pub fn remove(&mut self, index: usize) -> FxResult<Box<dyn Effect<P>>> {
        self.check_index(index)?;
        Ok(self.effects.remove(index))
    }

    /// Move the effect at `from` so it ends up at position `to`.
    pub fn move_effect(&mut self, from: usize, to: usize) -> FxResult<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        let effect = self.effects.remove(from);
        self.effects.insert(to, effect);
        Ok(())
    }

    /// Remove every effect.
    pub fn clear(&mut self) {
        self.effects.clear();
    }

    /// Number of effects.
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// `true` for the identity chain.
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Effects in execution order.
    pub fn effects(&self) -> &[Box<dyn Effect<P>>] {
        &self.effects
    }

    /// Effect names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.effects.iter().map(|e| e.name()).collect()
    }

    /// Shape a successful run of the chain produces for an input of `shape`.
    pub fn output_shape(&self, shape: P::Shape) -> P::Shape {
        self.effects
            .iter()
            .fold(shape, |shape, effect| effect.output_shape(shape))
    }

    /// Run every effect's host implementation in order, feeding each output to the next.
    ///
    /// The first failure stops the chain and is returned to the caller, which owns the
    /// fallback policy.
    pub fn apply_all(&self, mut payload: P, ctx: &UnitContext) -> Result<P, EffectApplicationError> {
        for (index, effect) in self.effects.iter().enumerate() {
            payload = effect
                .apply(payload, ctx)
                .map_err(|e| EffectApplicationError {
                    effect: effect.name().to_string(),
                    index,
                    cause: e.reason,
                })?;
        }
        Ok(payload)
    }

    fn check_index(&self, index: usize) -> FxResult<()> {
        if index >= self.effects.len() {
            return Err(FxError::validation(format!(
                "chain index {index} out of range (chain has {} effects)",
                self.effects.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/chain/chain.rs"]
mod tests;
