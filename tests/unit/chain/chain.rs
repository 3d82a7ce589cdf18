use super::*;
use crate::effects::EffectFailure;
use crate::foundation::core::AudioChunk;

#[derive(Debug)]
struct Offset(f32);

impl Effect<AudioChunk> for Offset {
    fn name(&self) -> &str {
        "offset"
    }

    fn apply(&self, mut input: AudioChunk, _ctx: &UnitContext) -> Result<AudioChunk, EffectFailure> {
        input.iter_mut().for_each(|s| *s += self.0);
        Ok(input)
    }
}

#[derive(Debug)]
struct Double;

impl Effect<AudioChunk> for Double {
    fn name(&self) -> &str {
        "double"
    }

    fn apply(&self, mut input: AudioChunk, _ctx: &UnitContext) -> Result<AudioChunk, EffectFailure> {
        input.iter_mut().for_each(|s| *s *= 2.0);
        Ok(input)
    }
}

#[derive(Debug)]
struct Broken;

impl Effect<AudioChunk> for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn apply(&self, _input: AudioChunk, _ctx: &UnitContext) -> Result<AudioChunk, EffectFailure> {
        Err(EffectFailure::new("always fails"))
    }
}

const CTX: UnitContext = UnitContext {
    index: 0,
    offset: 0,
    sample_rate: 48_000,
};

#[test]
fn empty_chain_is_identity() {
    let chain = EffectChain::<AudioChunk>::new();
    assert!(chain.is_empty());
    assert_eq!(chain.apply_all(vec![0.25, -1.0], &CTX).unwrap(), vec![0.25, -1.0]);
}

#[test]
fn effects_run_in_insertion_order() {
    let mut chain = EffectChain::<AudioChunk>::new();
    chain.add(Box::new(Offset(1.0)));
    chain.add(Box::new(Double));
    assert_eq!(chain.apply_all(vec![1.0], &CTX).unwrap(), vec![4.0]);

    chain.move_effect(1, 0).unwrap();
    assert_eq!(chain.names(), vec!["double", "offset"]);
    assert_eq!(chain.apply_all(vec![1.0], &CTX).unwrap(), vec![3.0]);
}

#[test]
fn remove_and_clear() {
    let mut chain = EffectChain::<AudioChunk>::new();
    chain.add(Box::new(Offset(1.0)));
    chain.add(Box::new(Double));
    let removed = chain.remove(0).unwrap();
    assert_eq!(removed.name(), "offset");
    assert_eq!(chain.len(), 1);
    chain.clear();
    assert!(chain.is_empty());
}

#[test]
fn bad_indices_are_validation_errors() {
    let mut chain = EffectChain::<AudioChunk>::new();
    chain.add(Box::new(Double));
    assert!(matches!(chain.remove(3), Err(FxError::Validation(_))));
    assert!(matches!(chain.move_effect(0, 1), Err(FxError::Validation(_))));
    assert_eq!(chain.len(), 1);
}

#[test]
fn failures_name_the_effect_and_position() {
    let mut chain = EffectChain::<AudioChunk>::new();
    chain.add(Box::new(Double));
    chain.add(Box::new(Broken));
    chain.add(Box::new(Offset(1.0)));
    let err = chain.apply_all(vec![1.0], &CTX).unwrap_err();
    assert_eq!(err.effect, "broken");
    assert_eq!(err.index, 1);
    assert_eq!(err.cause, "always fails");

    let fx: FxError = err.into();
    assert_eq!(fx.to_string(), "effect 'broken' failed: always fails");
}
