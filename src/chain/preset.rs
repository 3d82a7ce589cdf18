use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::chain::EffectChain;
use crate::effects::Effect;
use crate::effects::registry::{AnyEffect, instantiate};
use crate::foundation::core::{AudioChunk, Frame, Modality};
use crate::foundation::error::{FxError, FxResult};
use crate::media::ensure_parent_dir;

/// One `{effect, params}` entry of a preset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectEntry {
    /// Registry name of the effect.
    pub effect: String,
    /// Raw parameters; coerced when the preset is instantiated.
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl EffectEntry {
    /// Entry with no explicit parameters (all defaults).
    pub fn new(effect: impl Into<String>) -> Self {
        Self {
            effect: effect.into(),
            params: serde_json::Map::new(),
        }
    }

    /// Entry with explicit parameters.
    pub fn with_params(
        effect: impl Into<String>,
        params: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            effect: effect.into(),
            params,
        }
    }
}

/// Ordered effect lists for both modalities.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    /// Video chain, in execution order.
    pub video: Vec<EffectEntry>,
    /// Audio chain, in execution order.
    pub audio: Vec<EffectEntry>,
}

/// Named presets persisted as one JSON document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetStore {
    presets: BTreeMap<String, Preset>,
}

impl PresetStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from `path`; a missing file yields an empty store.
    pub fn load(path: &Path) -> FxResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read preset file '{}'", path.display()))?;
        serde_json::from_str(&text)
            .map_err(|e| FxError::serde(format!("preset file '{}': {e}", path.display())))
    }

    /// Write the store to `path` as pretty JSON.
    pub fn save(&self, path: &Path) -> FxResult<()> {
        ensure_parent_dir(path)?;
        let text = serde_json::to_string_pretty(self).map_err(|e| FxError::serde(e.to_string()))?;
        std::fs::write(path, text)
            .with_context(|| format!("write preset file '{}'", path.display()))?;
        Ok(())
    }

    /// Insert or replace a preset.
    pub fn insert(&mut self, name: impl Into<String>, preset: Preset) {
        self.presets.insert(name.into(), preset);
    }

    /// Look up a preset by name.
    pub fn get(&self, name: &str) -> Option<&Preset> {
        self.presets.get(name)
    }

    /// Remove a preset, returning it if it existed.
    pub fn remove(&mut self, name: &str) -> Option<Preset> {
        self.presets.remove(name)
    }

    /// Preset names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }
}

/// The pair of chains an export job runs.
#[derive(Debug, Default)]
pub struct ChainSet {
    /// Frame chain.
    pub video: EffectChain<Frame>,
    /// Audio chunk chain.
    pub audio: EffectChain<AudioChunk>,
}

impl ChainSet {
    /// Empty chains.
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate every entry of `preset`; the first invalid entry fails the whole preset.
    pub fn from_preset(preset: &Preset) -> FxResult<Self> {
        let mut set = Self::new();
        let sections = [
            (Modality::Video, &preset.video),
            (Modality::Audio, &preset.audio),
        ];
        for (modality, entries) in sections {
            for entry in entries {
                let added = set.add_named(&entry.effect, &entry.params)?;
                if added != modality {
                    return Err(FxError::validation(format!(
                        "effect '{}' is a {added} effect but is listed under {modality}",
                        entry.effect
                    )));
                }
            }
        }
        Ok(set)
    }

    /// Snapshot both chains as a preset with fully coerced parameters.
    pub fn to_preset(&self) -> Preset {
        Preset {
            video: entries(self.video.effects()),
            audio: entries(self.audio.effects()),
        }
    }

    /// Instantiate `name` and append it to the chain of its modality.
    pub fn add_named(
        &mut self,
        name: &str,
        params: &serde_json::Map<String, serde_json::Value>,
    ) -> FxResult<Modality> {
        let effect = instantiate(name, params)?;
        let modality = effect.modality();
        match effect {
            AnyEffect::Audio(fx) => self.audio.add(Box::new(fx)),
            AnyEffect::Video(fx) => self.video.add(Box::new(fx)),
        }
        Ok(modality)
    }
}

fn entries<P: crate::device::DevicePayload>(effects: &[Box<dyn Effect<P>>]) -> Vec<EffectEntry> {
    effects
        .iter()
        .map(|e| EffectEntry::with_params(e.name(), e.params().to_json()))
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/chain/preset.rs"]
mod tests;
