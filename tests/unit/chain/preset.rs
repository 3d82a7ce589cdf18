use super::*;
use serde_json::json;

fn params(v: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    v.as_object().cloned().unwrap()
}

fn sample_preset() -> Preset {
    Preset {
        video: vec![
            EffectEntry::with_params("crop", params(json!({ "ratio": "9:16" }))),
            EffectEntry::new("vignette"),
        ],
        audio: vec![
            EffectEntry::with_params("gain", params(json!({ "gain": 2.0 }))),
            EffectEntry::with_params("echo", params(json!({ "intensity": 0.25 }))),
        ],
    }
}

#[test]
fn preset_round_trips_through_chains() {
    let chains = ChainSet::from_preset(&sample_preset()).unwrap();
    assert_eq!(chains.video.names(), vec!["crop", "vignette"]);
    assert_eq!(chains.audio.names(), vec!["gain", "echo"]);

    let saved = chains.to_preset();
    assert_eq!(saved.video[0].params.get("ratio"), Some(&json!("9:16")));
    assert_eq!(saved.video[1].params.get("intensity"), Some(&json!(0.5)));

    let again = ChainSet::from_preset(&saved).unwrap().to_preset();
    assert_eq!(again, saved);
}

#[test]
fn misplaced_effects_are_rejected() {
    let preset = Preset {
        video: vec![EffectEntry::new("echo")],
        audio: Vec::new(),
    };
    let err = ChainSet::from_preset(&preset).unwrap_err();
    assert!(matches!(err, FxError::Validation(_)));
    assert!(ChainSet::from_preset(&Preset {
        video: vec![EffectEntry::new("sparkle")],
        audio: Vec::new(),
    })
    .is_err());
}

#[test]
fn add_named_routes_by_modality() {
    let mut set = ChainSet::new();
    assert_eq!(
        set.add_named("Bass-Boost", &serde_json::Map::new()).unwrap(),
        Modality::Audio
    );
    assert_eq!(
        set.add_named("mirror", &serde_json::Map::new()).unwrap(),
        Modality::Video
    );
    assert_eq!(set.audio.len(), 1);
    assert_eq!(set.video.len(), 1);
}

#[test]
fn store_persists_named_presets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("presets.json");

    let empty = PresetStore::load(&path).unwrap();
    assert_eq!(empty.names().count(), 0);

    let mut store = PresetStore::new();
    store.insert("loud", sample_preset());
    store.insert("clean", Preset::default());
    store.save(&path).unwrap();

    let loaded = PresetStore::load(&path).unwrap();
    assert_eq!(loaded, store);
    assert_eq!(loaded.names().collect::<Vec<_>>(), vec!["clean", "loud"]);
    assert_eq!(loaded.get("loud"), Some(&sample_preset()));

    let mut loaded = loaded;
    assert!(loaded.remove("clean").is_some());
    assert!(loaded.get("clean").is_none());
}

#[test]
fn malformed_store_is_a_serde_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("presets.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(PresetStore::load(&path), Err(FxError::Serde(_))));
}
