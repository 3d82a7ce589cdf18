use super::*;
use serde_json::json;

static SPECS: &[ParamSpec] = &[
    ParamSpec {
        name: "level",
        kind: ParamKind::Float {
            min: Some(0.0),
            max: Some(1.0),
        },
        default: ParamDefault::Float(0.5),
    },
    ParamSpec {
        name: "taps",
        kind: ParamKind::Int {
            min: Some(1),
            max: Some(8),
        },
        default: ParamDefault::Int(2),
    },
    ParamSpec {
        name: "wet",
        kind: ParamKind::Bool,
        default: ParamDefault::Bool(false),
    },
    ParamSpec {
        name: "mode",
        kind: ParamKind::Choice {
            choices: &["soft", "hard"],
        },
        default: ParamDefault::Choice("soft"),
    },
];

fn desc() -> EffectDescriptor {
    EffectDescriptor {
        name: "probe",
        modality: Modality::Audio,
        summary: "test schema",
        params: SPECS,
    }
}

fn raw(v: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    v.as_object().cloned().unwrap()
}

#[test]
fn missing_params_take_defaults() {
    let p = desc().coerce(&raw(json!({}))).unwrap();
    assert_eq!(p, desc().defaults());
    assert_eq!(p.float("level"), 0.5);
    assert_eq!(p.int("taps"), 2);
    assert!(!p.bool("wet"));
    assert_eq!(p.choice("mode"), "soft");
}

#[test]
fn numbers_are_cast_and_clamped() {
    let p = desc()
        .coerce(&raw(json!({ "level": 7, "taps": "3.9", "unknown": 1 })))
        .unwrap();
    assert_eq!(p.float("level"), 1.0);
    assert_eq!(p.int("taps"), 3);

    let p = desc().coerce(&raw(json!({ "taps": -4 }))).unwrap();
    assert_eq!(p.int("taps"), 1);
}

#[test]
fn bools_accept_common_spellings() {
    for (v, expected) in [
        (json!(true), true),
        (json!(0), false),
        (json!("yes"), true),
        (json!("off"), false),
    ] {
        let p = desc().coerce(&raw(json!({ "wet": v }))).unwrap();
        assert_eq!(p.bool("wet"), expected);
    }
}

#[test]
fn invalid_choice_falls_back_to_default() {
    let p = desc().coerce(&raw(json!({ "mode": "hard" }))).unwrap();
    assert_eq!(p.choice("mode"), "hard");
    let p = desc().coerce(&raw(json!({ "mode": "loud" }))).unwrap();
    assert_eq!(p.choice("mode"), "soft");
}

#[test]
fn uncastable_values_are_rejected() {
    let err = desc()
        .coerce(&raw(json!({ "level": "abc" })))
        .unwrap_err();
    assert!(err.to_string().contains("probe.level"));
    assert!(desc().coerce(&raw(json!({ "wet": [1] }))).is_err());
}

#[test]
fn params_serialize_to_json_object() {
    let p = desc().defaults();
    let obj = p.to_json();
    assert_eq!(obj.get("mode"), Some(&json!("soft")));
    assert_eq!(obj.get("taps"), Some(&json!(2)));
}
