use super::*;

#[test]
fn defaults_are_valid() {
    let cfg = ExportConfig::default();
    cfg.validate().unwrap();
    assert_eq!(cfg.audio_chunk_samples, 32_768);
    assert_eq!(cfg.normalize_peak, Some(0.9));
    assert_eq!(cfg.unit_failure_policy, UnitFailurePolicy::SubstituteOriginal);
}

#[test]
fn partial_json_keeps_other_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fxpipe.json");
    std::fs::write(
        &path,
        r#"{ "threads": 2, "device": "gpu", "unit_failure_policy": "abort", "normalize_peak": null }"#,
    )
    .unwrap();

    let cfg = ExportConfig::from_json_file(&path).unwrap();
    assert_eq!(cfg.threads, Some(2));
    assert_eq!(cfg.device, DeviceChoice::Gpu);
    assert_eq!(cfg.unit_failure_policy, UnitFailurePolicy::Abort);
    assert_eq!(cfg.normalize_peak, None);
    assert_eq!(cfg.video_batch_frames, 64);
    assert_eq!(cfg.audio_codec, "aac");
}

#[test]
fn missing_normalize_peak_uses_default() {
    let cfg: ExportConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(cfg, ExportConfig::default());
}

#[test]
fn invalid_settings_are_rejected() {
    let cases = [
        ExportConfig {
            audio_chunk_samples: 0,
            ..ExportConfig::default()
        },
        ExportConfig {
            threads: Some(0),
            ..ExportConfig::default()
        },
        ExportConfig {
            normalize_peak: Some(1.5),
            ..ExportConfig::default()
        },
        ExportConfig {
            stage_weights: StageWeights {
                video: 70,
                audio: 20,
                mux: 20,
            },
            ..ExportConfig::default()
        },
    ];
    for cfg in cases {
        assert!(matches!(cfg.validate(), Err(FxError::Validation(_))), "{cfg:?}");
    }
}

#[test]
fn malformed_file_is_a_serde_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{ threads: ").unwrap();
    assert!(matches!(
        ExportConfig::from_json_file(&path),
        Err(FxError::Serde(_))
    ));
}
