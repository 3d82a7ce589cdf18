use super::*;

fn ctx(offset: u64, sample_rate: u32) -> UnitContext {
    UnitContext {
        index: 0,
        offset,
        sample_rate,
    }
}

fn ramp(n: usize) -> Vec<f32> {
    (0..n).map(|i| (i as f32 / n as f32) - 0.5).collect()
}

#[test]
fn unity_gain_is_identity() {
    let x = ramp(64);
    let y = AudioEffect::Gain { gain: 1.0 }.apply(x.clone(), &ctx(0, 48_000)).unwrap();
    assert_eq!(x, y);
}

#[test]
fn gain_and_tremolo_expose_kernels() {
    let c = ctx(0, 48_000);
    assert!(matches!(
        AudioEffect::Gain { gain: 2.0 }.capability(64, &c),
        Capability::DualPath(Kernel::Gain { .. })
    ));
    assert!(matches!(
        AudioEffect::Tremolo { frequency: 5.0 }.capability(64, &c),
        Capability::DualPath(Kernel::Tremolo { .. })
    ));
    assert_eq!(
        AudioEffect::Echo { intensity: 0.5 }.capability(64, &c),
        Capability::HostOnly
    );
}

#[test]
fn tremolo_is_continuous_across_units() {
    let fx = AudioEffect::Tremolo { frequency: 3.0 };
    let whole = fx.apply(vec![1.0; 2000], &ctx(0, 1000)).unwrap();
    let a = fx.apply(vec![1.0; 700], &ctx(0, 1000)).unwrap();
    let b = fx.apply(vec![1.0; 1300], &ctx(700, 1000)).unwrap();
    let joined: Vec<f32> = a.into_iter().chain(b).collect();
    for (w, j) in whole.iter().zip(&joined) {
        assert!((w - j).abs() < 1e-4);
    }
}

#[test]
fn rate_dependent_effects_fail_without_rate() {
    let err = AudioEffect::Echo { intensity: 0.5 }
        .apply(vec![0.1; 16], &ctx(0, 0))
        .unwrap_err();
    assert!(err.reason.contains("echo"));
    assert_eq!(
        AudioEffect::Tremolo { frequency: 5.0 }.capability(16, &ctx(0, 0)),
        Capability::HostOnly
    );
}

#[test]
fn echo_adds_a_scaled_repeat() {
    // 0.1s at 100 Hz = 10 samples.
    let mut x = vec![0.0; 40];
    x[0] = 1.0;
    let y = AudioEffect::Echo { intensity: 0.0 }.apply(x.clone(), &ctx(0, 100)).unwrap();
    assert_eq!(y, x);

    let y = AudioEffect::Echo { intensity: 1.0 }.apply(x, &ctx(0, 100)).unwrap();
    // 0.4s = 40 samples >= len, so the delay falls back to len / 4.
    assert!((y[10] - 0.7).abs() < 1e-6);
    assert_eq!(y[20], 0.0);
}

#[test]
fn echo_handles_empty_and_tiny_chunks() {
    let fx = AudioEffect::Echo { intensity: 0.5 };
    assert!(fx.apply(Vec::new(), &ctx(0, 48_000)).unwrap().is_empty());
    assert_eq!(fx.apply(vec![0.5; 3], &ctx(0, 48_000)).unwrap(), vec![0.5; 3]);
}

#[test]
fn reverb_keeps_length_and_dc_level() {
    let y = AudioEffect::Reverb { intensity: 0.5 }
        .apply(vec![0.25; 4096], &ctx(0, 8000))
        .unwrap();
    assert_eq!(y.len(), 4096);
    // Unit-sum impulse: a settled constant input stays constant.
    assert!((y[4000] - 0.25).abs() < 1e-4);
}

#[test]
fn compression_only_touches_peaks() {
    let y = AudioEffect::Compression { intensity: 1.0 }
        .apply(vec![0.1, 0.8, -0.8], &ctx(0, 48_000))
        .unwrap();
    assert_eq!(y[0], 0.1);
    assert!((y[1] - (0.2 + 0.6 / 4.0)).abs() < 1e-6);
    assert!((y[2] + (0.2 + 0.6 / 4.0)).abs() < 1e-6);
}

#[test]
fn normalize_targets_peak_and_leaves_silence() {
    let y = AudioEffect::Normalize { intensity: 1.0 }
        .apply(vec![0.1, -0.5, 0.25], &ctx(0, 48_000))
        .unwrap();
    assert!((peak_abs(&y) - 1.0).abs() < 1e-6);
    let silent = AudioEffect::Normalize { intensity: 1.0 }
        .apply(vec![0.0; 8], &ctx(0, 48_000))
        .unwrap();
    assert_eq!(silent, vec![0.0; 8]);
}

#[test]
fn bass_boost_lifts_dc_but_not_nyquist() {
    let fx = AudioEffect::BassBoost { intensity: 0.5 };
    let dc = fx.apply(vec![0.2; 4000], &ctx(0, 8000)).unwrap();
    assert!((dc[2000] - 0.4).abs() < 1e-3);

    let alt: Vec<f32> = (0..4000).map(|i| if i % 2 == 0 { 0.2 } else { -0.2 }).collect();
    let y = fx.apply(alt.clone(), &ctx(0, 8000)).unwrap();
    assert!((y[2000] - alt[2000]).abs() < 0.05);
}

#[test]
fn pitch_shift_preserves_length() {
    let x = ramp(1000);
    for intensity in [0.0, 0.5, 1.0] {
        let y = AudioEffect::PitchShift { intensity }.apply(x.clone(), &ctx(0, 8000)).unwrap();
        assert_eq!(y.len(), x.len());
    }
    let same = AudioEffect::PitchShift { intensity: 0.5 }.apply(x.clone(), &ctx(0, 8000)).unwrap();
    assert_eq!(same, x);
    // Shifting up shortens the resampled chunk, so the tail is padded.
    let up = AudioEffect::PitchShift { intensity: 1.0 }.apply(x, &ctx(0, 8000)).unwrap();
    assert_eq!(up[999], 0.0);
}

#[test]
fn params_round_trip_through_registry() {
    let fx = AudioEffect::Reverb { intensity: 0.25 };
    let raw = fx.params().to_json();
    let rebuilt = crate::effects::registry::instantiate(fx.name(), &raw).unwrap();
    assert_eq!(rebuilt, crate::effects::registry::AnyEffect::Audio(fx));
}
