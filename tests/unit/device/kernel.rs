use super::*;

#[test]
fn gain_scales_every_element() {
    let mut data = vec![0.5, -1.0, 0.25];
    Kernel::Gain { factor: 2.0 }.run_host(&mut data);
    assert_eq!(data, vec![1.0, -2.0, 0.5]);
}

#[test]
fn tremolo_phase_is_continuous_across_units() {
    let sr = 8_000;
    let mut whole = vec![1.0f32; 200];
    Kernel::tremolo(5.0, sr, 0).run_host(&mut whole);

    let mut first = vec![1.0f32; 120];
    let mut second = vec![1.0f32; 80];
    Kernel::tremolo(5.0, sr, 0).run_host(&mut first);
    Kernel::tremolo(5.0, sr, 120).run_host(&mut second);

    first.extend(second);
    for (a, b) in whole.iter().zip(&first) {
        assert!((a - b).abs() < 1e-5);
    }
}

#[test]
fn vignette_keeps_centre_and_alpha() {
    let mut data = vec![200.0f32; 5 * 5 * 4];
    Kernel::Vignette {
        width: 5,
        height: 5,
        strength: 1.0,
    }
    .run_host(&mut data);

    let centre = (2 * 5 + 2) * 4;
    assert!((data[centre] - 200.0).abs() < 1e-4);
    assert!(data[0] < 200.0);
    assert_eq!(data[3], 200.0);
}

#[test]
fn axis_weight_peaks_at_one() {
    assert!((axis_weight(2.0, 5) - 1.0).abs() < 1e-6);
    assert!((axis_weight(1.0, 4) - 1.0).abs() < 1e-6);
    assert!((axis_weight(2.0, 4) - 1.0).abs() < 1e-6);
    assert!(axis_weight(0.0, 4) < 1.0);
}
