use super::*;

const CTX: UnitContext = UnitContext {
    index: 0,
    offset: 0,
    sample_rate: 0,
};

fn gradient(w: u32, h: u32) -> Frame {
    let mut data = Vec::with_capacity((w * h * 4) as usize);
    for y in 0..h {
        for x in 0..w {
            data.extend_from_slice(&[(x * 10) as u8, (y * 10) as u8, 100, 255]);
        }
    }
    Frame::new(w, h, data).unwrap()
}

fn px(f: &Frame, x: u32, y: u32) -> [u8; 4] {
    let i = ((y * f.width + x) * 4) as usize;
    [f.data[i], f.data[i + 1], f.data[i + 2], f.data[i + 3]]
}

#[test]
fn zero_blur_is_identity() {
    let f = gradient(8, 8);
    let out = VideoEffect::Blur { intensity: 0.0 }.apply(f.clone(), &CTX).unwrap();
    assert_eq!(out, f);
    assert_eq!(blur_sigma(0.04), None);
    assert!(blur_sigma(0.5).is_some_and(|s| (s - 3.5).abs() < 1e-6));
}

#[test]
fn blur_keeps_dimensions_and_smooths_edges() {
    let mut f = Frame::solid(16, 16, [0, 0, 0, 255]);
    for y in 0..16 {
        for x in 8..16 {
            let i = ((y * 16 + x) * 4) as usize;
            f.data[i..i + 3].copy_from_slice(&[255, 255, 255]);
        }
    }
    let out = VideoEffect::Blur { intensity: 0.2 }.apply(f, &CTX).unwrap();
    assert_eq!((out.width, out.height), (16, 16));
    let edge = px(&out, 7, 8)[0];
    assert!(edge > 0 && edge < 255);
}

#[test]
fn mirror_flips_along_axis() {
    let f = gradient(4, 3);
    let h = VideoEffect::Mirror {
        axis: MirrorAxis::Horizontal,
    }
    .apply(f.clone(), &CTX)
    .unwrap();
    assert_eq!(px(&h, 0, 0), px(&f, 3, 0));

    let v = VideoEffect::Mirror {
        axis: MirrorAxis::Vertical,
    }
    .apply(f.clone(), &CTX)
    .unwrap();
    assert_eq!(px(&v, 1, 0), px(&f, 1, 2));
}

#[test]
fn color_filter_keeps_greys_and_alpha() {
    let grey = Frame::solid(2, 2, [128, 128, 128, 77]);
    let out = VideoEffect::ColorFilter { intensity: 1.0 }.apply(grey.clone(), &CTX).unwrap();
    assert_eq!(out, grey);

    let red = Frame::solid(1, 1, [200, 50, 50, 255]);
    let out = VideoEffect::ColorFilter { intensity: 1.0 }.apply(red, &CTX).unwrap();
    let [r, g, b, a] = px(&out, 0, 0);
    assert!(r > 200 && g < 50 && b < 50);
    assert_eq!(a, 255);
}

#[test]
fn vignette_darkens_corners_more_than_centre() {
    let f = Frame::solid(9, 9, [200, 200, 200, 255]);
    let fx = VideoEffect::Vignette { intensity: 1.0 };
    let out = fx.apply(f, &CTX).unwrap();
    assert_eq!(px(&out, 4, 4), [200, 200, 200, 255]);
    assert!(px(&out, 0, 0)[0] < px(&out, 4, 0)[0]);
    assert_eq!(px(&out, 0, 0)[3], 255);
    assert!(matches!(
        fx.capability((9, 9), &CTX),
        Capability::DualPath(Kernel::Vignette {
            width: 9,
            height: 9,
            ..
        })
    ));
}

#[test]
fn crop_produces_even_centred_region() {
    let f = gradient(20, 20);
    let out = VideoEffect::Crop {
        ratio: CropRatio::Landscape16x9,
    }
    .apply(f.clone(), &CTX)
    .unwrap();
    // 20 * 9 / 16 = 11 -> 10 (even), offset (20 - 10) / 2 = 5.
    assert_eq!((out.width, out.height), (20, 10));
    assert_eq!(px(&out, 0, 0), px(&f, 0, 5));

    let out = VideoEffect::Crop {
        ratio: CropRatio::Portrait9x16,
    }
    .apply(gradient(32, 18), &CTX)
    .unwrap();
    assert_eq!((out.width, out.height), (10, 18));
}

#[test]
fn crop_leaves_matching_or_degenerate_frames() {
    let f = gradient(32, 18);
    let out = VideoEffect::Crop {
        ratio: CropRatio::Landscape16x9,
    }
    .apply(f.clone(), &CTX)
    .unwrap();
    assert_eq!(out, f);

    let tiny = gradient(1, 1);
    let out = VideoEffect::Crop {
        ratio: CropRatio::Ultrawide21x9,
    }
    .apply(tiny.clone(), &CTX)
    .unwrap();
    assert_eq!(out, tiny);
}

#[test]
fn crop_rounds_both_sides_to_even() {
    let f = gradient(10, 7);
    let fx = VideoEffect::Crop {
        ratio: CropRatio::Square,
    };
    // 7x7 region rounds to 6x6 on both axes, offset ((10 - 6) / 2, (7 - 6) / 2).
    assert_eq!(fx.output_shape((10, 7)), (6, 6));
    let out = fx.apply(f.clone(), &CTX).unwrap();
    assert_eq!((out.width, out.height), (6, 6));
    assert_eq!(px(&out, 0, 0), px(&f, 2, 0));
}

#[test]
fn crop_output_shape_matches_apply() {
    for (w, h) in [(20, 20), (32, 18), (1, 1), (33, 17), (640, 360)] {
        for ratio in [
            CropRatio::Landscape16x9,
            CropRatio::Portrait9x16,
            CropRatio::Standard4x3,
            CropRatio::Square,
            CropRatio::Ultrawide21x9,
        ] {
            let fx = VideoEffect::Crop { ratio };
            let out = fx.apply(gradient(w, h), &CTX).unwrap();
            assert_eq!(fx.output_shape((w, h)), (out.width, out.height), "{w}x{h} {ratio:?}");
        }
    }
}

#[test]
fn fit_frame_crops_then_resizes_to_target() {
    let f = gradient(4, 4);
    let out = fit_frame(f.clone(), (4, 2)).unwrap();
    assert_eq!((out.width, out.height), (4, 2));
    assert_eq!(px(&out, 0, 0), px(&f, 0, 1));

    let out = fit_frame(gradient(8, 8), (2, 2)).unwrap();
    assert_eq!((out.width, out.height), (2, 2));

    assert_eq!(fit_frame(f.clone(), (4, 4)).unwrap(), f);
    assert!(fit_frame(f, (0, 2)).is_err());
}

fn at_frame(offset: u64) -> UnitContext {
    UnitContext {
        index: offset as usize,
        offset,
        sample_rate: 0,
    }
}

fn lifted_columns(out: &Frame, base: &Frame) -> Vec<u32> {
    (0..base.width)
        .filter(|&x| px(out, x, 0) != px(base, x, 0))
        .collect()
}

#[test]
fn light_bar_sweeps_across_and_back() {
    let base = Frame::solid(10, 2, [100, 100, 100, 255]);
    let fx = VideoEffect::LightBar { intensity: 0.5 };
    let at = |n| fx.apply(base.clone(), &at_frame(n)).unwrap();

    let first = at(0);
    assert_eq!(lifted_columns(&first, &base), vec![0, 1]);
    assert_eq!(px(&first, 0, 1), [125, 125, 125, 255]);
    assert_eq!(lifted_columns(&at(50), &base), vec![3, 4, 5, 6]);
    assert_eq!(lifted_columns(&at(100), &base), vec![8, 9]);
    assert_eq!(at(150), at(50));
    assert_eq!(at(250), at(50));
}

#[test]
fn light_bar_frame_output_ignores_dispatch_order() {
    let base = gradient(12, 3);
    let fx = VideoEffect::LightBar { intensity: 1.0 };
    let forward: Vec<Frame> = (0..40)
        .map(|n| fx.apply(base.clone(), &at_frame(n)).unwrap())
        .collect();
    let mut backward: Vec<Frame> = (0..40)
        .rev()
        .map(|n| fx.apply(base.clone(), &at_frame(n)).unwrap())
        .collect();
    backward.reverse();
    assert_eq!(forward, backward);
    assert_ne!(forward[0], forward[20]);
}

#[test]
fn light_bar_saturates_and_keeps_alpha() {
    let base = Frame::solid(4, 1, [240, 10, 0, 90]);
    let out = VideoEffect::LightBar { intensity: 1.0 }
        .apply(base, &at_frame(0))
        .unwrap();
    assert_eq!(px(&out, 0, 0), [255, 60, 50, 90]);
    assert_eq!(px(&out, 3, 0), [240, 10, 0, 90]);
}

#[test]
fn brightness_clamps_or_wraps() {
    let f = Frame::solid(1, 1, [250, 10, 128, 200]);
    let out = VideoEffect::Brightness {
        amount: 10,
        clamp: true,
    }
    .apply(f.clone(), &CTX)
    .unwrap();
    assert_eq!(px(&out, 0, 0), [255, 20, 138, 200]);

    let out = VideoEffect::Brightness {
        amount: 10,
        clamp: false,
    }
    .apply(f, &CTX)
    .unwrap();
    assert_eq!(px(&out, 0, 0), [4, 20, 138, 200]);
}

#[test]
fn params_round_trip_through_registry() {
    for fx in [
        VideoEffect::Crop {
            ratio: CropRatio::Square,
        },
        VideoEffect::Brightness {
            amount: -40,
            clamp: false,
        },
        VideoEffect::Mirror {
            axis: MirrorAxis::Vertical,
        },
        VideoEffect::LightBar { intensity: 0.25 },
    ] {
        let raw = fx.params().to_json();
        let rebuilt = crate::effects::registry::instantiate(fx.name(), &raw).unwrap();
        assert_eq!(rebuilt, crate::effects::registry::AnyEffect::Video(fx));
    }
}
