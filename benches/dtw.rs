use criterion::{Criterion, criterion_group, criterion_main};
use mudra::dtw::{self, DtwOptions};
use mudra::landmarks::{FEATURES_PER_HAND, FrameFeatures};

const SHORT_LEN: usize = 60;
const LONG_LEN: usize = 180;

fn synthetic_sequence(len: usize, phase: f32) -> Vec<FrameFeatures> {
    (0..len)
        .map(|idx| {
            let t = idx as f32 * 0.25 + phase;
            let mut features = [0.0_f32; FEATURES_PER_HAND];
            for (feature_idx, feature) in features.iter_mut().enumerate() {
                *feature = (t + feature_idx as f32 * 0.01).sin();
            }
            FrameFeatures {
                left: None,
                right: Some(features),
            }
        })
        .collect()
}

fn bench_distance(c: &mut Criterion) {
    let short_a = synthetic_sequence(SHORT_LEN, 0.0);
    let short_b = synthetic_sequence(SHORT_LEN, 0.7);
    let long_a = synthetic_sequence(LONG_LEN, 0.0);
    let long_b = synthetic_sequence(LONG_LEN, 0.7);

    let full = DtwOptions::default();
    let banded = DtwOptions {
        band_window: Some(dtw::auto_band(LONG_LEN, LONG_LEN)),
        ..DtwOptions::default()
    };

    c.bench_function("dtw_full_60x60", |b| {
        b.iter(|| dtw::distance(&short_a, &short_b, &full))
    });
    c.bench_function("dtw_banded_60x60", |b| {
        b.iter(|| dtw::distance(&short_a, &short_b, &banded))
    });
    c.bench_function("dtw_full_180x180", |b| {
        b.iter(|| dtw::distance(&long_a, &long_b, &full))
    });
    c.bench_function("dtw_banded_180x180", |b| {
        b.iter(|| dtw::distance(&long_a, &long_b, &banded))
    });
}

criterion_group!(benches, bench_distance);
criterion_main!(benches);
