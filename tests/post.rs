use approx::assert_abs_diff_eq;
use rand::{rngs::StdRng, SeedableRng};
use sample_pack_core::{
    core::post::{
        apply_fade, dbfs_to_gain, humanize, humanize_samples, normalize, preprocess_samples, rms,
    },
    read_audio, write_mono, HumanizeOptions, Layout, PreprocessOptions, Reporter, StemKind,
};
use std::fs;
use tempfile::tempdir;

fn tone(n: usize) -> Vec<f32> {
    (0..n).map(|i| (i as f32 * 0.05).sin() * 0.3 + 0.1).collect()
}

#[test]
fn normalize_hits_target_and_is_idempotent() {
    let mut y = tone(4096);
    normalize(&mut y, -14.0);
    assert_abs_diff_eq!(rms(&y), dbfs_to_gain(-14.0), epsilon = 1e-5);

    let once = y.clone();
    normalize(&mut y, -14.0);
    for (a, b) in y.iter().zip(&once) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
    }
}

#[test]
fn normalize_leaves_silence_alone() {
    let mut y = vec![0.0f32; 128];
    normalize(&mut y, -6.0);
    assert!(y.iter().all(|&s| s == 0.0));

    let mut empty: Vec<f32> = Vec::new();
    normalize(&mut empty, -6.0);
    assert!(empty.is_empty());
}

#[test]
fn fades_zero_both_ends() {
    let mut y = vec![1.0f32; 44_100];
    apply_fade(&mut y, 44_100, 10, 20);
    assert_eq!(y[0], 0.0);
    assert_eq!(y[y.len() - 1], 0.0);
    // Middle untouched.
    assert_eq!(y[22_050], 1.0);
    // Ramp reaches full gain at the end of the fade-in.
    assert_abs_diff_eq!(y[440], 1.0, epsilon = 1e-6);
}

#[test]
fn fades_longer_than_buffer_are_clamped() {
    let mut y = vec![1.0f32; 100];
    apply_fade(&mut y, 44_100, 1000, 1000);
    assert_eq!(y.len(), 100);
    assert_eq!(y[0], 0.0);
    assert_eq!(y[99], 0.0);
}

#[test]
fn humanize_preserves_length() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..50 {
        let mut y = tone(9261);
        let offset = humanize(&mut y, 44_100, 15, &mut rng);
        assert_eq!(y.len(), 9261);
        assert!(offset.unsigned_abs() <= 661);
        if offset > 0 {
            assert!(y[..offset as usize].iter().all(|&s| s == 0.0));
        } else if offset < 0 {
            let k = offset.unsigned_abs() as usize;
            assert!(y[y.len() - k..].iter().all(|&s| s == 0.0));
        }
    }
}

fn sample_layout() -> (tempfile::TempDir, Layout) {
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path());
    layout.ensure().unwrap();
    for kind in StemKind::SAMPLE_KINDS {
        write_mono(
            layout.sample_dir(kind).join(format!("t_{kind}_000.wav")),
            &tone(8000),
            22_050,
        )
        .unwrap();
    }
    (dir, layout)
}

#[test]
fn preprocess_rewrites_every_sample() {
    let (_dir, layout) = sample_layout();
    let opts = PreprocessOptions {
        normalize: true,
        target_dbfs: -12.0,
        fade_in_ms: 10,
        fade_out_ms: 20,
    };
    let summary = preprocess_samples(&layout, &opts, &Reporter::silent()).unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 3);

    for kind in StemKind::SAMPLE_KINDS {
        let a = read_audio(layout.sample_dir(kind).join(format!("t_{kind}_000.wav"))).unwrap();
        assert_eq!(a.samples.len(), 8000);
        assert_eq!(a.samples[0], 0.0);
        assert_eq!(a.samples[7999], 0.0);
    }
}

#[test]
fn preprocess_reports_bad_files_and_continues() {
    let (_dir, layout) = sample_layout();
    fs::write(layout.sample_dir(StemKind::Bass).join("broken.wav"), b"junk").unwrap();

    let summary =
        preprocess_samples(&layout, &PreprocessOptions::default(), &Reporter::silent()).unwrap();
    assert_eq!(summary.total, 4);
    assert_eq!(summary.failed, 1);
}

#[test]
fn humanize_samples_keeps_lengths() {
    let (_dir, layout) = sample_layout();
    let opts = HumanizeOptions {
        max_offset_ms: 15,
        probability: 1.0,
    };
    let mut rng = StdRng::seed_from_u64(3);
    let summary = humanize_samples(
        &layout,
        &StemKind::SAMPLE_KINDS,
        &opts,
        &mut rng,
        &Reporter::silent(),
    )
    .unwrap();
    assert_eq!(summary.succeeded, 3);

    for kind in StemKind::SAMPLE_KINDS {
        let a = read_audio(layout.sample_dir(kind).join(format!("t_{kind}_000.wav"))).unwrap();
        assert_eq!(a.samples.len(), 8000);
    }
}

#[test]
fn zero_probability_touches_nothing() {
    let (_dir, layout) = sample_layout();
    let opts = HumanizeOptions {
        max_offset_ms: 15,
        probability: 0.0,
    };
    let mut rng = StdRng::seed_from_u64(3);
    let summary = humanize_samples(
        &layout,
        &StemKind::SAMPLE_KINDS,
        &opts,
        &mut rng,
        &Reporter::silent(),
    )
    .unwrap();
    assert_eq!(summary.total, 0);
}
