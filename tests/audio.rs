use approx::assert_abs_diff_eq;
use sample_pack_core::{
    audio::{analysis_signal, resample_mono},
    read_audio, read_mono, write_audio, AudioData, SampleError,
};
use std::fs;
use tempfile::tempdir;

#[test]
fn wav_round_trip_keeps_shape() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stereo.wav");
    let samples: Vec<f32> = (0..2000).map(|i| ((i % 100) as f32 / 100.0) - 0.5).collect();
    let audio = AudioData {
        samples: samples.clone(),
        sample_rate: 48_000,
        channels: 2,
    };
    write_audio(&path, &audio).unwrap();

    let back = read_audio(&path).unwrap();
    assert_eq!(back.channels, 2);
    assert_eq!(back.sample_rate, 48_000);
    assert_eq!(back.frames(), 1000);
    for (a, b) in back.samples.iter().zip(&samples) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-3);
    }
}

#[test]
fn read_mono_averages_channels() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lr.wav");
    let audio = AudioData {
        samples: vec![0.5, -0.5, 0.25, 0.25],
        sample_rate: 44_100,
        channels: 2,
    };
    write_audio(&path, &audio).unwrap();

    let mono = read_mono(&path).unwrap();
    assert_eq!(mono.channels, 1);
    assert_eq!(mono.samples.len(), 2);
    assert_abs_diff_eq!(mono.samples[0], 0.0, epsilon = 1e-3);
    assert_abs_diff_eq!(mono.samples[1], 0.25, epsilon = 1e-3);
}

#[test]
fn garbage_is_a_decode_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("junk.wav");
    fs::write(&path, b"this is not audio").unwrap();
    let err = read_audio(&path).unwrap_err();
    assert!(matches!(err, SampleError::Decode { .. }), "{err}");
}

#[test]
fn analysis_signal_downsamples_high_rates() {
    let audio = AudioData::mono(vec![0.0; 44_100], 44_100);
    let (y, sr) = analysis_signal(&audio).unwrap();
    assert_eq!(sr, 22_050);
    assert!((y.len() as i64 - 22_050).abs() < 256, "len {}", y.len());

    let low = AudioData::mono(vec![0.1; 100], 16_000);
    let (y, sr) = analysis_signal(&low).unwrap();
    assert_eq!((y.len(), sr), (100, 16_000));
}

#[test]
fn resample_identity_when_rates_match() {
    let y = vec![0.1, 0.2, 0.3];
    assert_eq!(resample_mono(&y, 22_050, 22_050).unwrap(), y);
}

#[test]
fn resample_length_follows_the_rate_ratio() {
    let y: Vec<f32> = (0..44_100).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();
    assert_eq!(resample_mono(&y, 44_100, 22_050).unwrap().len(), 22_050);
    assert_eq!(resample_mono(&y[..1000], 48_000, 22_050).unwrap().len(), 459);
}

#[test]
fn resampled_click_stays_in_place() {
    let mut y = vec![0.0f32; 44_100];
    y[10_000] = 1.0;
    let out = resample_mono(&y, 44_100, 22_050).unwrap();

    let peak = out
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
        .map(|(i, _)| i)
        .unwrap();
    assert!((peak as i64 - 5_000).abs() <= 1, "peak at {peak}");
}
