use crate::{
    audio::{read_mono, write_mono},
    error::Result,
    io::progress::Reporter,
    paths::{has_extension, sorted_files, Layout},
    types::{file_name_of, BatchSummary, HumanizeOptions, PreprocessOptions, StemKind},
};
use rand::Rng;
use std::path::PathBuf;
use tracing::warn;

pub fn rms(y: &[f32]) -> f32 {
    if y.is_empty() {
        return 0.0;
    }
    let sum: f64 = y.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / y.len() as f64).sqrt() as f32
}

pub fn dbfs_to_gain(dbfs: f32) -> f32 {
    10f32.powf(dbfs / 20.0)
}

/// Scale `y` so its RMS equals `target_dbfs`. Silent input is left alone.
pub fn normalize(y: &mut [f32], target_dbfs: f32) {
    let r = rms(y);
    if r <= 0.0 || !r.is_finite() {
        return;
    }
    let gain = dbfs_to_gain(target_dbfs) / r;
    y.iter_mut().for_each(|s| *s *= gain);
}

/// `n` evenly spaced values from `start` to `end`, both inclusive. A
/// single value is `start`.
fn linspace(start: f32, end: f32, n: usize) -> impl Iterator<Item = f32> {
    let step = if n > 1 {
        (end - start) / (n - 1) as f32
    } else {
        0.0
    };
    (0..n).map(move |i| {
        if n > 1 && i + 1 == n {
            end
        } else {
            start + step * i as f32
        }
    })
}

fn ms_to_samples(sample_rate: u32, ms: u32) -> usize {
    (sample_rate as u64 * ms as u64 / 1000) as usize
}

/// Linear fade-in over the first `fade_in_ms` and fade-out over the last
/// `fade_out_ms`. Ramps longer than the buffer are clipped to it.
pub fn apply_fade(y: &mut [f32], sample_rate: u32, fade_in_ms: u32, fade_out_ms: u32) {
    let n_in = ms_to_samples(sample_rate, fade_in_ms).min(y.len());
    let n_out = ms_to_samples(sample_rate, fade_out_ms).min(y.len());

    for (s, g) in y[..n_in].iter_mut().zip(linspace(0.0, 1.0, n_in)) {
        *s *= g;
    }
    // Walk the tail backwards so the final sample always lands on zero.
    let tail = y.len() - n_out;
    for (s, g) in y[tail..].iter_mut().rev().zip(linspace(0.0, 1.0, n_out)) {
        *s *= g;
    }
}

/// Circularly shift `y` by `offset` samples (positive moves later) and
/// silence the part that wrapped around. Length is unchanged.
pub fn shift_and_zero(y: &mut [f32], offset: i64) {
    let n = y.len();
    if n == 0 || offset == 0 {
        return;
    }
    let k = offset.unsigned_abs() as usize;
    if k >= n {
        y.fill(0.0);
        return;
    }
    if offset > 0 {
        y.rotate_right(k);
        y[..k].fill(0.0);
    } else {
        y.rotate_left(k);
        y[n - k..].fill(0.0);
    }
}

/// Random offset in `±max_offset_ms`, in samples (truncated toward zero).
pub fn random_offset<R: Rng>(rng: &mut R, sample_rate: u32, max_offset_ms: u32) -> i64 {
    if max_offset_ms == 0 {
        return 0;
    }
    let max = max_offset_ms as f64;
    let ms = rng.gen_range(-max..=max);
    (ms / 1000.0 * sample_rate as f64) as i64
}

/// Shift `y` by a random offset within `±max_offset_ms`; returns the
/// offset that was applied.
pub fn humanize<R: Rng>(
    y: &mut [f32],
    sample_rate: u32,
    max_offset_ms: u32,
    rng: &mut R,
) -> i64 {
    let offset = random_offset(rng, sample_rate, max_offset_ms);
    shift_and_zero(y, offset);
    offset
}

fn sample_files(layout: &Layout, kind: StemKind) -> Result<Vec<PathBuf>> {
    Ok(sorted_files(&layout.sample_dir(kind))?
        .into_iter()
        .filter(|p| has_extension(p, &["wav"]))
        .collect())
}

/// Humanize a random subset of the samples in `stems`, rewriting them in
/// place.
pub fn humanize_samples<R: Rng>(
    layout: &Layout,
    stems: &[StemKind],
    opts: &HumanizeOptions,
    rng: &mut R,
    reporter: &Reporter,
) -> Result<BatchSummary> {
    reporter.log(format!(
        "Humanize ±{}ms @ {}%",
        opts.max_offset_ms,
        opts.probability * 100.0
    ));

    let mut summary = BatchSummary::default();
    for &stem in stems {
        for path in sample_files(layout, stem)? {
            if rng.gen::<f64>() > opts.probability {
                continue;
            }
            summary.total += 1;
            let result = read_mono(&path).and_then(|mut audio| {
                humanize(&mut audio.samples, audio.sample_rate, opts.max_offset_ms, &mut *rng);
                write_mono(&path, &audio.samples, audio.sample_rate)
            });
            match result {
                Ok(()) => summary.succeeded += 1,
                Err(e) => {
                    warn!("humanize failed for {}: {e}", path.display());
                    summary.failed += 1;
                    reporter.log(format!("Error humanizing {}: {e}", file_name_of(&path)));
                }
            }
        }
    }

    reporter.log("Humanize done");
    Ok(summary)
}

/// Normalize and fade every sample in the layout, rewriting in place.
pub fn preprocess_samples(
    layout: &Layout,
    opts: &PreprocessOptions,
    reporter: &Reporter,
) -> Result<BatchSummary> {
    reporter.log("Preprocess start");

    let mut summary = BatchSummary::default();
    for stem in StemKind::SAMPLE_KINDS {
        for path in sample_files(layout, stem)? {
            summary.total += 1;
            let result = read_mono(&path).and_then(|mut audio| {
                if opts.normalize {
                    normalize(&mut audio.samples, opts.target_dbfs);
                }
                if opts.fade_in_ms > 0 || opts.fade_out_ms > 0 {
                    apply_fade(
                        &mut audio.samples,
                        audio.sample_rate,
                        opts.fade_in_ms,
                        opts.fade_out_ms,
                    );
                }
                write_mono(&path, &audio.samples, audio.sample_rate)
            });
            match result {
                Ok(()) => {
                    summary.succeeded += 1;
                    reporter.log(format!("Preprocessed {stem}/{}", file_name_of(&path)));
                }
                Err(e) => {
                    warn!("preprocess failed for {}: {e}", path.display());
                    summary.failed += 1;
                    reporter.log(format!("Error preprocessing {stem}/{}: {e}", file_name_of(&path)));
                }
            }
        }
    }

    reporter.log("Preprocess done");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn linspace_hits_both_ends() {
        let v: Vec<f32> = linspace(0.0, 1.0, 5).collect();
        assert_eq!(v, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(0.0, 1.0, 1).collect::<Vec<_>>(), vec![0.0]);
    }

    #[test]
    fn shift_positive_zeroes_head() {
        let mut y = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        shift_and_zero(&mut y, 2);
        assert_eq!(y, vec![0.0, 0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn shift_negative_zeroes_tail() {
        let mut y = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        shift_and_zero(&mut y, -2);
        assert_eq!(y, vec![3.0, 4.0, 5.0, 0.0, 0.0]);
    }

    #[test]
    fn random_offset_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let o = random_offset(&mut rng, 44_100, 15);
            assert!(o.abs() <= 661, "offset {o} out of range");
        }
    }
}
