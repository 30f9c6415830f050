use crate::{
    analysis::{TempoEstimator, TimeStretcher},
    audio::{read_mono, write_mono},
    error::{Result, SampleError},
    io::progress::Reporter,
    paths::{has_extension, sorted_dirs, sorted_files},
    types::{file_name_of, BatchSummary, TempoMatch},
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

pub const TEMPO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac"];

fn check_target(target_bpm: f64, beats_per_bar: u32) -> Result<()> {
    if !(target_bpm.is_finite() && target_bpm > 0.0) {
        return Err(SampleError::Config(format!(
            "target BPM must be a positive number, got {target_bpm}"
        )));
    }
    if beats_per_bar == 0 {
        return Err(SampleError::Config("beats per bar must be at least 1".into()));
    }
    Ok(())
}

/// Samples in one bar at `bpm`, truncated to a whole sample.
pub fn samples_per_bar(sample_rate: u32, bpm: f64, beats_per_bar: u32) -> usize {
    let per_beat = sample_rate as f64 * 60.0 / bpm;
    (per_beat * beats_per_bar as f64) as usize
}

/// Nearest whole number of bars (at least one) for `len` samples.
pub fn bar_count(len: usize, bar_len: usize) -> usize {
    if bar_len == 0 {
        return 1;
    }
    ((len as f64 / bar_len as f64).round() as usize).max(1)
}

/// Truncate or zero-pad `y` to exactly `bars * bar_len` samples.
pub fn align_to_bars(mut y: Vec<f32>, bar_len: usize) -> (Vec<f32>, usize) {
    let bars = bar_count(y.len(), bar_len);
    y.resize(bars * bar_len, 0.0);
    (y, bars)
}

/// `122.5 -> "122.5"`, `120 -> "120.0"`.
pub fn format_bpm(bpm: f64) -> String {
    if bpm.fract() == 0.0 && bpm.abs() < 1e15 {
        format!("{bpm:.1}")
    } else {
        format!("{bpm}")
    }
}

/// Output file name for `input` at `bpm`: `<stem>_<bpm>bpm.wav`.
pub fn output_name(input: &Path, bpm: f64) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{stem}_{}bpm.wav", format_bpm(bpm))
}

/// Stretch one file to `target_bpm` and cut it to whole bars.
pub fn match_tempo(
    input: &Path,
    output: &Path,
    target_bpm: f64,
    beats_per_bar: u32,
    tempo: &dyn TempoEstimator,
    stretcher: &dyn TimeStretcher,
    reporter: &Reporter,
) -> Result<TempoMatch> {
    check_target(target_bpm, beats_per_bar)?;

    let audio = read_mono(input)?;
    let original_bpm = tempo.estimate_bpm(&audio)?;
    // Speed factor: faster target tempo means shorter output.
    let rate = target_bpm / original_bpm;

    let stretched = stretcher.stretch(&audio.samples, audio.sample_rate, rate)?;
    let bar_len = samples_per_bar(audio.sample_rate, target_bpm, beats_per_bar);
    if bar_len == 0 {
        return Err(SampleError::Config(format!(
            "{target_bpm} BPM leaves no samples per bar at {} Hz",
            audio.sample_rate
        )));
    }
    let (aligned, bars) = align_to_bars(stretched, bar_len);

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    write_mono(output, &aligned, audio.sample_rate)?;

    reporter.log(format!(
        "{}: {:.1}→{} BPM, {} bars",
        file_name_of(input),
        original_bpm,
        format_bpm(target_bpm),
        bars
    ));

    Ok(TempoMatch {
        output: output.to_path_buf(),
        original_bpm,
        target_bpm,
        bars,
        frames: aligned.len(),
    })
}

/// Tempo-match `root_in/<sub>/<file>` into `root_out/<sub>/`. Only one
/// level of subdirectories is visited; loose files at the top and
/// unsupported extensions are skipped silently.
pub fn batch_process_root(
    root_in: &Path,
    root_out: &Path,
    target_bpm: f64,
    beats_per_bar: u32,
    tempo: &dyn TempoEstimator,
    stretcher: &dyn TimeStretcher,
    reporter: &Reporter,
) -> Result<(Vec<TempoMatch>, BatchSummary)> {
    check_target(target_bpm, beats_per_bar)?;
    fs::create_dir_all(root_out)?;

    let mut jobs: Vec<(PathBuf, PathBuf)> = Vec::new();
    for in_sub in sorted_dirs(root_in)? {
        let Some(sub) = in_sub.file_name() else {
            continue;
        };
        let out_sub = root_out.join(sub);
        fs::create_dir_all(&out_sub)?;
        for file in sorted_files(&in_sub)? {
            if has_extension(&file, TEMPO_EXTENSIONS) {
                let out = out_sub.join(output_name(&file, target_bpm));
                jobs.push((file, out));
            }
        }
    }

    let total = jobs.len();
    let mut summary = BatchSummary::new(total);
    let mut matched = Vec::with_capacity(total);
    for (i, (input, output)) in jobs.iter().enumerate() {
        reporter.status(format!("Tempo {}/{}", i + 1, total));
        match match_tempo(
            input,
            output,
            target_bpm,
            beats_per_bar,
            tempo,
            stretcher,
            reporter,
        ) {
            Ok(m) => {
                summary.succeeded += 1;
                matched.push(m);
            }
            Err(e) => {
                warn!("tempo match failed for {}: {e}", input.display());
                summary.failed += 1;
                reporter.log(format!("Error: {}: {e}", file_name_of(input)));
            }
        }
        reporter.progress(i + 1, total);
    }

    Ok((matched, summary))
}
