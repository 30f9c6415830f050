use crate::{
    analysis::{Analyzers, BeatTracker, OnsetDetector},
    audio::{read_mono, write_mono},
    error::Result,
    io::progress::Reporter,
    paths::{has_extension, sorted_dirs, sorted_files, Layout},
    types::{BatchSummary, Sample, SampleKind, Stem, StemKind},
};
use std::{fs, ops::Range, path::Path};
use tracing::{debug, warn};

/// Drum hits start this long before the detected onset...
pub const HIT_PRE_SECS: f64 = 0.010;
/// ...and run this long after it.
pub const HIT_POST_SECS: f64 = 0.200;
pub const BEATS_PER_LOOP: usize = 4;

pub const STEM_EXTENSIONS: &[&str] = &["wav", "flac", "mp3"];

/// Every stem under `separated/separated/<track>/stems/`, sorted by track
/// then file name.
pub fn find_stems(layout: &Layout) -> Result<Vec<Stem>> {
    let mut stems = Vec::new();
    for track_dir in sorted_dirs(&layout.separated_tracks_dir())? {
        let Some(track) = track_dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        for file in sorted_files(&track_dir.join("stems"))? {
            if has_extension(&file, STEM_EXTENSIONS) {
                stems.push(Stem::new(track, file));
            }
        }
    }
    Ok(stems)
}

/// Sample range of the hit around an onset at `onset_secs`: a fixed
/// `HIT_PRE_SECS + HIT_POST_SECS` window, clipped to the signal.
pub fn hit_window(onset_secs: f64, sample_rate: u32, len: usize) -> Option<Range<usize>> {
    let sr = sample_rate as f64;
    let start = ((onset_secs - HIT_PRE_SECS) * sr).floor().max(0.0) as usize;
    let width = ((HIT_PRE_SECS + HIT_POST_SECS) * sr).round() as usize;
    let end = start.saturating_add(width).min(len);
    (start < end).then_some(start..end)
}

/// Sample ranges of consecutive four-beat loops. A trailing group of fewer
/// than four beats is dropped. The last complete group ends on the next
/// beat when there is one, otherwise one average beat after its fourth.
pub fn loop_windows(beats: &[f64], sample_rate: u32, len: usize) -> Vec<Range<usize>> {
    let sr = sample_rate as f64;
    let groups = beats.len() / BEATS_PER_LOOP;
    let mut windows = Vec::with_capacity(groups);

    for g in 0..groups {
        let first = beats[g * BEATS_PER_LOOP];
        let last = beats[g * BEATS_PER_LOOP + BEATS_PER_LOOP - 1];
        let end_secs = match beats.get((g + 1) * BEATS_PER_LOOP) {
            Some(&next) => next,
            None => last + (last - first) / (BEATS_PER_LOOP - 1) as f64,
        };

        let start = (first * sr).floor().max(0.0) as usize;
        let end = ((end_secs * sr).floor().max(0.0) as usize).min(len);
        if start < end {
            windows.push(start..end);
        }
    }
    windows
}

fn sample_path(out_dir: &Path, track: &str, label: &str, index: usize) -> std::path::PathBuf {
    out_dir.join(format!("{track}_{label}_{index:03}.wav"))
}

/// Slice one-shot hits out of a drum stem into `out_dir`.
pub fn extract_hits(
    stem: &Stem,
    out_dir: &Path,
    onsets: &dyn OnsetDetector,
    reporter: &Reporter,
) -> Result<Vec<Sample>> {
    let audio = read_mono(&stem.path)?;
    let times = onsets.onset_times(&audio)?;
    reporter.log(format!("Hits {} @ {}", times.len(), stem.track));

    fs::create_dir_all(out_dir)?;
    let mut written = Vec::with_capacity(times.len());
    for (i, t) in times.iter().enumerate() {
        let Some(range) = hit_window(*t, audio.sample_rate, audio.samples.len()) else {
            debug!("onset at {t:.3}s falls outside {}", stem.path.display());
            continue;
        };
        let path = sample_path(out_dir, &stem.track, "drum", i);
        write_mono(&path, &audio.samples[range], audio.sample_rate)?;
        written.push(Sample {
            path,
            stem: StemKind::Drums,
            kind: SampleKind::Hit,
            index: i,
        });
    }
    Ok(written)
}

/// Slice four-beat loops out of a melodic stem into `out_dir`.
pub fn extract_loops(
    stem: &Stem,
    kind: StemKind,
    out_dir: &Path,
    beats: &dyn BeatTracker,
    reporter: &Reporter,
) -> Result<Vec<Sample>> {
    let audio = read_mono(&stem.path)?;
    let times = beats.beat_times(&audio)?;
    let windows = loop_windows(&times, audio.sample_rate, audio.samples.len());
    reporter.log(format!("Loops {} @ {}/{}", windows.len(), kind, stem.track));

    fs::create_dir_all(out_dir)?;
    let mut written = Vec::with_capacity(windows.len());
    for (i, range) in windows.into_iter().enumerate() {
        let path = sample_path(out_dir, &stem.track, kind.as_str(), i);
        write_mono(&path, &audio.samples[range], audio.sample_rate)?;
        written.push(Sample {
            path,
            stem: kind,
            kind: SampleKind::Loop,
            index: i,
        });
    }
    Ok(written)
}

/// Slice every stem in the layout: drum stems into hits, the rest into
/// loops filed under `bass` or `other`.
pub fn extract_samples(
    layout: &Layout,
    analyzers: &Analyzers,
    reporter: &Reporter,
) -> Result<(Vec<Sample>, BatchSummary)> {
    let stems = find_stems(layout)?;
    let total = stems.len();
    let mut summary = BatchSummary::new(total);
    let mut samples = Vec::new();
    reporter.log(format!("Extracting {total} stems..."));

    for (i, stem) in stems.iter().enumerate() {
        let result = match stem.kind {
            StemKind::Drums => extract_hits(
                stem,
                &layout.sample_dir(StemKind::Drums),
                analyzers.onsets.as_ref(),
                reporter,
            ),
            StemKind::Bass => extract_loops(
                stem,
                StemKind::Bass,
                &layout.sample_dir(StemKind::Bass),
                analyzers.beats.as_ref(),
                reporter,
            ),
            _ => extract_loops(
                stem,
                StemKind::Other,
                &layout.sample_dir(StemKind::Other),
                analyzers.beats.as_ref(),
                reporter,
            ),
        };

        match result {
            Ok(mut written) => {
                summary.succeeded += 1;
                samples.append(&mut written);
            }
            Err(e) => {
                warn!("extraction failed for {}: {e}", stem.path.display());
                summary.failed += 1;
                reporter.log(format!("Error extracting {}: {e}", stem.path.display()));
            }
        }
        reporter.progress(i + 1, total);
    }

    reporter.status("Extraction complete");
    Ok((samples, summary))
}
