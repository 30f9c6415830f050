use crate::{
    error::Result,
    io::progress::Reporter,
    model::Separator,
    paths::{has_extension, sorted_files},
    types::{file_name_of, BatchSummary, Track},
};
use std::path::Path;
use tracing::warn;

/// Source files the separator accepts.
pub const TRACK_EXTENSIONS: &[&str] = &["mp3"];

/// Tracks available for separation in `source_dir`, sorted by name.
pub fn list_tracks(source_dir: &Path) -> Result<Vec<Track>> {
    Ok(sorted_files(source_dir)?
        .into_iter()
        .filter(|p| has_extension(p, TRACK_EXTENSIONS))
        .map(|p| Track::from_path(p, None))
        .collect())
}

/// Run `separator` over every track in `source_dir`. Failures are logged
/// and skipped; whatever a failed run left behind stays on disk.
pub fn separate_all(
    source_dir: &Path,
    separated_dir: &Path,
    separator: &dyn Separator,
    reporter: &Reporter,
) -> Result<BatchSummary> {
    let tracks = list_tracks(source_dir)?;
    let total = tracks.len();
    let mut summary = BatchSummary::new(total);
    reporter.log(format!("Separating {total} files..."));

    for (i, track) in tracks.iter().enumerate() {
        let i = i + 1;
        let name = file_name_of(&track.path);
        reporter.status(format!("Separate {i}/{total}"));
        reporter.log(format!("Sep: {name}"));

        match separator.separate(&track.path, separated_dir) {
            Ok(()) => summary.succeeded += 1,
            Err(e) => {
                warn!("{} failed on {}: {e}", separator.name(), track.path.display());
                summary.failed += 1;
                reporter.log(format!("Err sep {name}: {e}"));
            }
        }
        reporter.progress(i, total);
    }

    reporter.status("Separation complete");
    Ok(summary)
}
