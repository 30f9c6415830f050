use crate::{
    analysis::{KeyDetector, PitchClass},
    audio::read_mono,
    error::{Result, SampleError},
    io::progress::Reporter,
    paths::{sorted_files, Layout},
    types::{file_name_of, BatchSummary, StemKind},
};
use lofty::{
    config::WriteOptions,
    file::TaggedFileExt,
    probe::Probe,
    tag::{ItemKey, Tag, TagExt, TagType},
};
use std::path::Path;
use tracing::warn;

/// Estimate the key of an audio file.
pub fn detect_key(path: &Path, detector: &dyn KeyDetector) -> Result<PitchClass> {
    let audio = read_mono(path)?;
    detector.detect_key(&audio)
}

/// Write `key` into the file's initial-key field. ID3v2 is preferred
/// when the container can carry it (MP3, WAV, AIFF); otherwise the
/// format's native tag is used.
pub fn write_key_tag(path: &Path, key: &str) -> Result<()> {
    let mut tagged = Probe::open(path)
        .and_then(|p| p.read())
        .map_err(|e| SampleError::tag(path, e))?;

    let tag_type = if tagged.file_type().supports_tag_type(TagType::Id3v2) {
        TagType::Id3v2
    } else {
        tagged.primary_tag_type()
    };

    if tagged.tag(tag_type).is_none() {
        tagged.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged
        .tag_mut(tag_type)
        .ok_or_else(|| SampleError::tag(path, "container does not accept tags"))?;

    if !tag.insert_text(ItemKey::InitialKey, key.to_string()) {
        return Err(SampleError::tag(path, "tag format has no key field"));
    }
    tag.save_to_path(path, WriteOptions::default())
        .map_err(|e| SampleError::tag(path, e))
}

/// Initial-key value stored in any of the file's tags.
pub fn read_key_tag(path: &Path) -> Result<Option<String>> {
    let tagged = Probe::open(path)
        .and_then(|p| p.read())
        .map_err(|e| SampleError::tag(path, e))?;

    Ok(tagged.tags().iter().find_map(|tag| {
        tag.items()
            .find(|item| item.key() == &ItemKey::InitialKey)
            .and_then(|item| item.value().text())
            .map(str::to_string)
    }))
}

/// Detect and tag the key of every sample. Files that cannot be analysed
/// or tagged are logged and left untouched.
pub fn tag_keys(
    layout: &Layout,
    detector: &dyn KeyDetector,
    reporter: &Reporter,
) -> Result<BatchSummary> {
    reporter.log("Tag keys start");

    let mut summary = BatchSummary::default();
    for stem in StemKind::SAMPLE_KINDS {
        for path in sorted_files(&layout.sample_dir(stem))? {
            summary.total += 1;
            let name = file_name_of(&path);
            let result = detect_key(&path, detector)
                .and_then(|key| write_key_tag(&path, key.name()).map(|_| key));
            match result {
                Ok(key) => {
                    summary.succeeded += 1;
                    reporter.log(format!("Tagged {stem}/{name}={key}"));
                }
                Err(e) => {
                    warn!("key tagging failed for {}: {e}", path.display());
                    summary.failed += 1;
                    reporter.log(format!("No tag for {name}"));
                }
            }
        }
    }

    reporter.log("Tag keys done");
    Ok(summary)
}
