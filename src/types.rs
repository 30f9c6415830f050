use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioData {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }
}

/// A downloaded (or locally provided) source track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub path: PathBuf,
    pub title: String,
    pub format: String,
    pub source_url: Option<String>,
}

impl Track {
    pub fn from_path(path: impl Into<PathBuf>, source_url: Option<String>) -> Self {
        let path = path.into();
        let title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        Self {
            path,
            title,
            format,
            source_url,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemKind {
    Drums,
    Bass,
    Other,
}

impl StemKind {
    /// Sample folders that extraction writes to, in processing order.
    pub const SAMPLE_KINDS: [StemKind; 3] = [StemKind::Drums, StemKind::Bass, StemKind::Other];

    /// Classify a stem file by substring of its lowercased name.
    ///
    /// Anything that is neither drums nor bass ends up in `other`,
    /// vocals included.
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("drum") {
            StemKind::Drums
        } else if lower.contains("bass") {
            StemKind::Bass
        } else {
            StemKind::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StemKind::Drums => "drums",
            StemKind::Bass => "bass",
            StemKind::Other => "other",
        }
    }
}

impl std::fmt::Display for StemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One separated stem file belonging to a track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stem {
    pub track: String,
    pub path: PathBuf,
    pub kind: StemKind,
}

impl Stem {
    pub fn new(track: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(StemKind::from_file_name)
            .unwrap_or(StemKind::Other);
        Self {
            track: track.into(),
            path,
            kind,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleKind {
    Hit,
    Loop,
}

/// A sliced sample written by extraction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    pub path: PathBuf,
    pub stem: StemKind,
    pub kind: SampleKind,
    pub index: usize,
}

impl Sample {
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// Settings for the normalize + fade pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreprocessOptions {
    pub normalize: bool,
    pub target_dbfs: f32,
    pub fade_in_ms: u32,
    pub fade_out_ms: u32,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            normalize: false,
            target_dbfs: -14.0,
            fade_in_ms: 10,
            fade_out_ms: 20,
        }
    }
}

/// Settings for the humanize pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HumanizeOptions {
    pub max_offset_ms: u32,
    /// Probability in `0.0..=1.0` that a given file gets shifted.
    pub probability: f64,
}

impl Default for HumanizeOptions {
    fn default() -> Self {
        Self {
            max_offset_ms: 15,
            probability: 0.5,
        }
    }
}

/// Outcome of one tempo-matched file.
#[derive(Clone, Debug)]
pub struct TempoMatch {
    pub output: PathBuf,
    pub original_bpm: f64,
    pub target_bpm: f64,
    pub bars: usize,
    pub frames: usize,
}

/// Per-batch counters for item loops that skip failures.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
