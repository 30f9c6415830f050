use crate::{
    error::{Result, SampleError},
    types::StemKind,
};
use directories::ProjectDirs;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const TRACKS_DIR: &str = "tracks";
pub const SEPARATED_DIR: &str = "separated";
pub const SAMPLES_DIR: &str = "samples";

/// Fixed on-disk layout of a sample-pack workspace:
///
/// ```text
/// <root>/tracks/
/// <root>/separated/separated/<track>/stems/*.wav
/// <root>/samples/{drums,bass,other}/*.wav
/// ```
#[derive(Clone, Debug)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tracks_dir(&self) -> PathBuf {
        self.root.join(TRACKS_DIR)
    }

    /// Directory handed to the separator as `--out`.
    pub fn separated_dir(&self) -> PathBuf {
        self.root.join(SEPARATED_DIR)
    }

    /// Directory holding one folder per separated track.
    pub fn separated_tracks_dir(&self) -> PathBuf {
        self.separated_dir().join(SEPARATED_DIR)
    }

    pub fn stems_dir(&self, track: &str) -> PathBuf {
        self.separated_tracks_dir().join(track).join("stems")
    }

    pub fn samples_dir(&self) -> PathBuf {
        self.root.join(SAMPLES_DIR)
    }

    pub fn sample_dir(&self, kind: StemKind) -> PathBuf {
        self.samples_dir().join(kind.as_str())
    }

    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(self.tracks_dir())?;
        fs::create_dir_all(self.separated_dir())?;
        for kind in StemKind::SAMPLE_KINDS {
            fs::create_dir_all(self.sample_dir(kind))?;
        }
        Ok(())
    }
}

pub fn config_dir() -> Result<PathBuf> {
    let proj = ProjectDirs::from("dev", "SamplePack", "sample-pack-core")
        .ok_or_else(|| SampleError::Config("config dir not available".into()))?;
    Ok(PathBuf::from(proj.config_dir()))
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

/// Regular files directly inside `dir`, sorted by name. A missing
/// directory yields an empty list.
pub fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Subdirectories directly inside `dir`, sorted by name.
pub fn sorted_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

pub fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| exts.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_expected_tree() {
        let l = Layout::new("/work");
        assert_eq!(l.tracks_dir(), PathBuf::from("/work/tracks"));
        assert_eq!(
            l.stems_dir("Song"),
            PathBuf::from("/work/separated/separated/Song/stems")
        );
        assert_eq!(
            l.sample_dir(StemKind::Bass),
            PathBuf::from("/work/samples/bass")
        );
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert!(has_extension(Path::new("a/B.MP3"), &["wav", "mp3"]));
        assert!(!has_extension(Path::new("a/b.ogg"), &["wav", "mp3"]));
        assert!(!has_extension(Path::new("a/noext"), &["wav"]));
    }
}
