use crate::{
    error::{Result, SampleError},
    paths::{default_config_path, Layout},
    types::{HumanizeOptions, PreprocessOptions},
};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::debug;

pub const ENV_BASE_DIR: &str = "SAMPLE_PACK_BASE_DIR";
pub const ENV_MODEL: &str = "SAMPLE_PACK_MODEL";
pub const ENV_DEMUCS_BIN: &str = "SAMPLE_PACK_DEMUCS_BIN";
pub const ENV_YT_DLP_BIN: &str = "SAMPLE_PACK_YT_DLP_BIN";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub base_dir: PathBuf,
    /// Overrides `<base_dir>/tracks` as the download / separation source.
    pub download_dir: Option<PathBuf>,
    pub separation_model: String,
    pub demucs_bin: String,
    pub yt_dlp_bin: String,
    pub audio_format: String,
    pub audio_quality: String,
    pub normalize: bool,
    pub target_dbfs: f32,
    pub fade_in_ms: u32,
    pub fade_out_ms: u32,
    pub humanize_ms: u32,
    /// Percent chance (0-100) that a sample gets humanized.
    pub humanize_chance: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_dir: ".".into(),
            download_dir: None,
            separation_model: "mdx_extra".into(),
            demucs_bin: "demucs".into(),
            yt_dlp_bin: "yt-dlp".into(),
            audio_format: "mp3".into(),
            audio_quality: "192".into(),
            normalize: false,
            target_dbfs: -14.0,
            fade_in_ms: 10,
            fade_out_ms: 20,
            humanize_ms: 15,
            humanize_chance: 50.0,
        }
    }
}

impl PipelineConfig {
    /// Defaults, then the JSON file (explicit path or the per-user
    /// config dir when present), then environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut cfg = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Ok(p) if p.is_file() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            SampleError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let cfg: PipelineConfig = serde_json::from_str(&raw)?;
        debug!("Loaded config from {}", path.display());
        Ok(cfg)
    }

    pub fn apply_env(&mut self) {
        if let Ok(v) = env::var(ENV_BASE_DIR) {
            self.base_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var(ENV_MODEL) {
            self.separation_model = v;
        }
        if let Ok(v) = env::var(ENV_DEMUCS_BIN) {
            self.demucs_bin = v;
        }
        if let Ok(v) = env::var(ENV_YT_DLP_BIN) {
            self.yt_dlp_bin = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.target_dbfs.is_finite() {
            return Err(SampleError::Config("target_dbfs must be finite".into()));
        }
        if !(0.0..=100.0).contains(&self.humanize_chance) {
            return Err(SampleError::Config(format!(
                "humanize_chance must be within 0..=100, got {}",
                self.humanize_chance
            )));
        }
        if self.separation_model.trim().is_empty() {
            return Err(SampleError::Config("separation_model is empty".into()));
        }
        Ok(())
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.base_dir)
    }

    pub fn source_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| self.layout().tracks_dir())
    }

    pub fn preprocess(&self) -> PreprocessOptions {
        PreprocessOptions {
            normalize: self.normalize,
            target_dbfs: self.target_dbfs,
            fade_in_ms: self.fade_in_ms,
            fade_out_ms: self.fade_out_ms,
        }
    }

    pub fn humanize(&self) -> HumanizeOptions {
        HumanizeOptions {
            max_offset_ms: self.humanize_ms,
            probability: self.humanize_chance / 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{ "normalize": true, "target_dbfs": -12.0 }"#).unwrap();
        assert!(cfg.normalize);
        assert_eq!(cfg.target_dbfs, -12.0);
        assert_eq!(cfg.separation_model, "mdx_extra");
        assert_eq!(cfg.fade_out_ms, 20);
    }

    #[test]
    fn rejects_out_of_range_chance() {
        let cfg = PipelineConfig {
            humanize_chance: 150.0,
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn humanize_chance_is_percent() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.humanize().probability, 0.5);
        assert_eq!(cfg.humanize().max_offset_ms, 15);
    }

    #[test]
    fn source_dir_falls_back_to_tracks() {
        let cfg = PipelineConfig {
            base_dir: "/w".into(),
            ..PipelineConfig::default()
        };
        assert_eq!(cfg.source_dir(), PathBuf::from("/w/tracks"));
    }
}
