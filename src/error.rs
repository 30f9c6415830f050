use std::path::PathBuf;

use thiserror::Error;

/// Central error type for the sample-pack-core crate.
#[derive(Debug, Error)]
pub enum SampleError {
    // Generic fallback (wraps anyhow)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Domain-specific variants
    #[error("Failed to decode audio file '{path}': {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("External tool `{tool}` not found on PATH")]
    ToolMissing { tool: String },

    #[error("External tool `{tool}` failed: {status}")]
    ToolFailed { tool: String, status: String },

    #[error("Analysis failed: {0}")]
    Analysis(String),

    #[error("Cannot tag '{path}': {reason}")]
    Tag { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Stage `{running}` is still running")]
    Busy { running: String },
}

impl From<serde_json::Error> for SampleError {
    fn from(e: serde_json::Error) -> Self {
        SampleError::Anyhow(e.into())
    }
}

impl From<hound::Error> for SampleError {
    fn from(e: hound::Error) -> Self {
        SampleError::Anyhow(e.into())
    }
}

impl SampleError {
    pub fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        SampleError::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn tag(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        SampleError::Tag {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SampleError>;
