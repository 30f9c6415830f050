use crate::{error::Result, io::process::run_status};
use std::{ffi::OsStr, fs, path::Path};
use tracing::debug;

/// Source-separation backend. Writes stems for `track` somewhere below
/// `output_dir`.
pub trait Separator: Send + Sync {
    fn separate(&self, track: &Path, output_dir: &Path) -> Result<()>;

    fn name(&self) -> &str;
}

/// Runs the `demucs` command line tool with a fixed model.
#[derive(Clone, Debug)]
pub struct DemucsCli {
    pub binary: String,
    pub model: String,
}

impl DemucsCli {
    pub fn new(binary: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            model: model.into(),
        }
    }
}

impl Default for DemucsCli {
    fn default() -> Self {
        Self::new("demucs", "mdx_extra")
    }
}

impl Separator for DemucsCli {
    fn separate(&self, track: &Path, output_dir: &Path) -> Result<()> {
        fs::create_dir_all(output_dir)?;

        debug!(
            "Separating {} with model {} into {}",
            track.display(),
            self.model,
            output_dir.display()
        );

        let args: [&OsStr; 5] = [
            OsStr::new("-n"),
            OsStr::new(&self.model),
            OsStr::new("--out"),
            output_dir.as_os_str(),
            track.as_os_str(),
        ];
        run_status(&self.binary, args)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
