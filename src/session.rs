//! Background execution of pipeline stages.
//!
//! A [`Session`] owns everything a stage needs (config, layout, analysis
//! backends, the separator) plus the URL list the user is working on.
//! [`Session::start`] runs one stage on its own thread and reports through
//! the session's [`Reporter`]; only one stage may run at a time.

use crate::{
    analysis::Analyzers,
    config::PipelineConfig,
    core::{
        acquire::{download_urls, resolve_links, Downloader},
        extract::extract_samples,
        keytag::tag_keys,
        post::{humanize_samples, preprocess_samples},
        separate::separate_all,
    },
    error::{Result, SampleError},
    io::progress::Reporter,
    model::{DemucsCli, Separator},
    paths::Layout,
    types::StemKind,
};
use rand::{rngs::StdRng, SeedableRng};
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
};
use tracing::{debug, error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Links,
    Download,
    Separate,
    Extract,
    Preprocess,
    TagKeys,
    Humanize,
    RunAll,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Links,
        Stage::Download,
        Stage::Separate,
        Stage::Extract,
        Stage::Preprocess,
        Stage::TagKeys,
        Stage::Humanize,
        Stage::RunAll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Links => "links",
            Stage::Download => "download",
            Stage::Separate => "separate",
            Stage::Extract => "extract",
            Stage::Preprocess => "preprocess",
            Stage::TagKeys => "tag-keys",
            Stage::Humanize => "humanize",
            Stage::RunAll => "run-all",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase().replace('_', "-");
        Stage::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("unknown stage `{s}`"))
    }
}

#[derive(Default)]
struct Shared {
    running: Mutex<Option<Stage>>,
    urls: Mutex<Vec<String>>,
}

/// Clears the busy flag when the stage ends, panics included.
struct BusyGuard(Arc<Shared>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        if let Ok(mut r) = self.0.running.lock() {
            *r = None;
        }
    }
}

/// Everything one stage run needs, cloned out of the session so the
/// worker thread owns it.
#[derive(Clone)]
struct Job {
    config: PipelineConfig,
    layout: Layout,
    analyzers: Analyzers,
    separator: Arc<dyn Separator>,
    downloader: Downloader,
    reporter: Reporter,
    rng_seed: Option<u64>,
    shared: Arc<Shared>,
}

pub struct Session {
    job: Job,
}

impl Session {
    pub fn new(config: PipelineConfig, reporter: Reporter) -> Self {
        let layout = config.layout();
        let separator = Arc::new(DemucsCli::new(
            config.demucs_bin.clone(),
            config.separation_model.clone(),
        ));
        let downloader = Downloader {
            binary: config.yt_dlp_bin.clone(),
            audio_format: config.audio_format.clone(),
            audio_quality: config.audio_quality.clone(),
        };
        Self {
            job: Job {
                config,
                layout,
                analyzers: Analyzers::default(),
                separator,
                downloader,
                reporter,
                rng_seed: None,
                shared: Arc::default(),
            },
        }
    }

    pub fn with_analyzers(mut self, analyzers: Analyzers) -> Self {
        self.job.analyzers = analyzers;
        self
    }

    pub fn with_separator(mut self, separator: Arc<dyn Separator>) -> Self {
        self.job.separator = separator;
        self
    }

    /// Fix the humanize RNG so repeated runs shift identically.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.job.rng_seed = Some(seed);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.job.config
    }

    pub fn layout(&self) -> &Layout {
        &self.job.layout
    }

    /// Take tracks from a local folder instead of `tracks/`. Downloads land
    /// there too. `None` goes back to `tracks/`.
    pub fn set_source_dir(&mut self, dir: Option<PathBuf>) {
        self.job.config.download_dir = dir;
    }

    pub fn source_dir(&self) -> PathBuf {
        self.job.config.source_dir()
    }

    /// Replace the URL list used by `links` and `download`.
    pub fn set_urls<S: AsRef<str>>(&self, lines: &[S]) {
        let urls = lines
            .iter()
            .map(|l| l.as_ref().trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if let Ok(mut u) = self.job.shared.urls.lock() {
            *u = urls;
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.job.shared.urls.lock().map(|u| u.clone()).unwrap_or_default()
    }

    /// Stage currently running, if any.
    pub fn running(&self) -> Option<Stage> {
        self.job.shared.running.lock().ok().and_then(|r| *r)
    }

    fn acquire(&self, stage: Stage) -> Result<BusyGuard> {
        let mut running = self
            .job
            .shared
            .running
            .lock()
            .map_err(|_| anyhow::anyhow!("session state poisoned"))?;
        if let Some(current) = *running {
            return Err(SampleError::Busy {
                running: current.to_string(),
            });
        }
        *running = Some(stage);
        Ok(BusyGuard(Arc::clone(&self.job.shared)))
    }

    /// Run `stage` on the calling thread.
    pub fn run(&self, stage: Stage) -> Result<()> {
        let guard = self.acquire(stage)?;
        let result = self.job.execute(stage);
        drop(guard);
        self.job.reporter.finished(stage.as_str());
        result
    }

    /// Run `stage` on a background thread. Errors and panics are reported
    /// as a final `Error: ...` log line followed by `Finished`.
    pub fn start(&self, stage: Stage) -> Result<JoinHandle<()>> {
        let guard = self.acquire(stage)?;
        let job = self.job.clone();

        let handle = thread::Builder::new()
            .name(format!("stage-{stage}"))
            .spawn(move || {
                debug!("stage {stage} started");
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| job.execute(stage)));
                match outcome {
                    Ok(Ok(())) => debug!("stage {stage} finished"),
                    Ok(Err(e)) => {
                        error!("stage {stage} failed: {e}");
                        job.reporter.log(format!("Error: {e}"));
                    }
                    Err(payload) => {
                        let msg = panic_message(payload.as_ref());
                        error!("stage {stage} panicked: {msg}");
                        job.reporter.log(format!("Error: {stage} panicked: {msg}"));
                    }
                }
                drop(guard);
                job.reporter.finished(stage.as_str());
            })?;
        Ok(handle)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

impl Job {
    fn urls(&self) -> Vec<String> {
        self.shared.urls.lock().map(|u| u.clone()).unwrap_or_default()
    }

    fn rng(&self) -> StdRng {
        match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn execute(&self, stage: Stage) -> Result<()> {
        match stage {
            Stage::Links => self.links(),
            Stage::Download => self.download(),
            Stage::Separate => self.separate(),
            Stage::Extract => self.extract(),
            Stage::Preprocess => self.preprocess(),
            Stage::TagKeys => self.tag_keys(),
            Stage::Humanize => self.humanize(),
            Stage::RunAll => {
                self.download()?;
                self.separate()?;
                self.extract()?;
                self.preprocess()?;
                self.tag_keys()?;
                self.humanize()
            }
        }
    }

    fn links(&self) -> Result<()> {
        let resolved = resolve_links(&self.downloader, &self.urls(), &self.reporter);
        for url in &resolved {
            self.reporter.log(url.clone());
        }
        if let Ok(mut u) = self.shared.urls.lock() {
            *u = resolved;
        }
        Ok(())
    }

    fn download(&self) -> Result<()> {
        let urls = self.urls();
        download_urls(
            &self.downloader,
            &urls,
            &self.config.source_dir(),
            &self.reporter,
        )?;
        Ok(())
    }

    fn separate(&self) -> Result<()> {
        self.layout.ensure()?;
        separate_all(
            &self.config.source_dir(),
            &self.layout.separated_dir(),
            self.separator.as_ref(),
            &self.reporter,
        )?;
        Ok(())
    }

    fn extract(&self) -> Result<()> {
        self.layout.ensure()?;
        extract_samples(&self.layout, &self.analyzers, &self.reporter)?;
        Ok(())
    }

    fn preprocess(&self) -> Result<()> {
        preprocess_samples(&self.layout, &self.config.preprocess(), &self.reporter)?;
        Ok(())
    }

    fn tag_keys(&self) -> Result<()> {
        tag_keys(&self.layout, self.analyzers.key.as_ref(), &self.reporter)?;
        Ok(())
    }

    fn humanize(&self) -> Result<()> {
        let mut rng = self.rng();
        humanize_samples(
            &self.layout,
            &StemKind::SAMPLE_KINDS,
            &self.config.humanize(),
            &mut rng,
            &self.reporter,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_round_trip() {
        for st in Stage::ALL {
            assert_eq!(st.as_str().parse::<Stage>().unwrap(), st);
        }
        assert_eq!("TAG_KEYS".parse::<Stage>().unwrap(), Stage::TagKeys);
        assert!("mix".parse::<Stage>().is_err());
    }

    #[test]
    fn set_urls_drops_blank_lines() {
        let s = Session::new(PipelineConfig::default(), Reporter::silent());
        s.set_urls(&["  a ", "", "b"]);
        assert_eq!(s.urls(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn panic_payloads_are_readable() {
        let p: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(p.as_ref()), "boom");
        let p: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(p.as_ref()), "bang");
    }
}
