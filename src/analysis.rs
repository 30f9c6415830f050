//! Analysis backends used by extraction, key tagging and tempo matching.
//!
//! Every backend sits behind a small trait so the pipeline can be driven
//! with deterministic detectors in tests. The defaults are:
//!
//! - [`SpectralFluxOnsets`]: spectral-flux onset strength with peak picking
//!   and backtracking, computed at the analysis sample rate
//! - [`StratumBeats`]: tempo estimate and beat grid from `stratum-dsp`
//! - [`ChromaKey`]: time-averaged STFT chroma, strongest pitch class wins
//! - [`PhaseVocoder`]: STFT phase-vocoder time stretch

use std::sync::Arc;

use stratum_dsp::{analyze_audio, AnalysisConfig, AnalysisResult};
use tracing::debug;

use crate::{
    audio::{analysis_signal, downmix_to_mono},
    core::dsp::{
        self, backtrack, frames_to_time, onset_strength, peak_pick, PeakPick, CHROMA_HOP,
        CHROMA_N_FFT, ONSET_HOP, ONSET_N_FFT, PITCH_CLASSES, STRETCH_HOP, STRETCH_N_FFT,
    },
    error::{Result, SampleError},
    types::AudioData,
};

/// One of the twelve pitch classes, `0 == C`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PitchClass(u8);

impl PitchClass {
    pub fn from_index(idx: usize) -> Option<Self> {
        (idx < 12).then_some(PitchClass(idx as u8))
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn name(&self) -> &'static str {
        PITCH_CLASSES[self.index()]
    }
}

impl std::fmt::Display for PitchClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Detects transient attacks; returns onset times in seconds.
pub trait OnsetDetector: Send + Sync {
    fn onset_times(&self, audio: &AudioData) -> Result<Vec<f64>>;

    fn name(&self) -> &'static str;
}

/// Tracks rhythmic pulses; returns beat times in seconds, ascending.
pub trait BeatTracker: Send + Sync {
    fn beat_times(&self, audio: &AudioData) -> Result<Vec<f64>>;

    fn name(&self) -> &'static str;
}

pub trait TempoEstimator: Send + Sync {
    fn estimate_bpm(&self, audio: &AudioData) -> Result<f64>;

    fn name(&self) -> &'static str;
}

pub trait KeyDetector: Send + Sync {
    fn detect_key(&self, audio: &AudioData) -> Result<PitchClass>;

    fn name(&self) -> &'static str;
}

/// Changes duration without changing pitch. `rate > 1` shortens.
pub trait TimeStretcher: Send + Sync {
    fn stretch(&self, samples: &[f32], sample_rate: u32, rate: f64) -> Result<Vec<f32>>;

    fn name(&self) -> &'static str;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SpectralFluxOnsets {
    /// Roll onsets back to the preceding energy minimum.
    pub backtrack: bool,
}

impl SpectralFluxOnsets {
    pub fn new() -> Self {
        Self { backtrack: true }
    }
}

impl OnsetDetector for SpectralFluxOnsets {
    fn onset_times(&self, audio: &AudioData) -> Result<Vec<f64>> {
        let (y, sr) = analysis_signal(audio)?;
        if y.is_empty() {
            return Ok(Vec::new());
        }
        let env = onset_strength(&y, ONSET_N_FFT, ONSET_HOP);
        let mut frames = peak_pick(&env, PeakPick::for_rate(sr, ONSET_HOP));
        if self.backtrack {
            frames = backtrack(&frames, &env);
        }
        debug!("{} onsets at {} Hz analysis rate", frames.len(), sr);
        Ok(frames_to_time(&frames, sr, ONSET_HOP))
    }

    fn name(&self) -> &'static str {
        "spectral-flux"
    }
}

/// Tempo and beat grid from `stratum-dsp`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StratumBeats;

impl StratumBeats {
    fn analyze(audio: &AudioData) -> Result<AnalysisResult> {
        let mono = downmix_to_mono(&audio.samples, audio.channels);
        // Beat times must stay relative to the untrimmed signal.
        let config = AnalysisConfig {
            enable_silence_trimming: false,
            ..AnalysisConfig::default()
        };
        analyze_audio(&mono, audio.sample_rate, config)
            .map_err(|e| SampleError::Analysis(format!("stratum-dsp: {e}")))
    }
}

impl BeatTracker for StratumBeats {
    fn beat_times(&self, audio: &AudioData) -> Result<Vec<f64>> {
        let result = Self::analyze(audio)?;
        let mut beats: Vec<f64> = result.beat_grid.beats.iter().map(|&b| b as f64).collect();
        beats.sort_by(|a, b| a.total_cmp(b));
        debug!("{} beats at {:.2} BPM", beats.len(), result.bpm);
        Ok(beats)
    }

    fn name(&self) -> &'static str {
        "stratum-dsp"
    }
}

impl TempoEstimator for StratumBeats {
    fn estimate_bpm(&self, audio: &AudioData) -> Result<f64> {
        let result = Self::analyze(audio)?;
        let bpm = result.bpm as f64;
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(SampleError::Analysis("no tempo detected".into()));
        }
        debug!(
            "Detected BPM: {:.2} (confidence: {:.2})",
            bpm, result.bpm_confidence
        );
        Ok(bpm)
    }

    fn name(&self) -> &'static str {
        "stratum-dsp"
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ChromaKey;

impl KeyDetector for ChromaKey {
    fn detect_key(&self, audio: &AudioData) -> Result<PitchClass> {
        let mono = downmix_to_mono(&audio.samples, audio.channels);
        if mono.is_empty() {
            return Err(SampleError::Analysis("empty audio".into()));
        }
        let chroma = dsp::chroma(&mono, audio.sample_rate, CHROMA_N_FFT, CHROMA_HOP);
        let mean = dsp::mean_chroma(&chroma);

        // First maximum wins on ties, so silence reads as C.
        let mut best = 0usize;
        for (i, v) in mean.iter().enumerate() {
            if *v > mean[best] {
                best = i;
            }
        }
        PitchClass::from_index(best)
            .ok_or_else(|| SampleError::Analysis(format!("bad pitch class {best}")))
    }

    fn name(&self) -> &'static str {
        "chroma-stft"
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PhaseVocoder;

impl TimeStretcher for PhaseVocoder {
    fn stretch(&self, samples: &[f32], _sample_rate: u32, rate: f64) -> Result<Vec<f32>> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(SampleError::Analysis(format!("invalid stretch rate {rate}")));
        }
        if (rate - 1.0).abs() < 1e-9 {
            return Ok(samples.to_vec());
        }
        Ok(dsp::phase_vocoder(samples, rate, STRETCH_N_FFT, STRETCH_HOP))
    }

    fn name(&self) -> &'static str {
        "phase-vocoder"
    }
}

/// The detectors one pipeline run uses, shareable across worker threads.
#[derive(Clone)]
pub struct Analyzers {
    pub onsets: Arc<dyn OnsetDetector>,
    pub beats: Arc<dyn BeatTracker>,
    pub tempo: Arc<dyn TempoEstimator>,
    pub key: Arc<dyn KeyDetector>,
    pub stretcher: Arc<dyn TimeStretcher>,
}

impl Default for Analyzers {
    fn default() -> Self {
        Self {
            onsets: Arc::new(SpectralFluxOnsets::new()),
            beats: Arc::new(StratumBeats),
            tempo: Arc::new(StratumBeats),
            key: Arc::new(ChromaKey),
            stretcher: Arc::new(PhaseVocoder),
        }
    }
}

impl std::fmt::Debug for Analyzers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzers")
            .field("onsets", &self.onsets.name())
            .field("beats", &self.beats.name())
            .field("tempo", &self.tempo.name())
            .field("key", &self.key.name())
            .field("stretcher", &self.stretcher.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_class_names() {
        assert_eq!(PitchClass::from_index(0).unwrap().name(), "C");
        assert_eq!(PitchClass::from_index(9).unwrap().to_string(), "A");
        assert!(PitchClass::from_index(12).is_none());
    }

    #[test]
    fn unit_rate_stretch_is_identity() {
        let y = vec![0.1, -0.2, 0.3];
        assert_eq!(PhaseVocoder.stretch(&y, 44_100, 1.0).unwrap(), y);
    }

    #[test]
    fn rejects_non_positive_rate() {
        assert!(PhaseVocoder.stretch(&[0.0; 8], 44_100, 0.0).is_err());
    }
}
