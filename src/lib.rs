//! # sample-pack-core
//!
//! Turns online tracks into a sample pack: download audio, split it into
//! stems with an external separator, slice drum hits and loops, then
//! normalize, fade, humanize and key-tag the results. A standalone tempo
//! matcher conforms folders of audio to one BPM in whole bars.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod model;
pub mod paths;
pub mod presets;
pub mod session;
pub mod types;

pub use crate::{
    analysis::{
        Analyzers, BeatTracker, ChromaKey, KeyDetector, OnsetDetector, PhaseVocoder, PitchClass,
        SpectralFluxOnsets, StratumBeats, TempoEstimator, TimeStretcher,
    },
    audio::{read_audio, read_mono, write_audio, write_mono},
    config::PipelineConfig,
    error::{Result, SampleError},
    io::progress::{Event, Reporter},
    model::{DemucsCli, Separator},
    paths::Layout,
    presets::{drum_presets, DrumPattern},
    session::{Session, Stage},
    types::{
        AudioData, BatchSummary, HumanizeOptions, PreprocessOptions, Sample, SampleKind, Stem,
        StemKind, TempoMatch, Track,
    },
};
