use crate::error::{Result, SampleError};
use serde::Deserialize;
use std::collections::BTreeMap;

pub const STEPS_PER_PATTERN: usize = 16;

/// A one-bar, sixteen-step drum pattern.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DrumPattern {
    pub name: String,
    pub tempo: u32,
    /// Instrument name to on/off steps.
    pub steps: BTreeMap<String, Vec<u8>>,
}

impl DrumPattern {
    /// One line per instrument, `x` for a hit and `.` for a rest.
    pub fn grid(&self) -> Vec<String> {
        let width = self.steps.keys().map(String::len).max().unwrap_or(0);
        self.steps
            .iter()
            .map(|(inst, steps)| {
                let row: String = steps
                    .iter()
                    .map(|&s| if s != 0 { 'x' } else { '.' })
                    .collect();
                format!("{inst:<width$} {row}")
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct PresetFile {
    patterns: Vec<DrumPattern>,
}

const PRESETS_JSON: &str = include_str!("../presets/ebm_drum_presets.json");

fn validate(p: &DrumPattern) -> Result<()> {
    if p.tempo == 0 {
        return Err(SampleError::Config(format!("preset `{}` has zero tempo", p.name)));
    }
    for (inst, steps) in &p.steps {
        if steps.len() != STEPS_PER_PATTERN {
            return Err(SampleError::Config(format!(
                "preset `{}`: `{inst}` has {} steps, expected {STEPS_PER_PATTERN}",
                p.name,
                steps.len()
            )));
        }
        if steps.iter().any(|&s| s > 1) {
            return Err(SampleError::Config(format!(
                "preset `{}`: `{inst}` steps must be 0 or 1",
                p.name
            )));
        }
    }
    Ok(())
}

/// Bundled drum presets, in file order.
pub fn drum_presets() -> Result<Vec<DrumPattern>> {
    let file: PresetFile = serde_json::from_str(PRESETS_JSON)?;
    for p in &file.patterns {
        validate(p)?;
    }
    Ok(file.patterns)
}

pub fn find_preset(name: &str) -> Result<DrumPattern> {
    drum_presets()?
        .into_iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| SampleError::Config(format!("Preset `{name}` not found")))
}
