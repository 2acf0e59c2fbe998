//! Preset catalog.
//!
//! Named presets are a table lookup. The table topics evaluation preset is
//! computed from the number of speakers being evaluated.

use serde::{Deserialize, Serialize};

use super::markers::MarkerSet;
use crate::error::ValidationError;

pub const MIN_SPEAKERS: u8 = 1;
pub const MAX_SPEAKERS: u8 = 10;

/// Label recorded for the computed multi-speaker evaluation preset.
pub const MULTI_SPEAKER_LABEL: &str = "Table Topics Evaluation";

const MINUTE: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetGroup {
    Speech,
    Evaluation,
    Breaks,
    Custom,
}

/// A preset definition in whole seconds, as stored in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetDef {
    pub name: String,
    #[serde(default = "default_group")]
    pub group: PresetGroup,
    pub green_secs: u64,
    pub yellow_secs: u64,
    pub red_secs: u64,
}

fn default_group() -> PresetGroup {
    PresetGroup::Custom
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub group: PresetGroup,
    pub markers: MarkerSet,
}

/// How a caller asks for a preset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresetId {
    Named(String),
    /// Table topics evaluation for `n` speakers.
    MultiSpeaker(i64),
}

/// Green/yellow/red for evaluating `speakers` table topics speakers.
///
/// One speaker gets a fixed 2:00/2:30/3:00. From two speakers on, red is two
/// minutes plus one minute per speaker, with yellow and green one minute
/// apart below it.
pub fn multi_speaker_markers(speakers: i64) -> Result<MarkerSet, ValidationError> {
    if speakers < MIN_SPEAKERS as i64 || speakers > MAX_SPEAKERS as i64 {
        return Err(ValidationError::SpeakerCount {
            count: speakers,
            min: MIN_SPEAKERS,
            max: MAX_SPEAKERS,
        });
    }
    let n = speakers as u64;
    let (green, yellow, red) = if n == 1 {
        (2 * MINUTE, 150, 3 * MINUTE)
    } else {
        let red = 2 * MINUTE + n * MINUTE;
        let yellow = red - MINUTE;
        (yellow - MINUTE, yellow, red)
    };
    Ok(MarkerSet::unchecked(green * 1000, yellow * 1000, red * 1000))
}

/// Built-in presets plus any user-defined ones.
#[derive(Debug, Clone)]
pub struct PresetCatalog {
    presets: Vec<Preset>,
}

impl PresetCatalog {
    pub fn builtin() -> Self {
        const TABLE: &[(&str, PresetGroup, u64, u64, u64)] = &[
            ("Prepared Speech", PresetGroup::Speech, 5 * MINUTE, 6 * MINUTE, 7 * MINUTE),
            ("Table Topics", PresetGroup::Speech, 60, 90, 120),
            ("Capstone 10-12 mins", PresetGroup::Speech, 10 * MINUTE, 11 * MINUTE, 12 * MINUTE),
            ("Keynote 18-22 mins", PresetGroup::Speech, 18 * MINUTE, 20 * MINUTE, 22 * MINUTE),
            ("Speech Evaluation", PresetGroup::Evaluation, 120, 150, 180),
            ("1 min", PresetGroup::Breaks, 40, 50, 60),
            ("5 mins", PresetGroup::Breaks, 3 * MINUTE, 4 * MINUTE, 5 * MINUTE),
            ("10 mins", PresetGroup::Breaks, 8 * MINUTE, 9 * MINUTE, 10 * MINUTE),
            ("15 mins", PresetGroup::Breaks, 10 * MINUTE, 13 * MINUTE, 15 * MINUTE),
        ];

        let presets = TABLE
            .iter()
            .map(|&(name, group, g, y, r)| Preset {
                name: name.to_string(),
                group,
                markers: MarkerSet::unchecked(g * 1000, y * 1000, r * 1000),
            })
            .collect();
        Self { presets }
    }

    /// Built-in presets extended with `defs`. A user preset with the same
    /// name as a built-in one replaces it.
    pub fn with_user_presets(defs: &[PresetDef]) -> Self {
        let mut catalog = Self::builtin();
        for def in defs {
            let preset = Preset {
                name: def.name.clone(),
                group: def.group,
                markers: MarkerSet::unchecked(
                    def.green_secs.saturating_mul(1000),
                    def.yellow_secs.saturating_mul(1000),
                    def.red_secs.saturating_mul(1000),
                ),
            };
            match catalog.position(&def.name) {
                Some(idx) => catalog.presets[idx] = preset,
                None => catalog.presets.push(preset),
            }
        }
        catalog
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn group(&self, group: PresetGroup) -> impl Iterator<Item = &Preset> {
        self.presets.iter().filter(move |p| p.group == group)
    }

    fn position(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.presets
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Case-insensitive lookup by name.
    pub fn find(&self, name: &str) -> Option<&Preset> {
        self.position(name).map(|idx| &self.presets[idx])
    }

    /// Resolve a preset id to a validated preset.
    pub fn resolve(&self, id: &PresetId) -> Result<Preset, ValidationError> {
        match id {
            PresetId::Named(name) => {
                let preset = self
                    .find(name)
                    .ok_or_else(|| ValidationError::UnknownPreset(name.clone()))?;
                preset.markers.validate()?;
                Ok(preset.clone())
            }
            PresetId::MultiSpeaker(n) => Ok(Preset {
                name: MULTI_SPEAKER_LABEL.to_string(),
                group: PresetGroup::Evaluation,
                markers: multi_speaker_markers(*n)?,
            }),
        }
    }
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
