// Types for project persistence

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::sequencer::instrument::{DrumVoice, Instrument, InstrumentId, InstrumentKind};
use crate::sequencer::pattern::{Pattern, PatternId};

/// Only save file version this build reads or writes
pub const SAVE_FILE_VERSION: u32 = 1;

/// Version 1 save file
///
/// Sets are stored as sorted arrays and maps as ordered maps, so saving the same project twice
/// yields identical bytes. Cells are `"row:col"` strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveFileV1 {
    pub version: u32,
    pub project_name: String,
    pub patterns: Vec<Pattern>,
    pub current_pattern_id: PatternId,
    pub instrument_order: Vec<InstrumentId>,
    pub instruments: BTreeMap<InstrumentId, InstrumentMeta>,
    pub pattern_grids: BTreeMap<PatternId, BTreeMap<InstrumentId, Vec<String>>>,
    pub song_grid: BTreeMap<PatternId, Vec<u32>>,
    pub bpm: f64,
}

/// Instrument kind as written in save files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKindTag {
    Synth,
    Drum,
}

/// Lightweight instrument metadata; mute and solo are not persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentMeta {
    pub id: InstrumentId,
    pub name: String,
    pub kind: InstrumentKindTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<DrumVoice>,
}

impl InstrumentMeta {
    pub fn from_instrument(instrument: &Instrument) -> Self {
        let (kind, voice) = match instrument.kind() {
            InstrumentKind::Synth => (InstrumentKindTag::Synth, None),
            InstrumentKind::Drum(voice) => (InstrumentKindTag::Drum, Some(voice)),
        };
        Self {
            id: instrument.id.clone(),
            name: instrument.name.clone(),
            kind,
            voice,
        }
    }
}

/// Resolve a stored kind tag; a drum without a voice is not a valid instrument
pub fn instrument_kind(tag: InstrumentKindTag, voice: Option<DrumVoice>) -> Option<InstrumentKind> {
    match (tag, voice) {
        (InstrumentKindTag::Synth, _) => Some(InstrumentKind::Synth),
        (InstrumentKindTag::Drum, Some(voice)) => Some(InstrumentKind::Drum(voice)),
        (InstrumentKindTag::Drum, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_meta_json() {
        let kick = Instrument::new(
            "k".to_string(),
            "Kick".to_string(),
            InstrumentKind::Drum(DrumVoice::Kick),
        );
        let synth = Instrument::new("s".to_string(), "Lead".to_string(), InstrumentKind::Synth);

        let kick_json = serde_json::to_value(InstrumentMeta::from_instrument(&kick)).unwrap();
        assert_eq!(
            kick_json,
            serde_json::json!({"id": "k", "name": "Kick", "kind": "drum", "voice": "kick"})
        );

        // Synths carry no voice key at all
        let synth_json = serde_json::to_value(InstrumentMeta::from_instrument(&synth)).unwrap();
        assert_eq!(
            synth_json,
            serde_json::json!({"id": "s", "name": "Lead", "kind": "synth"})
        );
    }

    #[test]
    fn test_instrument_kind_resolution() {
        assert_eq!(
            instrument_kind(InstrumentKindTag::Drum, Some(DrumVoice::Hat)),
            Some(InstrumentKind::Drum(DrumVoice::Hat))
        );
        assert_eq!(
            instrument_kind(InstrumentKindTag::Synth, None),
            Some(InstrumentKind::Synth)
        );
        assert_eq!(instrument_kind(InstrumentKindTag::Drum, None), None);
    }
}
