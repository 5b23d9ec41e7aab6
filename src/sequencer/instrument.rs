// Instrument - A synth or a fixed drum voice with mute/solo flags

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for instruments
pub type InstrumentId = String;

/// Fixed percussion voices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrumVoice {
    Kick,
    Snare,
    Hat,
}

impl DrumVoice {
    pub const ALL: [DrumVoice; 3] = [DrumVoice::Kick, DrumVoice::Snare, DrumVoice::Hat];

    /// Display name, also used as the default instrument name
    pub fn label(&self) -> &'static str {
        match self {
            DrumVoice::Kick => "Kick",
            DrumVoice::Snare => "Snare",
            DrumVoice::Hat => "Hat",
        }
    }
}

impl fmt::Display for DrumVoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What an instrument plays: pitched rows or one drum voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    Synth,
    Drum(DrumVoice),
}

impl InstrumentKind {
    /// Default name for a new instrument of this kind
    pub fn default_name(&self) -> &'static str {
        match self {
            InstrumentKind::Synth => "Synth",
            InstrumentKind::Drum(voice) => voice.label(),
        }
    }
}

/// An instrument of the rack
///
/// `kind` is fixed at creation; only name and the mute/solo flags change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub id: InstrumentId,
    pub name: String,
    kind: InstrumentKind,
    pub muted: bool,
    pub solo: bool,
}

impl Instrument {
    /// Creates an unmuted, unsoloed instrument
    pub fn new(id: InstrumentId, name: String, kind: InstrumentKind) -> Self {
        Self {
            id,
            name,
            kind,
            muted: false,
            solo: false,
        }
    }

    pub fn kind(&self) -> InstrumentKind {
        self.kind
    }

    pub fn is_drum(&self) -> bool {
        matches!(self.kind, InstrumentKind::Drum(_))
    }
}
