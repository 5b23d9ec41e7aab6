// Sequencer configuration
// Grid dimensions, row -> pitch table and transport defaults, loadable from RON

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::sequencer::timeline::Tempo;

/// Middle C
pub const MIDI_C4: u8 = 60;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Grid geometry shared by every pattern of a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridLayout {
    columns: usize,
    pitches: Vec<u8>,
}

impl GridLayout {
    /// Create a layout with `columns` steps per pattern and one row per pitch
    pub fn new(columns: usize, pitches: Vec<u8>) -> Self {
        assert!(columns > 0, "Pattern length must be at least 1 step");
        assert!(!pitches.is_empty(), "Grid must have at least one row");
        Self { columns, pitches }
    }

    /// Steps per pattern
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Number of rows (pitch or drum lanes)
    pub fn rows(&self) -> usize {
        self.pitches.len()
    }

    /// MIDI pitch for a grid row
    pub fn pitch_for_row(&self, row: usize) -> Option<u8> {
        self.pitches.get(row).copied()
    }
}

impl Default for GridLayout {
    /// 16 steps, 12 rows from C4 to B4
    fn default() -> Self {
        Self::new(16, (0..12).map(|i| MIDI_C4 + i).collect())
    }
}

/// Sequencer configuration
///
/// Every field has a default, so a config file only needs the values it overrides:
///
/// ```
/// use beatgrid::config::SequencerConfig;
///
/// let config = SequencerConfig::from_ron_str("(columns: 32, default_bpm: 96.0)").unwrap();
/// assert_eq!(config.columns, 32);
/// assert_eq!(config.rows, 12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Steps per pattern
    pub columns: usize,
    /// Number of pitch rows
    pub rows: usize,
    /// MIDI pitch of row 0; rows ascend by semitone
    pub base_pitch: u8,
    /// Tempo of a fresh project
    pub default_bpm: f64,
    /// Ramp time applied to tempo changes while playing
    pub tempo_ramp_ms: u64,
    /// Velocity sent with every sequenced trigger (0.0 - 1.0)
    pub velocity: f32,
    /// Capacity of the trigger queue towards the audio thread
    pub trigger_queue_capacity: usize,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            columns: 16,
            rows: 12,
            base_pitch: MIDI_C4,
            default_bpm: 120.0,
            tempo_ramp_ms: 50,
            velocity: 0.9,
            trigger_queue_capacity: 512,
        }
    }
}

impl SequencerConfig {
    /// Parse and validate a RON document
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a RON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_ron_str(&source)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.columns == 0 {
            return Err(ConfigError::Invalid(
                "Pattern length must be at least 1 step".to_string(),
            ));
        }

        if self.rows == 0 {
            return Err(ConfigError::Invalid(
                "Grid must have at least one row".to_string(),
            ));
        }

        if self.base_pitch as usize + self.rows > 128 {
            return Err(ConfigError::Invalid(format!(
                "{} rows from pitch {} exceed the MIDI range (0-127)",
                self.rows, self.base_pitch
            )));
        }

        if !(Tempo::MIN_BPM..=Tempo::MAX_BPM).contains(&self.default_bpm) {
            return Err(ConfigError::Invalid(format!(
                "Default tempo must be between {} and {} BPM",
                Tempo::MIN_BPM,
                Tempo::MAX_BPM
            )));
        }

        if !(0.0..=1.0).contains(&self.velocity) {
            return Err(ConfigError::Invalid(
                "Velocity must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.trigger_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "Trigger queue capacity must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Grid layout derived from this config, validated first
    pub fn layout(&self) -> Result<Arc<GridLayout>, ConfigError> {
        self.validate()?;
        let pitches = (0..self.rows)
            .map(|i| self.base_pitch.saturating_add(i as u8))
            .collect();
        Ok(Arc::new(GridLayout::new(self.columns, pitches)))
    }

    /// Trigger velocity limited to 0.0 - 1.0; an unusable value falls back to the default
    pub fn trigger_velocity(&self) -> f32 {
        if self.velocity.is_nan() {
            Self::default().velocity
        } else {
            self.velocity.clamp(0.0, 1.0)
        }
    }

    /// Tempo ramp duration
    pub fn tempo_ramp(&self) -> Duration {
        Duration::from_millis(self.tempo_ramp_ms)
    }
}
