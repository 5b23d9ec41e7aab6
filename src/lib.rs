// beatgrid - Step sequencer core: library exports for the binary, tests and benchmarks

pub mod audio;
pub mod config;
pub mod messaging;
pub mod project;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use audio::engine::{
    NoteDuration, RecordingSoundEngine, RingbufSoundEngine, SoundEngine, SoundTrigger,
};
pub use config::{GridLayout, SequencerConfig};
pub use messaging::channels::create_trigger_channel;
pub use project::{ProjectError, ProjectManager, ProjectModel, ProjectStore, SaveFileV1};
pub use sequencer::{
    Clock, DrumVoice, InstrumentKind, ManualClock, PlayMode, Tempo, ThreadClock, Transport,
    TransportState, TriggerEvent, TriggerSource, resolve,
};
