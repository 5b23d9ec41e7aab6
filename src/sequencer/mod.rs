// Sequencer module
// Instruments, patterns, tempo, clock, transport and step resolution

pub mod audibility;
pub mod clock;
pub mod instrument;
pub mod pattern;
pub mod player;
pub mod timeline;
pub mod transport;

pub use clock::{CancelToken, Clock, ClockTick, ManualClock, ThreadClock};
pub use instrument::{DrumVoice, Instrument, InstrumentId, InstrumentKind};
pub use pattern::{CellKey, CellSet, Pattern, PatternId};
pub use player::{PlayMode, StepPlayer, TriggerEvent, TriggerSource, resolve, total_columns};
pub use timeline::{Tempo, TempoRamp};
pub use transport::{SharedTransportState, Transport, TransportState};
