// Player - Resolves grid columns into triggers and drives them from the clock
//
// resolve() is pure: a snapshot, a column and a play mode in, ordered trigger events out.
// StepPlayer is the per-tick driver that lives inside the clock callback.

use std::sync::Arc;

use crate::audio::engine::{NoteDuration, SoundEngine};
use crate::project::model::ProjectModel;
use crate::project::store::ProjectStore;
use crate::sequencer::audibility::{any_soloed, audible_with};
use crate::sequencer::clock::{CancelToken, ClockTick, TickCallback};
use crate::sequencer::instrument::{DrumVoice, InstrumentId, InstrumentKind};
use crate::sequencer::transport::SharedTransportState;

/// What the transport plays: the current pattern on loop, or the song arrangement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayMode {
    #[default]
    Pattern,
    Song,
}

/// What a trigger sounds: a synth pitch or a drum voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerSource {
    /// MIDI note number
    Pitch(u8),
    Voice(DrumVoice),
}

impl TriggerSource {
    /// Note length the sound engine plays this source with
    pub fn duration(&self) -> NoteDuration {
        match self {
            TriggerSource::Voice(DrumVoice::Kick) => NoteDuration::Eighth,
            TriggerSource::Voice(_) | TriggerSource::Pitch(_) => NoteDuration::Sixteenth,
        }
    }
}

/// A resolved sound trigger
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerEvent {
    pub instrument_id: InstrumentId,
    pub source: TriggerSource,
    pub time: f64,
}

/// Columns in one pass of the given mode
pub fn total_columns(model: &ProjectModel, mode: PlayMode) -> usize {
    match mode {
        PlayMode::Pattern => model.pattern_length(),
        PlayMode::Song => model.total_song_columns(),
    }
}

/// Resolve the triggers of one column
///
/// Events come in instrument order, then ascending row. In song mode every pattern placed at
/// the column's block contributes, in pattern order, without deduplication.
pub fn resolve(model: &ProjectModel, column: usize, mode: PlayMode, time: f64) -> Vec<TriggerEvent> {
    let columns = model.pattern_length();
    let local = column % columns;

    let mut events = Vec::new();
    match mode {
        PlayMode::Pattern => {
            resolve_pattern(model, model.current_pattern_id(), local, time, &mut events);
        }
        PlayMode::Song => {
            if column >= model.total_song_columns() {
                return events;
            }
            let Ok(block) = u32::try_from(column / columns) else {
                return events;
            };
            for pattern in model.patterns_at_block(block) {
                resolve_pattern(model, &pattern.id, local, time, &mut events);
            }
        }
    }
    events
}

fn resolve_pattern(
    model: &ProjectModel,
    pattern_id: &str,
    local: usize,
    time: f64,
    events: &mut Vec<TriggerEvent>,
) {
    let Some(grid) = model.grid(pattern_id) else {
        return;
    };
    let any_solo = any_soloed(model.instruments());

    for instrument in model.instruments() {
        if !audible_with(instrument, any_solo) {
            continue;
        }
        let Some(cells) = grid.get(&instrument.id) else {
            continue;
        };

        let mut rows: Vec<usize> = cells
            .iter()
            .filter(|key| key.col == local)
            .map(|key| key.row)
            .collect();
        rows.sort_unstable();

        for row in rows {
            let source = match instrument.kind() {
                InstrumentKind::Synth => match model.layout().pitch_for_row(row) {
                    Some(pitch) => TriggerSource::Pitch(pitch),
                    None => continue,
                },
                InstrumentKind::Drum(voice) => TriggerSource::Voice(voice),
            };
            events.push(TriggerEvent {
                instrument_id: instrument.id.clone(),
                source,
                time,
            });
        }
    }
}

/// Per-tick playback driver
#[derive(Clone)]
pub struct StepPlayer {
    store: Arc<ProjectStore>,
    shared_state: Arc<SharedTransportState>,
    engine: Arc<dyn SoundEngine>,
    velocity: f32,
}

impl StepPlayer {
    pub fn new(
        store: Arc<ProjectStore>,
        shared_state: Arc<SharedTransportState>,
        engine: Arc<dyn SoundEngine>,
        velocity: f32,
    ) -> Self {
        Self {
            store,
            shared_state,
            engine,
            velocity,
        }
    }

    /// Play one step; returns the number of triggers sent
    ///
    /// Does nothing once `token` is cancelled or while the transport is not playing.
    pub fn tick(&self, tick: ClockTick, token: &CancelToken) -> usize {
        if token.is_cancelled() || !self.shared_state.is_playing() {
            return 0;
        }

        let model = self.store.snapshot();
        let mode = self.shared_state.play_mode();
        let total = total_columns(&model, mode).max(1);
        let step = self.shared_state.step() % total;

        let events = resolve(&model, step, mode, tick.time);
        for event in &events {
            self.engine
                .trigger(event.source, event.source.duration(), event.time, self.velocity);
        }

        self.shared_state.set_step((step + 1) % total);
        events.len()
    }

    /// Wrap into a clock callback bound to `token`
    pub fn into_callback(self, token: CancelToken) -> TickCallback {
        Box::new(move |tick| {
            self.tick(tick, &token);
        })
    }
}
