// Transport - Playback control and state management
// Controls play/pause/stop, tempo, play mode and the step position

use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use super::clock::{CancelToken, Clock, ScheduleId};
use super::player::{PlayMode, StepPlayer, total_columns};
use super::timeline::Tempo;
use crate::audio::engine::SoundEngine;
use crate::config::SequencerConfig;
use crate::project::store::ProjectStore;

/// Transport state (play/pause/stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }

    /// Check if transport is stopped or paused
    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportState::Stopped | TransportState::Paused)
    }
}

/// Shared transport state
/// Thread-safe via atomics for communication with the clock callback
#[derive(Debug)]
pub struct SharedTransportState {
    playing: AtomicBool,
    paused: AtomicBool,
    step: AtomicUsize,
    song_mode: AtomicBool,
}

impl SharedTransportState {
    /// Create new shared transport state
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            playing: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            step: AtomicUsize::new(0),
            song_mode: AtomicBool::new(false),
        })
    }

    /// Get current transport state
    pub fn state(&self) -> TransportState {
        if self.playing.load(Ordering::Acquire) {
            TransportState::Playing
        } else if self.paused.load(Ordering::Acquire) {
            TransportState::Paused
        } else {
            TransportState::Stopped
        }
    }

    pub fn set_state(&self, state: TransportState) {
        self.paused
            .store(state == TransportState::Paused, Ordering::Release);
        self.playing
            .store(state == TransportState::Playing, Ordering::Release);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Next column to play
    pub fn step(&self) -> usize {
        self.step.load(Ordering::Acquire)
    }

    pub fn set_step(&self, step: usize) {
        self.step.store(step, Ordering::Release);
    }

    pub fn play_mode(&self) -> PlayMode {
        if self.song_mode.load(Ordering::Acquire) {
            PlayMode::Song
        } else {
            PlayMode::Pattern
        }
    }

    pub fn set_play_mode(&self, mode: PlayMode) {
        self.song_mode
            .store(mode == PlayMode::Song, Ordering::Release);
    }
}

/// Transport controller
/// Owns the clock and the single repeating schedule that drives playback
pub struct Transport<C: Clock> {
    clock: C,
    shared_state: Arc<SharedTransportState>,
    store: Arc<ProjectStore>,
    player: StepPlayer,
    tempo: Tempo,
    ramp: Duration,
    schedule: Option<(ScheduleId, CancelToken)>,
}

impl<C: Clock> Transport<C> {
    /// Create a stopped transport at the configured tempo
    pub fn new(
        clock: C,
        store: Arc<ProjectStore>,
        engine: Arc<dyn SoundEngine>,
        config: &SequencerConfig,
    ) -> Self {
        let shared_state = SharedTransportState::new();
        let player = StepPlayer::new(
            Arc::clone(&store),
            Arc::clone(&shared_state),
            engine,
            config.trigger_velocity(),
        );

        Self {
            clock,
            shared_state,
            store,
            player,
            tempo: Tempo::clamped(config.default_bpm),
            ramp: config.tempo_ramp(),
            schedule: None,
        }
    }

    /// Get shared state (for observers such as a playhead display)
    pub fn shared_state(&self) -> Arc<SharedTransportState> {
        Arc::clone(&self.shared_state)
    }

    pub fn state(&self) -> TransportState {
        self.shared_state.state()
    }

    pub fn step(&self) -> usize {
        self.shared_state.step()
    }

    pub fn bpm(&self) -> f64 {
        self.tempo.bpm()
    }

    pub fn play_mode(&self) -> PlayMode {
        self.shared_state.play_mode()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Whether a repeating callback is currently scheduled
    pub fn is_scheduled(&self) -> bool {
        self.schedule.is_some()
    }

    /// Start or resume playback
    ///
    /// Schedules the repeating callback only if none is held, so calling this twice never
    /// doubles the tick rate.
    pub fn play(&mut self) {
        if self.schedule.is_none() {
            let token = CancelToken::new();
            let callback = self.player.clone().into_callback(token.clone());
            let id = self.clock.schedule_repeat(callback);
            self.schedule = Some((id, token));
            debug!("Transport scheduled step callback {}", id);
        }

        self.clock.ramp_to(self.tempo.bpm(), self.ramp);
        self.clock.start();
        self.shared_state.set_state(TransportState::Playing);
    }

    /// Pause (keep current step and schedule); only a playing transport pauses
    pub fn pause(&mut self) {
        if !self.state().is_playing() {
            debug!("Transport pause ignored while {:?}", self.state());
            return;
        }
        self.shared_state.set_state(TransportState::Paused);
        self.clock.pause();
    }

    /// Stop and reset to the first step
    ///
    /// Once this returns no step callback runs again, even one the clock delivers late.
    pub fn stop(&mut self) {
        self.shared_state.set_state(TransportState::Stopped);
        if let Some((id, token)) = self.schedule.take() {
            token.cancel();
            self.clock.clear(id);
            debug!("Transport cleared step callback {}", id);
        }
        self.clock.stop();
        self.shared_state.set_step(0);
    }

    /// Toggle play/pause
    pub fn toggle_play(&mut self) {
        if self.state().is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Change tempo; ramps while playing and never moves the step
    pub fn set_bpm(&mut self, bpm: f64) {
        self.tempo = Tempo::clamped(bpm);
        if self.state().is_playing() {
            self.clock.ramp_to(self.tempo.bpm(), self.ramp);
        }
    }

    /// Switch between pattern and song playback
    ///
    /// While stopped or paused a step beyond the new mode's length is reset to 0; while
    /// playing the callback wraps it on the next tick.
    pub fn set_play_mode(&mut self, mode: PlayMode) {
        self.shared_state.set_play_mode(mode);

        if self.state().is_stopped() {
            let total = total_columns(&self.store.snapshot(), mode);
            if self.shared_state.step() >= total {
                self.shared_state.set_step(0);
            }
        }
    }
}
