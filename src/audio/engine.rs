// Sound engine - Where resolved step events leave the sequencer
//
// The sequencer never synthesizes audio. It hands each trigger to a SoundEngine, which either
// queues it for an audio thread or records it.

use log::warn;
use ringbuf::traits::Producer;
use std::fmt;
use std::sync::Mutex;

use crate::messaging::channels::{TriggerConsumer, TriggerProducer, create_trigger_channel};
use crate::sequencer::player::TriggerSource;

/// Note length in musical notation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteDuration {
    Sixteenth,
    Eighth,
}

impl NoteDuration {
    /// Notation symbol ("16n", "8n")
    pub fn symbol(&self) -> &'static str {
        match self {
            NoteDuration::Sixteenth => "16n",
            NoteDuration::Eighth => "8n",
        }
    }

    /// Length in seconds at `bpm`
    pub fn seconds(&self, bpm: f64) -> f64 {
        let beat = 60.0 / bpm;
        match self {
            NoteDuration::Sixteenth => beat / 4.0,
            NoteDuration::Eighth => beat / 2.0,
        }
    }
}

impl fmt::Display for NoteDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A trigger as handed to the sound engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundTrigger {
    pub source: TriggerSource,
    pub duration: NoteDuration,
    pub time: f64,
    pub velocity: f32,
}

/// Sink for triggers resolved by the sequencer
///
/// Called from the clock callback: implementations must not block.
pub trait SoundEngine: Send + Sync {
    fn trigger(&self, source: TriggerSource, duration: NoteDuration, time: f64, velocity: f32);
}

/// Queues triggers into a lock-free ring buffer read by the audio thread
pub struct RingbufSoundEngine {
    // Only the clock thread pushes; the mutex is uncontended
    producer: Mutex<TriggerProducer>,
}

impl RingbufSoundEngine {
    pub fn new(producer: TriggerProducer) -> Self {
        Self {
            producer: Mutex::new(producer),
        }
    }

    /// Engine plus the consumer end for the audio thread
    pub fn with_capacity(capacity: usize) -> (Self, TriggerConsumer) {
        let (producer, consumer) = create_trigger_channel(capacity);
        (Self::new(producer), consumer)
    }
}

impl SoundEngine for RingbufSoundEngine {
    fn trigger(&self, source: TriggerSource, duration: NoteDuration, time: f64, velocity: f32) {
        let trigger = SoundTrigger {
            source,
            duration,
            time,
            velocity,
        };

        let mut producer = match self.producer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if producer.try_push(trigger).is_err() {
            warn!("Trigger queue full, dropping {:?} at {:.3}s", source, time);
        }
    }
}

/// Collects every trigger; used for offline rendering and tests
#[derive(Debug, Default)]
pub struct RecordingSoundEngine {
    triggers: Mutex<Vec<SoundTrigger>>,
}

impl RecordingSoundEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far
    pub fn triggers(&self) -> Vec<SoundTrigger> {
        match self.triggers.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Take and reset the recording
    pub fn take(&self) -> Vec<SoundTrigger> {
        match self.triggers.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn len(&self) -> usize {
        self.triggers.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SoundEngine for RecordingSoundEngine {
    fn trigger(&self, source: TriggerSource, duration: NoteDuration, time: f64, velocity: f32) {
        let trigger = SoundTrigger {
            source,
            duration,
            time,
            velocity,
        };
        match self.triggers.lock() {
            Ok(mut guard) => guard.push(trigger),
            Err(poisoned) => poisoned.into_inner().push(trigger),
        }
    }
}
