// Lock-free trigger channel between the sequencer and the audio thread

use crate::audio::engine::SoundTrigger;
use ringbuf::{HeapRb, traits::Split};

pub type TriggerProducer = ringbuf::HeapProd<SoundTrigger>;
pub type TriggerConsumer = ringbuf::HeapCons<SoundTrigger>;

pub fn create_trigger_channel(capacity: usize) -> (TriggerProducer, TriggerConsumer) {
    let rb = HeapRb::<SoundTrigger>::new(capacity);
    rb.split()
}
