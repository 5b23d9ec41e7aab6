// Messaging - Lock-free channels to the audio thread

pub mod channels;
