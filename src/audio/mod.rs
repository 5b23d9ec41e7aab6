// Audio module - The sound engine seam the sequencer triggers into

pub mod engine;
