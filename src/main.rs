// beatgrid - Command line demo of the step sequencer
// Run with: cargo run -- [config.ron]
//
// Builds a small beat, renders it offline through a manual clock, plays it for a moment on the
// real-time clock and round-trips the project through a save file.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use beatgrid::config::{GridLayout, SequencerConfig};
use beatgrid::project::{ProjectManager, ProjectModel, ProjectStore};
use beatgrid::sequencer::{
    Clock, DrumVoice, InstrumentKind, ManualClock, PlayMode, ThreadClock, Transport,
};
use beatgrid::{RecordingSoundEngine, RingbufSoundEngine, TriggerSource};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== beatgrid ===");

    let config = match std::env::args().nth(1) {
        Some(path) => {
            println!("Loading config from {}", path);
            SequencerConfig::load(path)?
        }
        None => SequencerConfig::default(),
    };

    let layout = config.layout()?;
    let store = Arc::new(ProjectStore::new(demo_project(Arc::clone(&layout))));
    let snapshot = store.snapshot();
    println!(
        "Project '{}': {} instruments, {} patterns, {} steps per pattern",
        snapshot.project_name(),
        snapshot.instrument_count(),
        snapshot.patterns().len(),
        snapshot.pattern_length()
    );

    // Offline render of one pass through the song
    let recorder = Arc::new(RecordingSoundEngine::new());
    let mut transport = Transport::new(
        ManualClock::new(config.default_bpm),
        Arc::clone(&store),
        recorder.clone(),
        &config,
    );
    transport.set_play_mode(PlayMode::Song);
    transport.play();
    let columns = snapshot.total_song_columns();
    transport.clock_mut().advance(columns);
    transport.stop();

    let triggers = recorder.take();
    println!("\nRendered {} columns, {} triggers:", columns, triggers.len());
    for trigger in triggers.iter().take(12) {
        let source = match trigger.source {
            TriggerSource::Pitch(pitch) => format!("note {}", pitch),
            TriggerSource::Voice(voice) => voice.to_string(),
        };
        println!(
            "   {:>7.3}s  {:<8} {} @ {:.2}",
            trigger.time, source, trigger.duration, trigger.velocity
        );
    }
    if triggers.len() > 12 {
        println!("   ... {} more", triggers.len() - 12);
    }

    // Real-time playback into the trigger queue
    let (engine, mut consumer) = RingbufSoundEngine::with_capacity(config.trigger_queue_capacity);
    let mut live = Transport::new(
        ThreadClock::new(config.default_bpm),
        Arc::clone(&store),
        Arc::new(engine),
        &config,
    );
    live.play();
    thread::sleep(Duration::from_millis(500));
    live.set_bpm(config.default_bpm * 1.5);
    thread::sleep(Duration::from_millis(500));
    live.stop();

    let mut received = 0;
    while ringbuf::traits::Consumer::try_pop(&mut consumer).is_some() {
        received += 1;
    }
    println!(
        "\nLive playback queued {} triggers (clock at {:.1} BPM)",
        received,
        live.clock().bpm()
    );

    // Save and load back
    let manager = ProjectManager::new(std::env::temp_dir().join("beatgrid"));
    let path = manager.save_to_default_path(&store.snapshot(), transport.bpm())?;
    println!("\nSaved project to: {}", path.display());
    println!("   - File size: {} bytes", std::fs::metadata(&path)?.len());

    let blank = ProjectModel::new(layout);
    let loaded = manager.load_project(&path, &blank)?;
    println!("Loaded project '{}':", loaded.model.project_name());
    println!("   - Patterns: {}", loaded.model.patterns().len());
    println!("   - Instruments: {}", loaded.model.instrument_count());
    println!("   - BPM: {:?}", loaded.bpm);

    Ok(())
}

/// A two-pattern song: a four-on-the-floor groove, then the groove with a melody on top
fn demo_project(layout: Arc<GridLayout>) -> ProjectModel {
    let mut model = ProjectModel::with_default_rack(layout);
    model.set_project_name("Demo Beat");

    let ids: Vec<String> = model.instrument_order().to_vec();
    let find = |kind: InstrumentKind| {
        ids.iter()
            .find(|id| model.instrument(id).is_some_and(|inst| inst.kind() == kind))
            .cloned()
    };
    let synth = find(InstrumentKind::Synth);
    let kick = find(InstrumentKind::Drum(DrumVoice::Kick));
    let snare = find(InstrumentKind::Drum(DrumVoice::Snare));
    let hat = find(InstrumentKind::Drum(DrumVoice::Hat));

    let columns = model.pattern_length();
    let groove = model.current_pattern_id().to_string();
    model.rename_pattern(&groove, "Groove");
    let lead = model.add_pattern(Some("Lead".to_string()));

    for pattern in [&groove, &lead] {
        for col in 0..columns {
            if let Some(kick) = &kick
                && col % 4 == 0
            {
                model.toggle_cell(pattern, kick, 0, col);
            }
            if let Some(snare) = &snare
                && col % 8 == 4
            {
                model.toggle_cell(pattern, snare, 0, col);
            }
            if let Some(hat) = &hat
                && col % 2 == 0
            {
                model.toggle_cell(pattern, hat, 0, col);
            }
        }
    }

    if let Some(synth) = &synth {
        for (col, row) in [(0, 0), (3, 3), (6, 7), (8, 5), (12, 3)] {
            model.toggle_cell(&lead, synth, row, col % columns);
        }
    }

    model.toggle_song_block(&groove, 0);
    model.toggle_song_block(&lead, 1);
    model.set_current_pattern(&groove);
    model
}
