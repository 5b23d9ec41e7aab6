// Integration test for project persistence
// Tests the complete save/load cycle with realistic data

use std::collections::HashSet;
use std::sync::Arc;

use beatgrid::config::GridLayout;
use beatgrid::project::{
    ProjectError, ProjectManager, ProjectModel, ProjectStore, export_project, import_project,
    to_json_bytes,
};
use beatgrid::sequencer::{CellKey, DrumVoice, InstrumentKind, PlayMode, resolve, total_columns};
use tempfile::TempDir;

fn layout() -> Arc<GridLayout> {
    Arc::new(GridLayout::default())
}

/// Two patterns, three instruments, overlapping song placements
fn realistic_project() -> ProjectModel {
    let mut model = ProjectModel::new(layout());
    model.set_project_name("Integration Test Project");
    let synth = model.add_instrument(InstrumentKind::Synth, Some("Lead".to_string()));
    let kick = model.add_instrument(InstrumentKind::Drum(DrumVoice::Kick), None);
    let hat = model.add_instrument(InstrumentKind::Drum(DrumVoice::Hat), None);

    let verse = model.current_pattern_id().to_string();
    model.rename_pattern(&verse, "Verse");
    let chorus = model.add_pattern(Some("Chorus".to_string()));

    for col in (0..16).step_by(4) {
        model.toggle_cell(&verse, &kick, 0, col);
        model.toggle_cell(&chorus, &kick, 0, col);
    }
    for col in (2..16).step_by(4) {
        model.toggle_cell(&chorus, &hat, 0, col);
    }
    model.toggle_cell(&verse, &synth, 0, 0);
    model.toggle_cell(&verse, &synth, 4, 6);
    model.toggle_cell(&chorus, &synth, 7, 8);
    model.toggle_cell(&chorus, &synth, 11, 15);

    model.toggle_song_block(&verse, 0);
    model.toggle_song_block(&verse, 1);
    model.toggle_song_block(&chorus, 1);
    model.toggle_song_block(&chorus, 3);

    model.toggle_mute(&hat);
    model.set_current_pattern(&verse);
    model
}

fn cells(model: &ProjectModel, pattern: &str, instrument: &str) -> HashSet<CellKey> {
    model
        .active_cells(pattern, instrument)
        .cloned()
        .unwrap_or_default()
}

#[test]
fn test_round_trip_preserves_grids_and_arrangement() {
    let model = realistic_project();
    let bytes = to_json_bytes(&export_project(&model, 142.0)).unwrap();

    let blank = ProjectModel::new(layout());
    let loaded = import_project(&bytes, &blank).unwrap();
    let restored = &loaded.model;

    assert_eq!(loaded.bpm, Some(142.0));
    assert_eq!(restored.project_name(), model.project_name());
    assert_eq!(restored.patterns(), model.patterns());
    assert_eq!(restored.current_pattern_id(), model.current_pattern_id());
    assert_eq!(restored.instrument_order(), model.instrument_order());

    for pattern in model.patterns() {
        for instrument in model.instruments() {
            assert_eq!(
                cells(restored, &pattern.id, &instrument.id),
                cells(&model, &pattern.id, &instrument.id),
            );
        }
        assert_eq!(
            restored.song_blocks(&pattern.id),
            model.song_blocks(&pattern.id)
        );
    }

    for instrument in model.instruments() {
        let other = restored.instrument(&instrument.id).unwrap();
        assert_eq!(other.name, instrument.name);
        assert_eq!(other.kind(), instrument.kind());
    }
}

#[test]
fn test_complete_project_persistence_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let manager = ProjectManager::new(temp_dir.path().join("projects"));
    let model = realistic_project();

    let path = manager.save_to_default_path(&model, 98.0).unwrap();
    assert!(path.exists());
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "Integration Test Project.json"
    );

    // Loading publishes atomically through the store
    let store = ProjectStore::new(ProjectModel::with_default_rack(layout()));
    let loaded = manager.load_project(&path, &store.snapshot()).unwrap();
    store.replace(loaded.model);

    let snapshot = store.snapshot();
    assert_eq!(snapshot.patterns().len(), 2);
    assert_eq!(snapshot.max_song_block(), Some(3));
    assert_eq!(loaded.bpm, Some(98.0));
}

#[test]
fn test_failed_import_changes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let manager = ProjectManager::new(temp_dir.path());
    let path = temp_dir.path().join("future.json");
    std::fs::write(&path, br#"{"version": 2, "projectName": "From The Future"}"#).unwrap();

    let store = ProjectStore::new(realistic_project());
    let before = export_project(&store.snapshot(), 120.0);

    let result = manager.load_project(&path, &store.snapshot());
    assert!(matches!(result, Err(ProjectError::UnsupportedVersion(_))));
    assert_eq!(export_project(&store.snapshot(), 120.0), before);
}

#[test]
fn test_merge_preserves_absent_fields() {
    let existing = realistic_project();
    let json = br#"{
        "version": 1,
        "projectName": "Renamed",
        "patternGrids": {},
        "songGrid": {}
    }"#;

    let loaded = import_project(json, &existing).unwrap();
    let merged = &loaded.model;

    assert_eq!(merged.project_name(), "Renamed");
    assert_eq!(loaded.bpm, None);
    assert_eq!(merged.patterns(), existing.patterns());
    assert_eq!(merged.instrument_order(), existing.instrument_order());
    // Empty grid maps do not wipe existing content
    for pattern in existing.patterns() {
        for instrument in existing.instruments() {
            assert_eq!(
                cells(merged, &pattern.id, &instrument.id),
                cells(&existing, &pattern.id, &instrument.id),
            );
        }
    }
    assert_eq!(merged.max_song_block(), existing.max_song_block());
}

#[test]
fn test_saved_json_layout() {
    let model = realistic_project();
    let bytes = to_json_bytes(&export_project(&model, 120.0)).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(json["version"], 1);
    assert_eq!(json["bpm"], 120.0);
    assert_eq!(json["patterns"][0]["name"], "Verse");

    let verse = model.current_pattern_id();
    let blocks = json["songGrid"][verse].as_array().unwrap();
    assert_eq!(blocks.len(), 2);

    for (_, meta) in json["instruments"].as_object().unwrap() {
        let kind = meta["kind"].as_str().unwrap();
        assert!(kind == "synth" || kind == "drum");
        assert_eq!(meta.get("voice").is_some(), kind == "drum");
        // Mute state is not part of the file
        assert!(meta.get("muted").is_none());
    }
}

#[test]
#[cfg(target_pointer_width = "64")]
fn test_song_block_at_u32_max_loads_and_plays() {
    let json = br#"{
        "version": 1,
        "patterns": [{"id": "p1", "name": "A"}],
        "songGrid": {"p1": [4294967295]}
    }"#;

    let loaded = import_project(json, &ProjectModel::new(layout())).unwrap();
    let model = &loaded.model;

    assert_eq!(model.max_song_block(), Some(u32::MAX));
    let total = total_columns(model, PlayMode::Song);
    assert_eq!(total, (u32::MAX as usize + 1) * 16);
    assert!(resolve(model, total - 1, PlayMode::Song, 0.0).is_empty());
    assert!(resolve(model, total, PlayMode::Song, 0.0).is_empty());
}
