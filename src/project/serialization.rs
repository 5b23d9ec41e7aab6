// Serialization utilities for project persistence
//
// Export is a straight conversion to SaveFileV1. Import is a merge: every top-level field that
// is present and well formed overwrites the matching part of an existing project, everything
// else is kept, and the result is healed so all model invariants hold again.

use log::warn;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::project::manager::ProjectError;
use crate::project::model::{PatternGrid, ProjectModel, SongBlocks};
use crate::project::types::{
    InstrumentKindTag, InstrumentMeta, SAVE_FILE_VERSION, SaveFileV1, instrument_kind,
};
use crate::sequencer::instrument::{DrumVoice, Instrument};
use crate::sequencer::pattern::{CellKey, CellSet, Pattern};

/// A project read from a save file
#[derive(Debug, Clone)]
pub struct LoadedProject {
    pub model: ProjectModel,
    /// Tempo stored in the file, if any
    pub bpm: Option<f64>,
}

/// Convert a project and its tempo into a save file
pub fn export_project(model: &ProjectModel, bpm: f64) -> SaveFileV1 {
    let instruments = model
        .instruments()
        .map(|inst| (inst.id.clone(), InstrumentMeta::from_instrument(inst)))
        .collect();

    let pattern_grids = model
        .patterns()
        .iter()
        .filter_map(|pattern| {
            let grid = model.grid(&pattern.id)?;
            let cells = grid
                .iter()
                .map(|(inst, cells)| {
                    let mut keys: Vec<CellKey> = cells.iter().copied().collect();
                    keys.sort();
                    (inst.clone(), keys.iter().map(CellKey::to_string).collect())
                })
                .collect();
            Some((pattern.id.clone(), cells))
        })
        .collect();

    let song_grid = model
        .patterns()
        .iter()
        .filter_map(|pattern| {
            let blocks = model.song_blocks(&pattern.id)?;
            Some((pattern.id.clone(), blocks.iter().copied().collect()))
        })
        .collect();

    SaveFileV1 {
        version: SAVE_FILE_VERSION,
        project_name: model.project_name().to_string(),
        patterns: model.patterns().to_vec(),
        current_pattern_id: model.current_pattern_id().to_string(),
        instrument_order: model.instrument_order().to_vec(),
        instruments,
        pattern_grids,
        song_grid,
        bpm,
    }
}

/// Serialize a save file to pretty-printed JSON
pub fn to_json_bytes(save: &SaveFileV1) -> Result<Vec<u8>, ProjectError> {
    serde_json::to_vec_pretty(save).map_err(|e| {
        ProjectError::Serialization(format!("Failed to serialize project to JSON: {}", e))
    })
}

/// Instrument entry as accepted on import; every field may be missing
#[derive(Debug, Deserialize)]
struct InstrumentPatch {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    kind: Option<InstrumentKindTag>,
    #[serde(default)]
    voice: Option<DrumVoice>,
}

/// Merge a save file into a copy of `existing`
///
/// Fails only when the bytes are not a JSON object or the version is not 1; in both cases
/// nothing has been read yet. `existing` itself is never modified.
pub fn import_project(bytes: &[u8], existing: &ProjectModel) -> Result<LoadedProject, ProjectError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| ProjectError::Parse(format!("Invalid JSON: {}", e)))?;
    let Value::Object(fields) = value else {
        return Err(ProjectError::Parse(
            "Save file is not a JSON object".to_string(),
        ));
    };

    match fields.get("version") {
        Some(version) if version.as_f64() == Some(f64::from(SAVE_FILE_VERSION)) => {}
        Some(version) => return Err(ProjectError::UnsupportedVersion(version.to_string())),
        None => return Err(ProjectError::UnsupportedVersion("missing".to_string())),
    }

    let mut model = existing.clone();

    if let Some(name) = field::<String>(&fields, "projectName") {
        model.set_project_name_raw(name);
    }

    if let Some(patterns) = field::<Vec<Pattern>>(&fields, "patterns") {
        model.replace_patterns(patterns);
    }

    if let Some(instruments) = field::<BTreeMap<String, Value>>(&fields, "instruments") {
        merge_instruments(&mut model, instruments);
    }

    if let Some(order) = field::<Vec<String>>(&fields, "instrumentOrder") {
        model.replace_instrument_order(order);
    }

    if let Some(grids) =
        field::<BTreeMap<String, BTreeMap<String, Vec<String>>>>(&fields, "patternGrids")
    {
        if !grids.is_empty() {
            model.replace_pattern_grids(parse_grids(grids));
        }
    }

    if let Some(song_grid) = field::<BTreeMap<String, Vec<u32>>>(&fields, "songGrid") {
        if !song_grid.is_empty() {
            model.replace_song_grid(
                song_grid
                    .into_iter()
                    .map(|(id, blocks)| (id, blocks.into_iter().collect::<SongBlocks>()))
                    .collect(),
            );
        }
    }

    if let Some(current) = field::<String>(&fields, "currentPatternId") {
        model.set_current_pattern_raw(current);
    }

    let bpm = fields.get("bpm").and_then(Value::as_f64);

    model.heal();
    Ok(LoadedProject { model, bpm })
}

/// Read one top-level field; absent, null or malformed fields yield `None`
fn field<T: DeserializeOwned>(fields: &Map<String, Value>, key: &str) -> Option<T> {
    match fields.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => match T::deserialize(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Ignoring malformed '{}' in save file: {}", key, e);
                None
            }
        },
    }
}

fn merge_instruments(model: &mut ProjectModel, instruments: BTreeMap<String, Value>) {
    for (id, value) in instruments {
        let patch = match InstrumentPatch::deserialize(&value) {
            Ok(patch) => patch,
            Err(e) => {
                warn!("Ignoring malformed instrument '{}': {}", id, e);
                continue;
            }
        };

        if model.instrument(&id).is_some() {
            // Kind is fixed at creation; only the name can change
            if let Some(name) = patch.name {
                model.rename_instrument(&id, &name);
            }
            continue;
        }

        let Some(kind) = patch
            .kind
            .and_then(|tag| instrument_kind(tag, patch.voice))
        else {
            warn!("Ignoring instrument '{}' without a usable kind", id);
            continue;
        };
        let name = patch
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| kind.default_name().to_string());
        model.insert_instrument(Instrument::new(id, name, kind));
    }
}

fn parse_grids(
    grids: BTreeMap<String, BTreeMap<String, Vec<String>>>,
) -> HashMap<String, PatternGrid> {
    grids
        .into_iter()
        .map(|(pattern_id, grid)| {
            let grid = grid
                .into_iter()
                .map(|(instrument_id, keys)| {
                    let cells: CellSet = keys
                        .iter()
                        .filter_map(|key| match key.parse::<CellKey>() {
                            Ok(cell) => Some(cell),
                            Err(e) => {
                                warn!("Skipping cell in pattern '{}': {}", pattern_id, e);
                                None
                            }
                        })
                        .collect();
                    (instrument_id, Arc::new(cells))
                })
                .collect();
            (pattern_id, grid)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridLayout;
    use crate::sequencer::instrument::InstrumentKind;

    fn project() -> ProjectModel {
        ProjectModel::with_default_rack(Arc::new(GridLayout::default()))
    }

    #[test]
    fn test_export_shape() {
        let mut model = project();
        let synth = model.instrument_order()[0].clone();
        let pid = model.current_pattern_id().to_string();
        model.toggle_cell(&pid, &synth, 3, 10);
        model.toggle_cell(&pid, &synth, 3, 2);
        model.toggle_cell(&pid, &synth, 0, 7);
        model.toggle_song_block(&pid, 2);
        model.toggle_song_block(&pid, 0);

        let save = export_project(&model, 128.0);
        assert_eq!(save.version, 1);
        assert_eq!(save.bpm, 128.0);
        assert_eq!(save.instruments.len(), 4);
        assert_eq!(save.pattern_grids[&pid][&synth], vec!["0:7", "3:2", "3:10"]);
        assert_eq!(save.song_grid[&pid], vec![0, 2]);

        let json: Value = serde_json::from_slice(&to_json_bytes(&save).unwrap()).unwrap();
        assert!(json.get("projectName").is_some());
        assert!(json.get("currentPatternId").is_some());
        assert!(json.get("instrumentOrder").is_some());
    }

    #[test]
    fn test_export_is_deterministic() {
        let model = project();
        let first = to_json_bytes(&export_project(&model, 120.0)).unwrap();
        let second = to_json_bytes(&export_project(&model, 120.0)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_version_gate() {
        let model = project();
        for bytes in [
            br#"{"version": 2, "projectName": "x"}"#.as_slice(),
            br#"{"projectName": "x"}"#.as_slice(),
            br#"{"version": "1"}"#.as_slice(),
        ] {
            let err = import_project(bytes, &model).unwrap_err();
            assert!(matches!(err, ProjectError::UnsupportedVersion(_)));
        }
    }

    #[test]
    fn test_invalid_json() {
        let model = project();
        assert!(matches!(
            import_project(b"not json", &model),
            Err(ProjectError::Parse(_))
        ));
        assert!(matches!(
            import_project(b"[1, 2]", &model),
            Err(ProjectError::Parse(_))
        ));
    }

    #[test]
    fn test_absent_fields_keep_existing_values() {
        let mut model = project();
        model.set_project_name("Keep Me");
        let pid = model.current_pattern_id().to_string();
        model.toggle_song_block(&pid, 1);

        let loaded = import_project(br#"{"version": 1, "bpm": 90}"#, &model).unwrap();

        assert_eq!(loaded.bpm, Some(90.0));
        assert_eq!(loaded.model.project_name(), "Keep Me");
        assert_eq!(loaded.model.patterns(), model.patterns());
        assert_eq!(loaded.model.instrument_order(), model.instrument_order());
        assert_eq!(loaded.model.max_song_block(), Some(1));
    }

    #[test]
    fn test_malformed_field_is_skipped() {
        let model = project();
        let loaded = import_project(
            br#"{"version": 1, "patterns": "nope", "projectName": "Fresh"}"#,
            &model,
        )
        .unwrap();

        assert_eq!(loaded.model.patterns(), model.patterns());
        assert_eq!(loaded.model.project_name(), "Fresh");
        assert_eq!(loaded.bpm, None);
    }

    #[test]
    fn test_existing_instrument_keeps_kind() {
        let model = project();
        let synth = model.instrument_order()[0].clone();
        let json = format!(
            r#"{{"version": 1, "instruments": {{"{}": {{"id": "{}", "name": "Bass", "kind": "drum", "voice": "kick"}}}}}}"#,
            synth, synth
        );

        let loaded = import_project(json.as_bytes(), &model).unwrap();
        let inst = loaded.model.instrument(&synth).unwrap();
        assert_eq!(inst.name, "Bass");
        assert_eq!(inst.kind(), InstrumentKind::Synth);
    }

    #[test]
    fn test_bad_cell_keys_are_skipped_and_invariants_healed() {
        let model = ProjectModel::new(Arc::new(GridLayout::default()));
        let json = br#"{
            "version": 1,
            "patterns": [{"id": "p1", "name": "Intro"}],
            "currentPatternId": "gone",
            "instrumentOrder": ["ghost", "hat"],
            "instruments": {"hat": {"id": "hat", "name": "Hat", "kind": "drum", "voice": "hat"}},
            "patternGrids": {
                "p1": {"hat": ["0:0", "garbage", "0:99"], "ghost": ["1:1"]},
                "orphan": {"hat": ["0:1"]}
            },
            "songGrid": {"p1": [0, 3], "orphan": [1]}
        }"#;

        let loaded = import_project(json, &model).unwrap().model;

        assert_eq!(loaded.current_pattern_id(), "p1");
        assert_eq!(loaded.instrument_order(), &["hat".to_string()]);
        assert_eq!(loaded.selected_instrument_id(), Some("hat"));
        assert!(loaded.grid("orphan").is_none());
        assert!(loaded.song_blocks("orphan").is_none());

        let cells = loaded.active_cells("p1", "hat").unwrap();
        assert_eq!(cells.len(), 1);
        assert!(cells.contains(&CellKey::new(0, 0)));
        assert!(loaded.grid("p1").unwrap().get("ghost").is_none());
        assert_eq!(loaded.max_song_block(), Some(3));
    }

    #[test]
    fn test_import_leaves_existing_untouched() {
        let model = project();
        let before = export_project(&model, 120.0);

        let _ = import_project(br#"{"version": 1, "projectName": "Other"}"#, &model).unwrap();

        assert_eq!(export_project(&model, 120.0), before);
    }
}
