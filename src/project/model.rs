// Project model - Instruments, patterns, pattern grids and song arrangement
//
// Every container sits behind an Arc and is only ever mutated through Arc::make_mut.
// Cloning a ProjectModel is therefore shallow, and an edit copies just the containers it
// touches: a reader holding an older snapshot keeps seeing that snapshot unchanged.

use log::debug;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::config::GridLayout;
use crate::sequencer::instrument::{DrumVoice, Instrument, InstrumentId, InstrumentKind};
use crate::sequencer::pattern::{self, CellKey, CellSet, Pattern, PatternId, generate_id};

/// Per-instrument cells of one pattern
pub type PatternGrid = HashMap<InstrumentId, Arc<CellSet>>;

/// Song blocks at which one pattern is placed
pub type SongBlocks = BTreeSet<u32>;

pub const DEFAULT_PROJECT_NAME: &str = "Untitled Project";

/// The project: everything the user edits, nothing about playback
#[derive(Debug, Clone)]
pub struct ProjectModel {
    layout: Arc<GridLayout>,
    project_name: String,
    instruments: Arc<HashMap<InstrumentId, Instrument>>,
    instrument_order: Arc<Vec<InstrumentId>>,
    patterns: Arc<Vec<Pattern>>,
    pattern_grids: Arc<HashMap<PatternId, Arc<PatternGrid>>>,
    song_grid: Arc<HashMap<PatternId, Arc<SongBlocks>>>,
    current_pattern_id: PatternId,
    selected_instrument_id: Option<InstrumentId>,
}

impl ProjectModel {
    /// Create a project with a single empty pattern and no instruments
    pub fn new(layout: Arc<GridLayout>) -> Self {
        let first = Pattern::new(generate_id(), "Pattern 1".to_string());
        let mut grids = HashMap::new();
        grids.insert(first.id.clone(), Arc::new(PatternGrid::new()));

        Self {
            layout,
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            instruments: Arc::new(HashMap::new()),
            instrument_order: Arc::new(Vec::new()),
            current_pattern_id: first.id.clone(),
            patterns: Arc::new(vec![first]),
            pattern_grids: Arc::new(grids),
            song_grid: Arc::new(HashMap::new()),
            selected_instrument_id: None,
        }
    }

    /// Create a project with a synth and one instrument per drum voice
    /// The synth ends up selected
    pub fn with_default_rack(layout: Arc<GridLayout>) -> Self {
        let mut model = Self::new(layout);
        let synth = model.add_instrument(InstrumentKind::Synth, None);
        for voice in DrumVoice::ALL {
            model.add_instrument(InstrumentKind::Drum(voice), None);
        }
        model.select_instrument(&synth);
        model
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// Steps per pattern
    pub fn pattern_length(&self) -> usize {
        self.layout.columns()
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Instruments in rack order
    pub fn instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.instrument_order
            .iter()
            .filter_map(|id| self.instruments.get(id))
    }

    pub fn instrument(&self, id: &str) -> Option<&Instrument> {
        self.instruments.get(id)
    }

    pub fn instrument_order(&self) -> &[InstrumentId] {
        &self.instrument_order
    }

    pub fn instrument_count(&self) -> usize {
        self.instruments.len()
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn pattern(&self, id: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.id == id)
    }

    pub fn current_pattern_id(&self) -> &str {
        &self.current_pattern_id
    }

    pub fn current_pattern(&self) -> &Pattern {
        self.pattern(&self.current_pattern_id)
            .unwrap_or(&self.patterns[0])
    }

    pub fn selected_instrument_id(&self) -> Option<&str> {
        self.selected_instrument_id.as_deref()
    }

    /// Grid of a pattern
    pub fn grid(&self, pattern_id: &str) -> Option<&PatternGrid> {
        self.pattern_grids.get(pattern_id).map(|grid| grid.as_ref())
    }

    /// Active cells of an instrument in a pattern
    /// `None` means no entry, which plays as an empty set
    pub fn active_cells(&self, pattern_id: &str, instrument_id: &str) -> Option<&CellSet> {
        self.grid(pattern_id)?
            .get(instrument_id)
            .map(|cells| cells.as_ref())
    }

    pub fn is_cell_active(&self, pattern_id: &str, instrument_id: &str, row: usize, col: usize) -> bool {
        self.active_cells(pattern_id, instrument_id)
            .is_some_and(|cells| cells.contains(&CellKey::new(row, col)))
    }

    /// Song blocks of a pattern
    pub fn song_blocks(&self, pattern_id: &str) -> Option<&SongBlocks> {
        self.song_grid.get(pattern_id).map(|blocks| blocks.as_ref())
    }

    /// Patterns placed at a song block, in pattern order
    pub fn patterns_at_block(&self, block: u32) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter().filter(move |p| {
            self.song_grid
                .get(&p.id)
                .is_some_and(|blocks| blocks.contains(&block))
        })
    }

    /// Highest block index used by any pattern
    pub fn max_song_block(&self) -> Option<u32> {
        self.song_grid
            .values()
            .filter_map(|blocks| blocks.last().copied())
            .max()
    }

    /// Song length in blocks; an empty arrangement still spans one block
    pub fn song_length_blocks(&self) -> usize {
        self.max_song_block()
            .map_or(1, |max| (max as usize).saturating_add(1))
    }

    /// Song length in columns, saturating at `usize::MAX`
    pub fn total_song_columns(&self) -> usize {
        self.song_length_blocks()
            .saturating_mul(self.pattern_length())
    }

    // ---------------------------------------------------------------------
    // Instruments
    // ---------------------------------------------------------------------

    /// Add an instrument at the end of the rack and select it
    pub fn add_instrument(&mut self, kind: InstrumentKind, name: Option<String>) -> InstrumentId {
        let id = generate_id();
        let name = clean_name(name).unwrap_or_else(|| self.next_instrument_name(kind));

        self.insert_instrument(Instrument::new(id.clone(), name, kind));
        self.selected_instrument_id = Some(id.clone());
        id
    }

    /// Remove an instrument and all of its cells
    pub fn remove_instrument(&mut self, id: &str) {
        if !self.instruments.contains_key(id) {
            debug!("remove_instrument: unknown instrument {}", id);
            return;
        }

        Arc::make_mut(&mut self.instruments).remove(id);
        Arc::make_mut(&mut self.instrument_order).retain(|other| other != id);
        for grid in Arc::make_mut(&mut self.pattern_grids).values_mut() {
            if grid.contains_key(id) {
                Arc::make_mut(grid).remove(id);
            }
        }

        if self.selected_instrument_id.as_deref() == Some(id) {
            self.selected_instrument_id = self.instrument_order.first().cloned();
        }
    }

    pub fn rename_instrument(&mut self, id: &str, name: &str) {
        let Some(name) = clean_name(Some(name.to_string())) else {
            return;
        };
        if let Some(inst) = self.instrument_mut(id) {
            inst.name = name;
        }
    }

    /// Flip the instrument's own mute flag
    pub fn toggle_mute(&mut self, id: &str) {
        if let Some(inst) = self.instrument_mut(id) {
            inst.muted = !inst.muted;
        }
    }

    /// Flip solo; turning it on clears every other instrument's solo
    pub fn toggle_solo(&mut self, id: &str) {
        let Some(inst) = self.instrument_mut(id) else {
            return;
        };
        inst.solo = !inst.solo;

        if inst.solo {
            for (other_id, other) in Arc::make_mut(&mut self.instruments).iter_mut() {
                if other_id != id {
                    other.solo = false;
                }
            }
        }
    }

    /// Select an instrument for editing; unknown ids are ignored
    pub fn select_instrument(&mut self, id: &str) {
        if self.instruments.contains_key(id) {
            self.selected_instrument_id = Some(id.to_string());
        } else {
            debug!("select_instrument: unknown instrument {}", id);
        }
    }

    // ---------------------------------------------------------------------
    // Patterns
    // ---------------------------------------------------------------------

    /// Add an empty pattern and make it current
    pub fn add_pattern(&mut self, name: Option<String>) -> PatternId {
        let id = generate_id();
        let name =
            clean_name(name).unwrap_or_else(|| format!("Pattern {}", self.patterns.len() + 1));

        let grid: PatternGrid = self
            .instrument_order
            .iter()
            .map(|inst| (inst.clone(), Arc::new(CellSet::new())))
            .collect();

        Arc::make_mut(&mut self.patterns).push(Pattern::new(id.clone(), name));
        Arc::make_mut(&mut self.pattern_grids).insert(id.clone(), Arc::new(grid));
        self.current_pattern_id = id.clone();
        id
    }

    /// Remove a pattern, its grid and its song placements
    /// The last remaining pattern is never removed
    pub fn remove_pattern(&mut self, id: &str) {
        if self.patterns.len() <= 1 {
            debug!("remove_pattern: refusing to remove the last pattern");
            return;
        }
        if self.pattern(id).is_none() {
            debug!("remove_pattern: unknown pattern {}", id);
            return;
        }

        Arc::make_mut(&mut self.patterns).retain(|p| p.id != id);
        Arc::make_mut(&mut self.pattern_grids).remove(id);
        if self.song_grid.contains_key(id) {
            Arc::make_mut(&mut self.song_grid).remove(id);
        }

        if self.current_pattern_id == id {
            if let Some(last) = self.patterns.last() {
                self.current_pattern_id = last.id.clone();
            }
        }
    }

    pub fn rename_pattern(&mut self, id: &str, name: &str) {
        let Some(name) = clean_name(Some(name.to_string())) else {
            return;
        };
        if self.pattern(id).is_none() {
            return;
        }
        if let Some(pattern) = Arc::make_mut(&mut self.patterns)
            .iter_mut()
            .find(|p| p.id == id)
        {
            pattern.name = name;
        }
    }

    /// Switch the pattern being edited and played in pattern mode
    pub fn set_current_pattern(&mut self, id: &str) {
        if self.pattern(id).is_some() {
            self.current_pattern_id = id.to_string();
        } else {
            debug!("set_current_pattern: unknown pattern {}", id);
        }
    }

    // ---------------------------------------------------------------------
    // Cells and song arrangement
    // ---------------------------------------------------------------------

    /// Flip one cell of an instrument in a pattern
    ///
    /// Returns whether the cell is now active, or `None` when the edit was ignored because the
    /// pattern or instrument no longer exists or the cell lies outside the grid.
    pub fn toggle_cell(
        &mut self,
        pattern_id: &str,
        instrument_id: &str,
        row: usize,
        col: usize,
    ) -> Option<bool> {
        if self.pattern(pattern_id).is_none() || !self.instruments.contains_key(instrument_id) {
            debug!(
                "toggle_cell: pattern {} or instrument {} does not exist",
                pattern_id, instrument_id
            );
            return None;
        }
        if row >= self.layout.rows() || col >= self.layout.columns() {
            debug!("toggle_cell: cell {}:{} outside the grid", row, col);
            return None;
        }

        let grid = Arc::make_mut(&mut self.pattern_grids)
            .entry(pattern_id.to_string())
            .or_default();
        let cells = Arc::make_mut(grid)
            .entry(instrument_id.to_string())
            .or_default();
        Some(pattern::toggle_cell(
            Arc::make_mut(cells),
            CellKey::new(row, col),
        ))
    }

    /// Flip a cell in the current pattern
    pub fn toggle_cell_in_current(&mut self, instrument_id: &str, row: usize, col: usize) -> Option<bool> {
        let pattern_id = self.current_pattern_id.clone();
        self.toggle_cell(&pattern_id, instrument_id, row, col)
    }

    /// Empty every instrument's cells in a pattern
    pub fn clear_pattern(&mut self, pattern_id: &str) {
        let Some(grid) = self.pattern_grids.get(pattern_id) else {
            return;
        };
        if grid.values().all(|cells| cells.is_empty()) {
            return;
        }

        if let Some(grid) = Arc::make_mut(&mut self.pattern_grids).get_mut(pattern_id) {
            for cells in Arc::make_mut(grid).values_mut() {
                *cells = Arc::new(CellSet::new());
            }
        }
    }

    /// Place or remove a pattern at a song block
    /// Returns whether the pattern is now placed there, `None` for unknown patterns
    pub fn toggle_song_block(&mut self, pattern_id: &str, block: u32) -> Option<bool> {
        if self.pattern(pattern_id).is_none() {
            debug!("toggle_song_block: unknown pattern {}", pattern_id);
            return None;
        }

        let song_grid = Arc::make_mut(&mut self.song_grid);
        let blocks = Arc::make_mut(song_grid.entry(pattern_id.to_string()).or_default());
        let placed = if blocks.remove(&block) {
            false
        } else {
            blocks.insert(block);
            true
        };

        if blocks.is_empty() {
            song_grid.remove(pattern_id);
        }
        Some(placed)
    }

    pub fn set_project_name(&mut self, name: &str) {
        if let Some(name) = clean_name(Some(name.to_string())) {
            self.project_name = name;
        }
    }

    // ---------------------------------------------------------------------
    // Bulk replacement (project import)
    // ---------------------------------------------------------------------

    /// Insert an instrument under its own id with empty cells in every pattern
    /// An existing instrument with the same id is left untouched
    pub(crate) fn insert_instrument(&mut self, instrument: Instrument) {
        if self.instruments.contains_key(&instrument.id) {
            return;
        }
        let id = instrument.id.clone();

        Arc::make_mut(&mut self.instruments).insert(id.clone(), instrument);
        Arc::make_mut(&mut self.instrument_order).push(id.clone());

        let grids = Arc::make_mut(&mut self.pattern_grids);
        for pattern in self.patterns.iter() {
            let grid = grids.entry(pattern.id.clone()).or_default();
            Arc::make_mut(grid).entry(id.clone()).or_default();
        }
    }

    pub(crate) fn set_project_name_raw(&mut self, name: String) {
        self.project_name = name;
    }

    pub(crate) fn replace_patterns(&mut self, patterns: Vec<Pattern>) {
        self.patterns = Arc::new(patterns);
    }

    pub(crate) fn replace_instrument_order(&mut self, order: Vec<InstrumentId>) {
        self.instrument_order = Arc::new(order);
    }

    pub(crate) fn replace_pattern_grids(&mut self, grids: HashMap<PatternId, PatternGrid>) {
        self.pattern_grids = Arc::new(
            grids
                .into_iter()
                .map(|(id, grid)| (id, Arc::new(grid)))
                .collect(),
        );
    }

    pub(crate) fn replace_song_grid(&mut self, song_grid: HashMap<PatternId, SongBlocks>) {
        self.song_grid = Arc::new(
            song_grid
                .into_iter()
                .filter(|(_, blocks)| !blocks.is_empty())
                .map(|(id, blocks)| (id, Arc::new(blocks)))
                .collect(),
        );
    }

    pub(crate) fn set_current_pattern_raw(&mut self, id: PatternId) {
        self.current_pattern_id = id;
    }

    /// Restore every model invariant after bulk replacement
    ///
    /// - at least one pattern, unique pattern ids
    /// - instrument order lists exactly the known instruments, once each
    /// - grids exist for every pattern and instrument, and nothing else; cells inside the layout
    /// - song arrangement only for known patterns
    /// - current pattern and selected instrument refer to existing entities
    pub(crate) fn heal(&mut self) {
        let mut seen = HashSet::new();
        Arc::make_mut(&mut self.patterns).retain(|p| seen.insert(p.id.clone()));
        if self.patterns.is_empty() {
            Arc::make_mut(&mut self.patterns)
                .push(Pattern::new(generate_id(), "Pattern 1".to_string()));
        }

        let mut listed = HashSet::new();
        let mut order: Vec<InstrumentId> = self
            .instrument_order
            .iter()
            .filter(|id| self.instruments.contains_key(*id) && listed.insert((*id).clone()))
            .cloned()
            .collect();
        let mut unlisted: Vec<InstrumentId> = self
            .instruments
            .keys()
            .filter(|id| !listed.contains(*id))
            .cloned()
            .collect();
        unlisted.sort();
        order.extend(unlisted);
        if order != *self.instrument_order {
            self.instrument_order = Arc::new(order);
        }

        let layout = Arc::clone(&self.layout);
        let pattern_ids: HashSet<&PatternId> = self.patterns.iter().map(|p| &p.id).collect();
        let grids = Arc::make_mut(&mut self.pattern_grids);
        grids.retain(|id, _| pattern_ids.contains(id));
        for pattern in self.patterns.iter() {
            let grid = Arc::make_mut(grids.entry(pattern.id.clone()).or_default());
            grid.retain(|id, _| self.instruments.contains_key(id));
            for inst in self.instrument_order.iter() {
                let cells = grid.entry(inst.clone()).or_default();
                if cells
                    .iter()
                    .any(|key| key.row >= layout.rows() || key.col >= layout.columns())
                {
                    Arc::make_mut(cells)
                        .retain(|key| key.row < layout.rows() && key.col < layout.columns());
                }
            }
        }

        if self.song_grid.keys().any(|id| !pattern_ids.contains(id)) {
            Arc::make_mut(&mut self.song_grid).retain(|id, _| pattern_ids.contains(id));
        }

        if self.pattern(&self.current_pattern_id).is_none() {
            self.current_pattern_id = self.patterns[0].id.clone();
        }

        let selection_valid = self
            .selected_instrument_id
            .as_deref()
            .is_some_and(|id| self.instruments.contains_key(id));
        if !selection_valid {
            self.selected_instrument_id = self.instrument_order.first().cloned();
        }
    }

    fn instrument_mut(&mut self, id: &str) -> Option<&mut Instrument> {
        if !self.instruments.contains_key(id) {
            debug!("unknown instrument {}", id);
            return None;
        }
        Arc::make_mut(&mut self.instruments).get_mut(id)
    }

    fn next_instrument_name(&self, kind: InstrumentKind) -> String {
        let base = kind.default_name();
        let taken = |name: &str| self.instruments.values().any(|inst| inst.name == name);

        if !taken(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{} {}", base, n))
            .find(|name| !taken(name))
            .unwrap_or_else(|| base.to_string())
    }
}

fn clean_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}
