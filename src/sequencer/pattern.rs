// Pattern - A named loop of per-instrument step grids
// A pattern is like a "clip" in other DAWs; its cells live in the project's pattern grids

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Unique identifier for patterns
pub type PatternId = String;

/// Generate a unique identifier for a pattern or instrument
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A pattern: identity and display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: PatternId,
    pub name: String,
}

impl Pattern {
    pub fn new(id: PatternId, name: String) -> Self {
        Self { id, name }
    }
}

/// One grid cell: a pitch row or drum lane at a time step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub row: usize,
    pub col: usize,
}

impl CellKey {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Active cells of one instrument in one pattern
pub type CellSet = HashSet<CellKey>;

/// Error parsing a `"row:col"` cell key
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid cell key '{0}', expected \"row:col\"")]
pub struct CellKeyParseError(pub String);

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

impl FromStr for CellKey {
    type Err = CellKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (row, col) = s
            .split_once(':')
            .ok_or_else(|| CellKeyParseError(s.to_string()))?;
        let row = row
            .trim()
            .parse()
            .map_err(|_| CellKeyParseError(s.to_string()))?;
        let col = col
            .trim()
            .parse()
            .map_err(|_| CellKeyParseError(s.to_string()))?;
        Ok(Self { row, col })
    }
}

/// Flip membership of `key` in `cells`; returns whether the cell is now active
pub fn toggle_cell(cells: &mut CellSet, key: CellKey) -> bool {
    if cells.remove(&key) {
        false
    } else {
        cells.insert(key);
        true
    }
}
