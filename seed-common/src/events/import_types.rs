//! Import workflow type definitions
//!
//! Supporting types for import progress tracking.

use serde::{Deserialize, Serialize};

/// Phase of an import file run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportPhase {
    /// Raw rows stored as raw snapshots
    Loading,
    /// Raw snapshots translated through the column mappings
    Mapping,
    /// Mapped snapshots matched against existing buildings
    Matching,
}

/// Per-import outcome counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStatistics {
    pub rows: usize,
    pub matched_buildings: usize,
    pub new_buildings: usize,
    pub missing_buildings: usize,
    /// Rows whose every cell was blank
    pub skipped_rows: usize,
}

impl ImportStatistics {
    pub fn buildings_imported_total(&self) -> usize {
        self.matched_buildings + self.new_buildings + self.missing_buildings
    }
}
