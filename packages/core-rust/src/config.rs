//! Grid behavior settings.

use serde::{Deserialize, Serialize};

use crate::sort::{NullPlacement, SortMode};

/// User-level grid preferences, threaded into the comparator and pipeline.
///
/// Deserializes from the backend's system-config object; absent keys take
/// their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    /// Three-state header cycle (asc → desc → unsorted) when true.
    pub use_tristate_sort: bool,
    /// Where rows without a sort key go.
    pub unknown_sort_position: NullPlacement,
    /// Whether the UI asks before deleting a row. Carried, not enforced here.
    pub confirm_delete: bool,
    /// Whether soft-deleted rows are fetched and shown at the end of the grid.
    pub show_deleted_rows: bool,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            use_tristate_sort: true,
            unknown_sort_position: NullPlacement::Bottom,
            confirm_delete: false,
            show_deleted_rows: true,
        }
    }
}

impl GridSettings {
    #[must_use]
    pub fn sort_mode(&self) -> SortMode {
        if self.use_tristate_sort {
            SortMode::ThreeState
        } else {
            SortMode::TwoState
        }
    }
}
