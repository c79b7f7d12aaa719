//! Views and the serializable view config.
//!
//! A view's `config` is a free-form JSON object on the backend. The grid owns
//! three keys in it (`sortBy`, `sortDir`, `filters`); every other key is kept
//! verbatim in [`ViewConfig::extra`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map as JsonMap, Value as Json};
use tracing::debug;

use crate::filter::FilterState;
use crate::schema::Column;
use crate::sort::{SortDirection, SortState};

/// Kind of view. Only grid views carry sort/filter state the engine reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    #[default]
    Grid,
    Gallery,
    Calendar,
    Board,
}

/// Filter state in its JSON-compatible form: column id → accepted values.
pub type SerializedFilters = BTreeMap<String, Vec<String>>;

/// Named, persisted bundle of sort and filter configuration for a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub id: String,
    pub list_id: String,
    pub name: String,
    #[serde(default)]
    pub view_type: ViewType,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_config")]
    pub config: ViewConfig,
}

impl View {
    /// Creates a grid view with an empty config.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        list_id: impl Into<String>,
        name: impl Into<String>,
        is_default: bool,
    ) -> Self {
        Self {
            id: id.into(),
            list_id: list_id.into(),
            name: name.into(),
            view_type: ViewType::Grid,
            is_default,
            position: None,
            config: ViewConfig::default(),
        }
    }
}

/// A view's `config` bag, typed where the grid reads it.
///
/// Deserialization never fails on the grid-owned keys: a malformed `sortDir`
/// or `filters` entry degrades to `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ViewConfig {
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(rename = "sortDir")]
    pub sort_dir: Option<SortDirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<SerializedFilters>,
    #[serde(flatten)]
    pub extra: JsonMap<String, Json>,
}

impl<'de> Deserialize<'de> for ViewConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bag = JsonMap::<String, Json>::deserialize(deserializer)?;
        Ok(Self::from_bag(bag))
    }
}

/// `config: null` on the wire is the same as an empty config.
fn deserialize_config<'de, D>(deserializer: D) -> Result<ViewConfig, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<ViewConfig>::deserialize(deserializer)?.unwrap_or_default())
}

impl ViewConfig {
    fn from_bag(mut bag: JsonMap<String, Json>) -> Self {
        let sort_by = match bag.remove("sortBy") {
            Some(Json::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        };
        let sort_dir = bag
            .remove("sortDir")
            .and_then(|d| serde_json::from_value::<SortDirection>(d).ok());
        let filters = bag.remove("filters").and_then(|f| match f {
            Json::Object(map) => Some(
                map.into_iter()
                    .filter_map(|(column, values)| match values {
                        Json::Array(arr) => Some((
                            column,
                            arr.into_iter()
                                .filter_map(|v| match v {
                                    Json::String(s) => Some(s),
                                    _ => None,
                                })
                                .collect(),
                        )),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        });
        Self {
            sort_by,
            sort_dir,
            filters,
            extra: bag,
        }
    }

    /// Config for a new saved view capturing the current filters and sort.
    #[must_use]
    pub fn with_state(filters: &FilterState, sort: &SortState) -> Self {
        let mut config = Self {
            filters: Some(serialize_filters(filters)),
            ..Self::default()
        };
        config.set_sort(sort);
        config
    }

    /// Overwrites `sortBy` / `sortDir`, leaving every other key alone.
    pub fn set_sort(&mut self, sort: &SortState) {
        let active = sort.active();
        self.sort_by = active.map(|(column, _)| column.to_string());
        self.sort_dir = active.map(|(_, dir)| dir);
    }

    /// The stored sort, with references to deleted columns dropped.
    #[must_use]
    pub fn sort_state(&self, columns: &[Column]) -> SortState {
        match (&self.sort_by, self.sort_dir) {
            (Some(column), Some(dir)) if columns.iter().any(|c| &c.id == column) => {
                SortState::by(column.clone(), dir)
            }
            (Some(column), Some(_)) => {
                debug!(column = %column, "view sorts by a deleted column; ignoring");
                SortState::unsorted()
            }
            _ => SortState::unsorted(),
        }
    }

    /// The stored filters, with references to deleted columns dropped.
    #[must_use]
    pub fn filter_state(&self, columns: &[Column]) -> FilterState {
        let Some(filters) = &self.filters else {
            return FilterState::new();
        };
        let mut state = deserialize_filters(filters);
        state.retain(|column, _| {
            let known = columns.iter().any(|c| &c.id == column);
            if !known {
                debug!(column = %column, "view filters on a deleted column; ignoring");
            }
            known
        });
        state
    }

    /// Hydrates in-memory filter and sort state. Never mutates the config.
    #[must_use]
    pub fn hydrate(&self, columns: &[Column]) -> (FilterState, SortState) {
        (self.filter_state(columns), self.sort_state(columns))
    }
}

/// Converts set-based filter state into plain JSON-compatible lists.
/// Columns with no accepted values are omitted.
#[must_use]
pub fn serialize_filters(filters: &FilterState) -> SerializedFilters {
    filters
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(column, values)| (column.clone(), values.iter().cloned().collect()))
        .collect()
}

/// Inverse of [`serialize_filters`]. Duplicate values collapse.
#[must_use]
pub fn deserialize_filters(serialized: &SerializedFilters) -> FilterState {
    serialized
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(column, values)| {
            (
                column.clone(),
                values.iter().cloned().collect::<BTreeSet<String>>(),
            )
        })
        .collect()
}
