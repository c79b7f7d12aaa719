//! `ListGrid` Core: typed list data model, value coercion, filtering, sorting,
//! view configs and the row presentation pipeline.
//!
//! Everything here is synchronous and free of I/O; the session crate wires it
//! to a backend.

pub mod coerce;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod pipeline;
pub mod schema;
pub mod sort;
pub mod types;
pub mod view;

pub use coerce::{display_text, filter_tokens, locale_cmp, parse_cell_input, sort_key, SortKey};
pub use config::GridSettings;
pub use error::GridError;
pub use export::{export_file_name, to_csv};
pub use filter::{filter_options, toggle_filter, FilterEvaluator, FilterState, EMPTY_SENTINEL};
pub use pipeline::{present, RowPresentation};
pub use schema::{Column, ColumnConfig, ColumnType, ColumnUpdate, ListSnapshot};
pub use sort::{NullPlacement, SortComparator, SortDirection, SortMode, SortState};
pub use types::{Item, Row, RowState, Value};
pub use view::{deserialize_filters, serialize_filters, SerializedFilters, View, ViewConfig, ViewType};
