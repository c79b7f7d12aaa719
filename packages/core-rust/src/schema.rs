//! Column definitions and the per-type configuration union.
//!
//! The backend stores column configuration as an untyped JSON bag. On the way
//! in it is split into a [`ColumnConfig`] variant chosen by the column type;
//! keys the engine does not understand are carried in `config_extra` so they
//! survive a round-trip.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as Json};

use crate::coerce::{filter_tokens, locale_cmp};
use crate::error::GridError;
use crate::types::{Item, Value};
use crate::view::View;

/// Type of a list column. Snake-case names match the backend enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Number,
    Currency,
    Date,
    Datetime,
    Choice,
    MultipleChoice,
    Boolean,
    Hyperlink,
    Image,
    Attachment,
    Rating,
    Person,
    Location,
}

impl ColumnType {
    /// Number, currency and rating cells hold numbers.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Number | Self::Currency | Self::Rating)
    }

    #[must_use]
    pub fn is_temporal(self) -> bool {
        matches!(self, Self::Date | Self::Datetime)
    }

    /// Columns whose config carries a `choices` list.
    #[must_use]
    pub fn has_choices(self) -> bool {
        matches!(self, Self::Choice | Self::MultipleChoice)
    }

    /// Wire name of the type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Currency => "currency",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Choice => "choice",
            Self::MultipleChoice => "multiple_choice",
            Self::Boolean => "boolean",
            Self::Hyperlink => "hyperlink",
            Self::Image => "image",
            Self::Attachment => "attachment",
            Self::Rating => "rating",
            Self::Person => "person",
            Self::Location => "location",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed column configuration, one variant per family of column types.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ColumnConfig {
    /// Types without engine-relevant configuration (image, attachment).
    #[default]
    None,
    Text {
        default_value: Option<String>,
    },
    Numeric {
        default_value: Option<f64>,
    },
    Date {
        default_value: Option<String>,
    },
    Boolean {
        default_value: Option<bool>,
    },
    Choice {
        choices: Vec<String>,
        default_value: Option<String>,
    },
}

const CHOICES_KEY: &str = "choices";
const DEFAULT_KEY: &str = "default_value";

impl ColumnConfig {
    /// Reads the typed config out of the backend's untyped bag.
    ///
    /// Keys of the wrong shape are ignored; the variant is chosen by
    /// `column_type` alone.
    #[must_use]
    pub fn from_wire(column_type: ColumnType, bag: Option<&JsonMap<String, Json>>) -> Self {
        let default = bag.and_then(|b| b.get(DEFAULT_KEY));
        let default_string = || {
            default
                .and_then(Json::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        match column_type {
            ColumnType::Choice | ColumnType::MultipleChoice => Self::Choice {
                choices: bag
                    .and_then(|b| b.get(CHOICES_KEY))
                    .and_then(Json::as_array)
                    .map(|arr| {
                        arr.iter()
                            .filter_map(Json::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
                default_value: default_string(),
            },
            t if t.is_numeric() => Self::Numeric {
                default_value: default.and_then(|d| match d {
                    Json::Number(n) => n.as_f64(),
                    Json::String(s) => s.trim().parse().ok(),
                    _ => None,
                }),
            },
            t if t.is_temporal() => Self::Date {
                default_value: default_string(),
            },
            ColumnType::Boolean => Self::Boolean {
                default_value: default.and_then(Json::as_bool),
            },
            ColumnType::Image | ColumnType::Attachment => Self::None,
            _ => Self::Text {
                default_value: default_string(),
            },
        }
    }

    /// Writes the typed fields back into a JSON bag.
    #[must_use]
    pub fn to_wire(&self) -> JsonMap<String, Json> {
        let mut bag = JsonMap::new();
        match self {
            Self::None => {}
            Self::Text { default_value } | Self::Date { default_value } => {
                if let Some(d) = default_value {
                    bag.insert(DEFAULT_KEY.to_string(), Json::String(d.clone()));
                }
            }
            Self::Numeric { default_value } => {
                if let Some(n) = default_value.and_then(serde_json::Number::from_f64) {
                    bag.insert(DEFAULT_KEY.to_string(), Json::Number(n));
                }
            }
            Self::Boolean { default_value } => {
                if let Some(b) = default_value {
                    bag.insert(DEFAULT_KEY.to_string(), Json::Bool(*b));
                }
            }
            Self::Choice {
                choices,
                default_value,
            } => {
                bag.insert(
                    CHOICES_KEY.to_string(),
                    Json::Array(choices.iter().cloned().map(Json::String).collect()),
                );
                if let Some(d) = default_value {
                    bag.insert(DEFAULT_KEY.to_string(), Json::String(d.clone()));
                }
            }
        }
        bag
    }

    /// Choice list, empty for non-choice configs.
    #[must_use]
    pub fn choices(&self) -> &[String] {
        match self {
            Self::Choice { choices, .. } => choices,
            _ => &[],
        }
    }

    /// Value a freshly created row starts with, if the column defines one.
    #[must_use]
    pub fn default_value(&self) -> Option<Value> {
        match self {
            Self::None => None,
            Self::Text { default_value }
            | Self::Date { default_value }
            | Self::Choice { default_value, .. } => default_value.clone().map(Value::String),
            Self::Numeric { default_value } => default_value.map(Value::Float),
            Self::Boolean { default_value } => default_value.map(Value::Bool),
        }
    }
}

/// A typed column of a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireColumn", into = "WireColumn")]
pub struct Column {
    pub id: String,
    pub list_id: String,
    pub name: String,
    pub column_type: ColumnType,
    pub position: i64,
    pub is_required: bool,
    pub config: ColumnConfig,
    /// Untyped config keys the engine does not interpret.
    pub config_extra: JsonMap<String, Json>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Column {
    /// Creates a column with the default config for its type.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        column_type: ColumnType,
    ) -> Self {
        Self {
            id: id.into(),
            list_id: String::new(),
            name: name.into(),
            column_type,
            position: 0,
            is_required: false,
            config: ColumnConfig::from_wire(column_type, None),
            config_extra: JsonMap::new(),
            created_at: None,
        }
    }

    /// Builder-style helper replacing the typed config.
    #[must_use]
    pub fn with_config(mut self, config: ColumnConfig) -> Self {
        self.config = config;
        self
    }

    /// The full config bag as the backend stores it, `None` when empty.
    #[must_use]
    pub fn wire_config(&self) -> Option<JsonMap<String, Json>> {
        let mut bag = self.config_extra.clone();
        bag.extend(self.config.to_wire());
        (!bag.is_empty()).then_some(bag)
    }

    /// Copy of a choice column with a new choice list.
    ///
    /// A default value that is no longer among the choices is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::NoChoices`] for columns that are not choice or
    /// multiple-choice.
    pub fn with_choices(&self, choices: Vec<String>) -> Result<Column, GridError> {
        if !self.column_type.has_choices() {
            return Err(GridError::NoChoices(self.id.clone()));
        }
        let default_value = match &self.config {
            ColumnConfig::Choice { default_value, .. } => default_value
                .as_ref()
                .filter(|d| choices.contains(d))
                .cloned(),
            _ => None,
        };
        let mut updated = self.clone();
        updated.config = ColumnConfig::Choice {
            choices,
            default_value,
        };
        Ok(updated)
    }

    /// One-way text → choice / multiple-choice migration.
    ///
    /// Seeds `choices` with the distinct non-empty values found in `items`
    /// (exploded on `,` when `target` is multiple-choice), ordered with
    /// [`locale_cmp`].
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidConversion`] unless the column is `text`
    /// and `target` is `choice` or `multiple_choice`.
    pub fn converted_to_choice<'a>(
        &self,
        target: ColumnType,
        items: impl IntoIterator<Item = &'a Item>,
    ) -> Result<Column, GridError> {
        if self.column_type != ColumnType::Text || !target.has_choices() {
            return Err(GridError::InvalidConversion {
                column_id: self.id.clone(),
                from: self.column_type,
                to: target,
            });
        }

        let mut distinct = BTreeSet::new();
        for item in items {
            if let Some(value) = item.value(&self.id) {
                distinct.extend(filter_tokens(target, value));
            }
        }
        let mut choices: Vec<String> = distinct.into_iter().collect();
        choices.sort_by(|a, b| locale_cmp(a, b));

        let mut converted = self.clone();
        converted.column_type = target;
        converted.config = ColumnConfig::Choice {
            choices,
            default_value: None,
        };
        Ok(converted)
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct WireColumn {
    id: String,
    #[serde(default)]
    list_id: String,
    name: String,
    column_type: ColumnType,
    #[serde(default)]
    position: i64,
    #[serde(default)]
    is_required: bool,
    #[serde(default)]
    config: Option<JsonMap<String, Json>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
}

impl From<WireColumn> for Column {
    fn from(wire: WireColumn) -> Self {
        let config = ColumnConfig::from_wire(wire.column_type, wire.config.as_ref());
        let mut config_extra = wire.config.unwrap_or_default();
        config_extra.remove(CHOICES_KEY);
        config_extra.remove(DEFAULT_KEY);
        Self {
            id: wire.id,
            list_id: wire.list_id,
            name: wire.name,
            column_type: wire.column_type,
            position: wire.position,
            is_required: wire.is_required,
            config,
            config_extra,
            created_at: wire.created_at.as_deref().and_then(crate::types::parse_utc),
        }
    }
}

impl From<Column> for WireColumn {
    fn from(column: Column) -> Self {
        let config = column.wire_config();
        Self {
            id: column.id,
            list_id: column.list_id,
            name: column.name,
            column_type: column.column_type,
            position: column.position,
            is_required: column.is_required,
            config,
            created_at: column.created_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Partial column update sent to the backend. Absent fields are untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_type: Option<ColumnType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<JsonMap<String, Json>>,
}

impl ColumnUpdate {
    #[must_use]
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Full replacement of a column's type and config, used after a conversion
    /// or a choices edit.
    #[must_use]
    pub fn retype(column: &Column) -> Self {
        Self {
            name: None,
            column_type: Some(column.column_type),
            config: Some(column.wire_config().unwrap_or_default()),
        }
    }
}

/// A list as the grid sees it: columns in display order plus its views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSnapshot {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub views: Vec<View>,
}

impl ListSnapshot {
    /// Sorts columns by `position`, keeping backend order for ties.
    pub fn normalize(&mut self) {
        self.columns.sort_by_key(|c| c.position);
    }

    /// The view flagged `is_default`, falling back to the first view.
    #[must_use]
    pub fn default_view(&self) -> Option<&View> {
        self.views
            .iter()
            .find(|v| v.is_default)
            .or_else(|| self.views.first())
    }

    #[must_use]
    pub fn view(&self, view_id: &str) -> Option<&View> {
        self.views.iter().find(|v| v.id == view_id)
    }

    #[must_use]
    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    /// Like [`Self::column`], failing with [`GridError::UnknownColumn`].
    ///
    /// # Errors
    ///
    /// Returns [`GridError::UnknownColumn`] when no column has `column_id`.
    pub fn require_column(&self, column_id: &str) -> Result<&Column, GridError> {
        self.column(column_id)
            .ok_or_else(|| GridError::UnknownColumn(column_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, col: &str, v: &str) -> Item {
        Item::new(id, "l1", Utc::now()).with_value(col, v)
    }

    #[test]
    fn column_deserializes_choice_config() {
        let json = r#"{
            "id": "c1", "list_id": "l1", "name": "Status",
            "column_type": "choice", "position": 2, "is_required": false,
            "config": {"choices": ["Todo", "Done", 3], "color": "red"},
            "created_at": "2024-01-01T00:00:00"
        }"#;
        let col: Column = serde_json::from_str(json).unwrap();
        assert_eq!(col.column_type, ColumnType::Choice);
        assert_eq!(col.config.choices(), ["Todo", "Done"]);
        assert_eq!(col.config_extra.get("color"), Some(&Json::from("red")));
        assert!(col.created_at.is_some());
    }

    #[test]
    fn column_serializes_config_bag_back() {
        let col = Column::new("c1", "Status", ColumnType::Choice).with_config(
            ColumnConfig::Choice {
                choices: vec!["A".to_string()],
                default_value: Some("A".to_string()),
            },
        );
        let json = serde_json::to_value(&col).unwrap();
        assert_eq!(json["config"]["choices"], serde_json::json!(["A"]));
        assert_eq!(json["config"]["default_value"], serde_json::json!("A"));
        assert_eq!(json["column_type"], serde_json::json!("choice"));
    }

    #[test]
    fn null_config_yields_type_default() {
        let json = r#"{"id": "c1", "name": "Price", "column_type": "currency", "config": null}"#;
        let col: Column = serde_json::from_str(json).unwrap();
        assert_eq!(col.config, ColumnConfig::Numeric { default_value: None });
        assert!(col.wire_config().is_none());
    }

    #[test]
    fn numeric_default_accepts_numeric_string() {
        let mut bag = JsonMap::new();
        bag.insert("default_value".to_string(), Json::from("2.5"));
        let config = ColumnConfig::from_wire(ColumnType::Number, Some(&bag));
        assert_eq!(config.default_value(), Some(Value::Float(2.5)));
    }

    #[test]
    fn text_to_choice_seeds_distinct_values() {
        let col = Column::new("c1", "Tag", ColumnType::Text);
        let items = [
            item("1", "c1", "beta"),
            item("2", "c1", "Alpha"),
            item("3", "c1", "beta"),
            item("4", "c1", ""),
        ];
        let converted = col.converted_to_choice(ColumnType::Choice, &items).unwrap();
        assert_eq!(converted.column_type, ColumnType::Choice);
        assert_eq!(converted.config.choices(), ["Alpha", "beta"]);
    }

    #[test]
    fn text_to_multiple_choice_explodes_values() {
        let col = Column::new("c1", "Tags", ColumnType::Text);
        let items = [item("1", "c1", "red, blue"), item("2", "c1", "blue,green")];
        let converted = col
            .converted_to_choice(ColumnType::MultipleChoice, &items)
            .unwrap();
        assert_eq!(converted.config.choices(), ["blue", "green", "red"]);
    }

    #[test]
    fn conversion_is_one_way() {
        let col = Column::new("c1", "Status", ColumnType::Choice);
        let err = col
            .converted_to_choice(ColumnType::MultipleChoice, std::iter::empty())
            .unwrap_err();
        assert!(matches!(err, GridError::InvalidConversion { .. }));

        let col = Column::new("c2", "Price", ColumnType::Number);
        assert!(col
            .converted_to_choice(ColumnType::Choice, std::iter::empty())
            .is_err());
    }

    #[test]
    fn with_choices_drops_stale_default() {
        let col = Column::new("c1", "Status", ColumnType::Choice).with_config(
            ColumnConfig::Choice {
                choices: vec!["A".to_string(), "B".to_string()],
                default_value: Some("A".to_string()),
            },
        );
        let updated = col.with_choices(vec!["B".to_string()]).unwrap();
        assert_eq!(updated.config.choices(), ["B"]);
        assert_eq!(updated.config.default_value(), None);

        let text = Column::new("c2", "Title", ColumnType::Text);
        assert_eq!(
            text.with_choices(Vec::new()).unwrap_err(),
            GridError::NoChoices("c2".to_string())
        );
    }

    #[test]
    fn require_column_reports_unknown_id() {
        let snapshot = ListSnapshot {
            id: "l1".to_string(),
            name: "Books".to_string(),
            columns: vec![Column::new("c1", "Title", ColumnType::Text)],
            views: Vec::new(),
        };
        assert!(snapshot.require_column("c1").is_ok());
        assert_eq!(
            snapshot.require_column("gone").unwrap_err(),
            GridError::UnknownColumn("gone".to_string())
        );
    }

    #[test]
    fn default_view_falls_back_to_first() {
        let snapshot = ListSnapshot {
            id: "l1".to_string(),
            name: "Books".to_string(),
            columns: Vec::new(),
            views: vec![View::new("v1", "l1", "Saved", false), View::new("v2", "l1", "Other", false)],
        };
        assert_eq!(snapshot.default_view().map(|v| v.id.as_str()), Some("v1"));
    }
}
