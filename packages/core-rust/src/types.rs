use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Runtime value stored in a list cell.
///
/// Supports every JSON-compatible shape the backend may hand back. Serialized
/// untagged so the wire format is plain JSON (`null`, `true`, `12`, `"x"`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// JSON null. Also the value of an absent key.
    #[default]
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON integer (signed 64-bit).
    Int(i64),
    /// JSON floating-point (64-bit IEEE 754).
    Float(f64),
    /// JSON string (UTF-8).
    String(String),
    /// JSON array. Multiple-choice cells may arrive in this shape.
    Array(Vec<Value>),
    /// JSON object. Uses `BTreeMap` for deterministic serialization order.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns `true` for the values the grid renders as an empty cell.
    ///
    /// Only `Null` and the empty string qualify: `false` and `0` are real values.
    #[must_use]
    pub fn is_empty_cell(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Numeric view of the value, accepting numeric strings the way a form
    /// input would. Non-finite results are rejected.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        let n = match self {
            #[allow(clippy::cast_precision_loss)]
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        n.is_finite().then_some(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Parses a backend timestamp, accepting both RFC 3339 and the naive
/// `YYYY-MM-DDTHH:MM:SS[.f]` form (interpreted as UTC).
#[must_use]
pub fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_utc<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_utc(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

fn deserialize_opt_utc<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_utc(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
    }
}

/// A single row of a list.
///
/// `values` is sparse: a column without an entry is an empty cell.
/// `deleted_at` marks a soft-deleted row that lives in the recycle bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub list_id: String,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
    #[serde(deserialize_with = "deserialize_utc")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_utc")]
    pub updated_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_opt_utc"
    )]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Creates a live item with no values, stamped with `now`.
    #[must_use]
    pub fn new(id: impl Into<String>, list_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            list_id: list_id.into(),
            position: None,
            values: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Builder-style helper setting one cell.
    #[must_use]
    pub fn with_value(mut self, column_id: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column_id.into(), value.into());
        self
    }

    /// Returns the cell for a column, or `None` when the row has no entry.
    #[must_use]
    pub fn value(&self, column_id: &str) -> Option<&Value> {
        self.values.get(column_id)
    }

    /// Whether the row sits in the recycle bin.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Lifecycle of a row inside a grid session.
///
/// A row created in this session stays `PendingFirstEdit` (pinned under the
/// sorted rows) until its first value edit or an explicit commit. The
/// transition is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowState {
    #[default]
    Persisted,
    PendingFirstEdit,
}

/// An item paired with its session lifecycle state.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub item: Item,
    pub state: RowState,
}

impl Row {
    /// Wraps an item loaded from the backend.
    #[must_use]
    pub fn persisted(item: Item) -> Self {
        Self {
            item,
            state: RowState::Persisted,
        }
    }

    /// Wraps an item created during this session.
    #[must_use]
    pub fn pending(item: Item) -> Self {
        Self {
            item,
            state: RowState::PendingFirstEdit,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.item.id
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state == RowState::PendingFirstEdit
    }

    /// Moves the row out of the pending partition. Idempotent.
    pub fn mark_persisted(&mut self) {
        self.state = RowState::Persisted;
    }
}
