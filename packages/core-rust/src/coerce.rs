//! Per-column-type value coercion.
//!
//! Every stored cell goes through this module before it is compared, filtered
//! or rendered. Coercion never fails: values that do not fit the column type
//! degrade to [`SortKey::Null`] or to no filter tokens.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::schema::ColumnType;
use crate::types::Value;

/// Comparable projection of a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    /// Missing, empty or uncoercible. Placed by the null-placement policy.
    Null,
    Number(f64),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    Text(String),
}

impl SortKey {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Orders two keys of the same column.
    ///
    /// Nulls compare equal to each other and greater than everything else;
    /// callers that honor a null-placement policy handle nulls before calling
    /// this. Mixed variants fall back to a fixed variant rank.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => locale_cmp(a, b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Timestamp(_) => 1,
            Self::Text(_) => 2,
            Self::Null => 3,
        }
    }
}

/// Sortable key for a cell of the given column type.
#[must_use]
pub fn sort_key(column_type: ColumnType, value: &Value) -> SortKey {
    if value.is_empty_cell() {
        return SortKey::Null;
    }
    match column_type {
        t if t.is_numeric() => value.as_f64().map_or(SortKey::Null, SortKey::Number),
        ColumnType::Boolean => match value {
            Value::Bool(b) => SortKey::Number(if *b { 1.0 } else { 0.0 }),
            Value::String(s) if s.eq_ignore_ascii_case("true") => SortKey::Number(1.0),
            Value::String(s) if s.eq_ignore_ascii_case("false") => SortKey::Number(0.0),
            _ => SortKey::Null,
        },
        t if t.is_temporal() => match value {
            Value::String(s) => parse_timestamp(s)
                .map_or(SortKey::Null, |dt| SortKey::Timestamp(dt.timestamp_millis())),
            _ => SortKey::Null,
        },
        _ => {
            let text = display_text(column_type, value);
            if text.is_empty() {
                SortKey::Null
            } else {
                SortKey::Text(text)
            }
        }
    }
}

/// Strings a filter compares against. An empty cell yields no tokens.
#[must_use]
pub fn filter_tokens(column_type: ColumnType, value: &Value) -> Vec<String> {
    if value.is_empty_cell() {
        return Vec::new();
    }
    match column_type {
        ColumnType::Boolean => vec![yes_no(is_truthy(value)).to_string()],
        ColumnType::MultipleChoice => {
            let mut tokens = Vec::new();
            explode_into(value, &mut tokens);
            tokens
        }
        _ => {
            let text = display_text(column_type, value);
            if text.is_empty() {
                Vec::new()
            } else {
                vec![text]
            }
        }
    }
}

fn explode_into(value: &Value, tokens: &mut Vec<String>) {
    match value {
        Value::Array(items) => {
            for item in items {
                explode_into(item, tokens);
            }
        }
        other => tokens.extend(
            raw_text(other)
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        ),
    }
}

/// Text the grid renders for a cell; what free-text search looks at.
#[must_use]
pub fn display_text(column_type: ColumnType, value: &Value) -> String {
    match (column_type, value) {
        (_, Value::Null) => String::new(),
        (ColumnType::Boolean, v) => yes_no(is_truthy(v)).to_string(),
        (ColumnType::MultipleChoice, Value::Array(items)) => items
            .iter()
            .map(raw_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        (_, v) => raw_text(v),
    }
}

/// Column-type-independent rendering of a value.
fn raw_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format_number(*f),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(raw_text).collect::<Vec<_>>().join(", "),
        Value::Map(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "Yes"
    } else {
        "No"
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0 && !f.is_nan(),
        Value::String(s) => !(s.is_empty() || s.eq_ignore_ascii_case("false") || s == "0"),
        Value::Array(_) | Value::Map(_) => true,
    }
}

/// Formats a number without a trailing `.0` for integral values.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        let whole = n as i64;
        whole.to_string()
    } else {
        n.to_string()
    }
}

/// Parses a stored date or datetime. Naive forms are taken as UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Case-insensitive string order with lowercase sorting first on ties.
#[must_use]
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| {
            a.chars()
                .map(char::is_uppercase)
                .cmp(b.chars().map(char::is_uppercase))
        })
        .then_with(|| a.cmp(b))
}

/// Converts raw editor input into a typed cell value.
#[must_use]
pub fn parse_cell_input(column_type: ColumnType, raw: &str) -> Value {
    let trimmed = raw.trim();
    match column_type {
        ColumnType::Boolean => Value::Bool(trimmed == "true"),
        t if t.is_numeric() => trimmed
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map_or(Value::Null, Value::Float),
        _ if trimmed.is_empty() => Value::Null,
        _ => Value::String(raw.to_string()),
    }
}
