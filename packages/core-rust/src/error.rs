use crate::schema::ColumnType;

/// Errors raised by the pure grid engine.
///
/// Malformed stored values never surface here: coercion degrades them to
/// empty cells instead.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GridError {
    #[error("column {column_id} cannot be converted from {from} to {to}")]
    InvalidConversion {
        column_id: String,
        from: ColumnType,
        to: ColumnType,
    },
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("column {0} has no choices")]
    NoChoices(String),
}
