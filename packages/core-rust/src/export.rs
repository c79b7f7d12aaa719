//! CSV export of displayed rows.

use crate::coerce::{display_text, format_number};
use crate::schema::{Column, ColumnType};
use crate::types::{Item, Value};

const RECORD_END: &str = "\r\n";

/// Renders items as CSV, one field per column in `position` order.
///
/// Rows are written in the order given, so passing the presented rows exports
/// exactly what the grid shows.
#[must_use]
pub fn to_csv<'a>(
    columns: &[Column],
    items: impl IntoIterator<Item = &'a Item>,
    include_header: bool,
) -> String {
    let mut ordered: Vec<&Column> = columns.iter().collect();
    ordered.sort_by_key(|c| c.position);

    let mut out = String::new();
    if include_header {
        write_record(&mut out, ordered.iter().map(|c| c.name.clone()));
    }
    for item in items {
        write_record(
            &mut out,
            ordered.iter().map(|c| {
                item.value(&c.id)
                    .map(|v| export_text(c.column_type, v))
                    .unwrap_or_default()
            }),
        );
    }
    out
}

fn write_record(out: &mut String, fields: impl Iterator<Item = String>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&quote_field(&field));
    }
    out.push_str(RECORD_END);
}

fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn export_text(column_type: ColumnType, value: &Value) -> String {
    match (column_type, value) {
        (ColumnType::Boolean, Value::Bool(b)) => (if *b { "True" } else { "False" }).to_string(),
        (t, v) if t.is_numeric() => v.as_f64().map(format_number).unwrap_or_default(),
        (t, v) => display_text(t, v),
    }
}

/// File name for an exported list: alphanumerics, spaces, `-` and `_` only.
#[must_use]
pub fn export_file_name(list_name: &str) -> String {
    let safe: String = list_name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    format!("{}.csv", safe.trim())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn writes_header_and_typed_values() {
        let mut price = Column::new("p", "Price", ColumnType::Currency);
        price.position = 1;
        let mut title = Column::new("t", "Title", ColumnType::Text);
        title.position = 0;
        let mut done = Column::new("d", "Done", ColumnType::Boolean);
        done.position = 2;
        let columns = vec![price, title, done];

        let items = vec![
            Item::new("1", "l1", Utc::now())
                .with_value("p", 10.0)
                .with_value("t", "Dune, Part \"One\"")
                .with_value("d", true),
            Item::new("2", "l1", Utc::now()).with_value("p", 2.5),
        ];
        let csv = to_csv(&columns, &items, true);
        assert_eq!(
            csv,
            "Title,Price,Done\r\n\"Dune, Part \"\"One\"\"\",10,True\r\n,2.5,\r\n"
        );
    }

    #[test]
    fn header_is_optional() {
        let columns = vec![Column::new("t", "Title", ColumnType::Text)];
        let items = vec![Item::new("1", "l1", Utc::now()).with_value("t", "line\nbreak")];
        assert_eq!(to_csv(&columns, &items, false), "\"line\nbreak\"\r\n");
    }

    #[test]
    fn file_name_is_sanitized() {
        assert_eq!(export_file_name(" Books/2024: read? "), "Books2024 read.csv");
    }
}
