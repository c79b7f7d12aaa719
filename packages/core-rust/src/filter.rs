//! Filter evaluator: free-text search combined with per-column value filters.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::debug;

use crate::coerce::{display_text, filter_tokens, locale_cmp};
use crate::schema::{Column, ColumnType};
use crate::types::{Item, Row};

/// Accepted values per column id.
pub type FilterState = BTreeMap<String, BTreeSet<String>>;

/// Accepted value matching rows whose cell is empty.
pub const EMPTY_SENTINEL: &str = "__empty__";

struct ColumnFilter {
    column_id: String,
    column_type: ColumnType,
    accepted: HashSet<String>,
    accepts_empty: bool,
}

/// Row predicate built once per recomputation.
///
/// A row passes iff the query matches some column's display text and, for
/// every filtered column, one of the row's tokens is accepted (or the cell is
/// empty and [`EMPTY_SENTINEL`] is accepted). Several values accepted on one
/// column are OR-ed; separate columns are AND-ed.
pub struct FilterEvaluator<'a> {
    columns: &'a [Column],
    query: String,
    filters: Vec<ColumnFilter>,
}

impl<'a> FilterEvaluator<'a> {
    /// Filters naming unknown columns and empty accepted sets are ignored.
    #[must_use]
    pub fn new(columns: &'a [Column], filters: &FilterState, query: &str) -> Self {
        let filters = filters
            .iter()
            .filter(|(_, accepted)| !accepted.is_empty())
            .filter_map(|(column_id, accepted)| {
                let Some(column) = columns.iter().find(|c| &c.id == column_id) else {
                    debug!(column = %column_id, "filter on unknown column ignored");
                    return None;
                };
                Some(ColumnFilter {
                    column_id: column_id.clone(),
                    column_type: column.column_type,
                    accepted: accepted
                        .iter()
                        .filter(|v| v.as_str() != EMPTY_SENTINEL)
                        .map(|v| v.to_lowercase())
                        .collect(),
                    accepts_empty: accepted.contains(EMPTY_SENTINEL),
                })
            })
            .collect();

        Self {
            columns,
            query: query.trim().to_lowercase(),
            filters,
        }
    }

    /// Whether the evaluator rejects anything at all.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.query.is_empty() || !self.filters.is_empty()
    }

    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        self.matches_query(item) && self.filters.iter().all(|f| f.matches(item))
    }

    fn matches_query(&self, item: &Item) -> bool {
        if self.query.is_empty() {
            return true;
        }
        self.columns.iter().any(|column| {
            item.value(&column.id).is_some_and(|v| {
                display_text(column.column_type, v)
                    .to_lowercase()
                    .contains(&self.query)
            })
        })
    }

    /// Keeps the matching rows in input order.
    #[must_use]
    pub fn apply<'r>(&self, rows: &'r [Row]) -> Vec<&'r Row> {
        rows.iter().filter(|row| self.matches(&row.item)).collect()
    }
}

impl ColumnFilter {
    fn matches(&self, item: &Item) -> bool {
        let tokens = item
            .value(&self.column_id)
            .map(|v| filter_tokens(self.column_type, v))
            .unwrap_or_default();
        if tokens.is_empty() {
            return self.accepts_empty;
        }
        tokens
            .iter()
            .any(|t| self.accepted.contains(&t.to_lowercase()))
    }
}

/// Adds `value` to a column's accepted set, or removes it when present.
/// A column whose set becomes empty is dropped.
pub fn toggle_filter(filters: &mut FilterState, column_id: &str, value: &str) {
    let accepted = filters.entry(column_id.to_string()).or_default();
    if !accepted.remove(value) {
        accepted.insert(value.to_string());
    }
    if accepted.is_empty() {
        filters.remove(column_id);
    }
}

/// Distinct filter values per column, as offered by a filter panel.
///
/// [`EMPTY_SENTINEL`] comes first when some item has an empty cell; the rest
/// follow in [`locale_cmp`] order. Choice columns also list configured choices
/// no item uses yet.
#[must_use]
pub fn filter_options<'a>(
    columns: &[Column],
    items: impl IntoIterator<Item = &'a Item>,
) -> BTreeMap<String, Vec<String>> {
    let mut seen: BTreeMap<&str, (bool, BTreeSet<String>)> = columns
        .iter()
        .map(|c| {
            (
                c.id.as_str(),
                (false, c.config.choices().iter().cloned().collect()),
            )
        })
        .collect();

    for item in items {
        for column in columns {
            let Some((has_empty, values)) = seen.get_mut(column.id.as_str()) else {
                continue;
            };
            let tokens = item
                .value(&column.id)
                .map(|v| filter_tokens(column.column_type, v))
                .unwrap_or_default();
            if tokens.is_empty() {
                *has_empty = true;
            }
            values.extend(tokens);
        }
    }

    seen.into_iter()
        .map(|(column_id, (has_empty, values))| {
            let mut options: Vec<String> = values.into_iter().collect();
            options.sort_by(|a, b| locale_cmp(a, b));
            if has_empty {
                options.insert(0, EMPTY_SENTINEL.to_string());
            }
            (column_id.to_string(), options)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;

    use super::*;
    use crate::schema::ColumnConfig;
    use crate::types::Value;

    fn status_column() -> Column {
        Column::new("status", "Status", ColumnType::Choice).with_config(ColumnConfig::Choice {
            choices: vec!["Todo".to_string(), "Done".to_string()],
            default_value: None,
        })
    }

    fn columns() -> Vec<Column> {
        vec![
            status_column(),
            Column::new("tags", "Tags", ColumnType::MultipleChoice),
            Column::new("title", "Title", ColumnType::Text),
        ]
    }

    fn row(id: &str, values: &[(&str, Value)]) -> Row {
        let mut item = Item::new(id, "l1", Utc::now());
        for (column, value) in values {
            item.values.insert((*column).to_string(), value.clone());
        }
        Row::persisted(item)
    }

    fn accept(pairs: &[(&str, &[&str])]) -> FilterState {
        pairs
            .iter()
            .map(|(c, vs)| {
                (
                    (*c).to_string(),
                    vs.iter().map(|v| (*v).to_string()).collect(),
                )
            })
            .collect()
    }

    fn ids<'r>(rows: &[&'r Row]) -> Vec<&'r str> {
        rows.iter().map(|r| r.id()).collect()
    }

    #[test]
    fn status_scenario_selects_done_only() {
        let rows = vec![
            row("1", &[("status", Value::from("Todo"))]),
            row("2", &[("status", Value::from("Done"))]),
            row("3", &[("status", Value::Null)]),
        ];
        let cols = columns();
        let evaluator = FilterEvaluator::new(&cols, &accept(&[("status", &["Done"])]), "");
        assert_eq!(ids(&evaluator.apply(&rows)), ["2"]);
    }

    #[test]
    fn empty_sentinel_matches_missing_and_null() {
        let rows = vec![
            row("1", &[("status", Value::from("Todo"))]),
            row("2", &[]),
            row("3", &[("status", Value::from(""))]),
        ];
        let cols = columns();
        let evaluator =
            FilterEvaluator::new(&cols, &accept(&[("status", &[EMPTY_SENTINEL])]), "");
        assert_eq!(ids(&evaluator.apply(&rows)), ["2", "3"]);
    }

    #[test]
    fn or_within_column_and_across_columns() {
        let rows = vec![
            row(
                "1",
                &[
                    ("tags", Value::from("red, blue")),
                    ("status", Value::from("Todo")),
                ],
            ),
            row(
                "2",
                &[
                    ("tags", Value::from("green")),
                    ("status", Value::from("Todo")),
                ],
            ),
            row(
                "3",
                &[
                    ("tags", Value::from("blue")),
                    ("status", Value::from("Done")),
                ],
            ),
        ];
        let cols = columns();
        let filters = accept(&[("tags", &["blue", "green"]), ("status", &["Todo"])]);
        let evaluator = FilterEvaluator::new(&cols, &filters, "");
        assert_eq!(ids(&evaluator.apply(&rows)), ["1", "2"]);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let rows = vec![row("1", &[("status", Value::from("done"))])];
        let cols = columns();
        let evaluator = FilterEvaluator::new(&cols, &accept(&[("status", &["Done"])]), "");
        assert_eq!(evaluator.apply(&rows).len(), 1);
    }

    #[test]
    fn query_searches_display_text() {
        let rows = vec![
            row("1", &[("title", Value::from("Dune"))]),
            row("2", &[("title", Value::from("Emma"))]),
        ];
        let cols = columns();
        let evaluator = FilterEvaluator::new(&cols, &FilterState::new(), "  dUN ");
        assert_eq!(ids(&evaluator.apply(&rows)), ["1"]);
        assert!(evaluator.is_active());

        let evaluator = FilterEvaluator::new(&cols, &FilterState::new(), "   ");
        assert_eq!(evaluator.apply(&rows).len(), 2);
        assert!(!evaluator.is_active());
    }

    #[test]
    fn unknown_columns_and_empty_sets_are_ignored() {
        let rows = vec![row("1", &[])];
        let cols = columns();
        let filters = accept(&[("deleted", &["x"]), ("status", &[])]);
        let evaluator = FilterEvaluator::new(&cols, &filters, "");
        assert_eq!(evaluator.apply(&rows).len(), 1);
    }

    #[test]
    fn toggle_adds_and_removes() {
        let mut filters = FilterState::new();
        toggle_filter(&mut filters, "status", "Done");
        assert!(filters["status"].contains("Done"));
        toggle_filter(&mut filters, "status", "Todo");
        toggle_filter(&mut filters, "status", "Done");
        assert_eq!(filters["status"].len(), 1);
        toggle_filter(&mut filters, "status", "Todo");
        assert!(filters.is_empty());
    }

    #[test]
    fn options_list_empty_first() {
        let cols = columns();
        let rows = [
            row("1", &[("tags", Value::from("b, A")), ("status", Value::from("Done"))]),
            row("2", &[("title", Value::from("x"))]),
        ];
        let options = filter_options(&cols, rows.iter().map(|r| &r.item));
        assert_eq!(options["tags"], [EMPTY_SENTINEL, "A", "b"]);
        assert_eq!(options["status"], [EMPTY_SENTINEL, "Done", "Todo"]);
        assert_eq!(options["title"], [EMPTY_SENTINEL, "x"]);
    }

    fn arb_rows() -> impl Strategy<Value = Vec<Row>> {
        let cell = prop_oneof![
            Just(Value::Null),
            Just(Value::from("Todo")),
            Just(Value::from("Done")),
            Just(Value::from("")),
        ];
        prop::collection::vec((cell.clone(), cell), 0..20).prop_map(|cells| {
            cells
                .into_iter()
                .enumerate()
                .map(|(i, (status, title))| {
                    row(&i.to_string(), &[("status", status), ("title", title)])
                })
                .collect()
        })
    }

    fn arb_filters() -> impl Strategy<Value = FilterState> {
        prop::collection::btree_set(
            prop_oneof![Just("Todo"), Just("Done"), Just(EMPTY_SENTINEL)],
            0..3,
        )
        .prop_map(|set| {
            let mut filters = FilterState::new();
            filters.insert(
                "status".to_string(),
                set.into_iter().map(str::to_string).collect(),
            );
            filters
        })
    }

    proptest! {
        #[test]
        fn filter_is_order_preserving_subsequence(
            rows in arb_rows(),
            filters in arb_filters(),
            query in "[a-zA-Z]{0,2}",
        ) {
            let cols = columns();
            let out = FilterEvaluator::new(&cols, &filters, &query).apply(&rows);
            let mut cursor = rows.iter();
            for kept in &out {
                prop_assert!(cursor.any(|r| std::ptr::eq(r, *kept)));
            }
        }

        #[test]
        fn filter_is_idempotent(rows in arb_rows(), filters in arb_filters()) {
            let cols = columns();
            let evaluator = FilterEvaluator::new(&cols, &filters, "");
            let once: Vec<Row> = evaluator.apply(&rows).into_iter().cloned().collect();
            let twice = evaluator.apply(&once);
            prop_assert_eq!(ids(&twice), once.iter().map(Row::id).collect::<Vec<_>>());
        }
    }
}
