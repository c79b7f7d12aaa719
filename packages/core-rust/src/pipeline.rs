//! Row presentation: filter, partition, sort, concatenate.
//!
//! The displayed sequence is always `[sorted normal rows, pending rows,
//! deleted rows]`. Rows that were just created stay pinned under the sorted
//! block until their first edit; soft-deleted rows are always last.

use tracing::debug;

use crate::config::GridSettings;
use crate::filter::{FilterEvaluator, FilterState};
use crate::schema::Column;
use crate::sort::{SortComparator, SortState};
use crate::types::Row;

/// Computes the displayed rows. Pure; pending and deleted rows keep input order.
#[must_use]
pub fn present<'r>(
    rows: &'r [Row],
    columns: &[Column],
    filters: &FilterState,
    query: &str,
    sort: &SortState,
    settings: &GridSettings,
) -> Vec<&'r Row> {
    present_indices(rows, columns, filters, query, sort, settings)
        .into_iter()
        .map(|i| &rows[i])
        .collect()
}

fn present_indices(
    rows: &[Row],
    columns: &[Column],
    filters: &FilterState,
    query: &str,
    sort: &SortState,
    settings: &GridSettings,
) -> Vec<usize> {
    let evaluator = FilterEvaluator::new(columns, filters, query);

    let mut normal = Vec::new();
    let mut pending = Vec::new();
    let mut deleted = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        if !evaluator.matches(&row.item) {
            continue;
        }
        if row.item.is_deleted() {
            if settings.show_deleted_rows {
                deleted.push(index);
            }
        } else if row.is_pending() {
            pending.push(index);
        } else {
            normal.push(index);
        }
    }

    let comparator = SortComparator::new(columns, sort, settings.unknown_sort_position);
    if !comparator.is_identity() {
        // Stable, so equal keys keep input order.
        normal.sort_by(|a, b| comparator.compare(&rows[*a], &rows[*b]));
    }

    debug!(
        total = rows.len(),
        normal = normal.len(),
        pending = pending.len(),
        deleted = deleted.len(),
        "presented rows"
    );

    normal.extend(pending);
    normal.extend(deleted);
    normal
}

/// Memo of the last presented sequence.
///
/// The caller bumps its revision whenever rows, columns, filters, query, sort
/// or settings change; an unchanged revision reuses the previous result.
#[derive(Debug, Default)]
pub struct RowPresentation {
    revision: Option<u64>,
    indices: Vec<usize>,
}

impl RowPresentation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Displayed rows for `revision`, recomputing only on a new revision.
    #[allow(clippy::too_many_arguments)]
    pub fn rows<'r>(
        &mut self,
        revision: u64,
        rows: &'r [Row],
        columns: &[Column],
        filters: &FilterState,
        query: &str,
        sort: &SortState,
        settings: &GridSettings,
    ) -> Vec<&'r Row> {
        if self.revision != Some(revision) {
            self.indices = present_indices(rows, columns, filters, query, sort, settings);
            self.revision = Some(revision);
        }
        self.indices.iter().filter_map(|i| rows.get(*i)).collect()
    }

    /// Forces the next call to recompute.
    pub fn invalidate(&mut self) {
        self.revision = None;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::schema::ColumnType;
    use crate::sort::SortDirection;
    use crate::types::{Item, Value};

    fn columns() -> Vec<Column> {
        vec![
            Column::new("price", "Price", ColumnType::Currency),
            Column::new("title", "Title", ColumnType::Text),
        ]
    }

    fn row(id: &str, price: Option<i64>) -> Row {
        let item = Item::new(id, "l1", Utc::now());
        Row::persisted(match price {
            Some(p) => item.with_value("price", p),
            None => item,
        })
    }

    fn ids<'r>(rows: &[&'r Row]) -> Vec<&'r str> {
        rows.iter().map(|r| r.id()).collect()
    }

    fn by_price() -> SortState {
        SortState::by("price", SortDirection::Asc)
    }

    #[test]
    fn pending_row_stays_last_until_edited() {
        let cols = columns();
        let settings = GridSettings::default();
        let mut rows = vec![row("a", Some(10)), row("b", Some(5))];
        rows.push(Row::pending(Item::new("new", "l1", Utc::now())));

        let shown = present(&rows, &cols, &FilterState::new(), "", &by_price(), &settings);
        assert_eq!(ids(&shown), ["b", "a", "new"]);

        rows[2].item.values.insert("price".to_string(), Value::Int(1));
        rows[2].mark_persisted();
        let shown = present(&rows, &cols, &FilterState::new(), "", &by_price(), &settings);
        assert_eq!(ids(&shown), ["new", "b", "a"]);
    }

    #[test]
    fn deleted_rows_go_last_and_win_over_pending() {
        let cols = columns();
        let mut deleted = row("gone", Some(1));
        deleted.item.deleted_at = Some(Utc::now());
        let mut deleted_pending = Row::pending(Item::new("gone-new", "l1", Utc::now()));
        deleted_pending.item.deleted_at = Some(Utc::now());
        let rows = vec![
            deleted,
            Row::pending(Item::new("new", "l1", Utc::now())),
            row("a", Some(3)),
            deleted_pending,
            row("b", Some(2)),
        ];

        let settings = GridSettings::default();
        let shown = present(&rows, &cols, &FilterState::new(), "", &by_price(), &settings);
        assert_eq!(ids(&shown), ["b", "a", "new", "gone", "gone-new"]);

        let hidden = GridSettings {
            show_deleted_rows: false,
            ..GridSettings::default()
        };
        let shown = present(&rows, &cols, &FilterState::new(), "", &by_price(), &hidden);
        assert_eq!(ids(&shown), ["b", "a", "new"]);
    }

    #[test]
    fn filter_applies_to_every_partition() {
        let cols = columns();
        let mut filters = FilterState::new();
        filters.insert("price".to_string(), ["10".to_string()].into());
        let rows = vec![
            row("a", Some(10)),
            Row::pending(Item::new("new", "l1", Utc::now())),
            row("b", Some(5)),
        ];
        let shown = present(
            &rows,
            &cols,
            &filters,
            "",
            &SortState::unsorted(),
            &GridSettings::default(),
        );
        assert_eq!(ids(&shown), ["a"]);
    }

    #[test]
    fn memo_reuses_result_for_same_revision() {
        let cols = columns();
        let settings = GridSettings::default();
        let filters = FilterState::new();
        let rows = vec![row("a", Some(2)), row("b", Some(1))];
        let mut memo = RowPresentation::new();

        let first = memo.rows(1, &rows, &cols, &filters, "", &by_price(), &settings);
        assert_eq!(ids(&first), ["b", "a"]);

        let stale = memo.rows(1, &rows, &cols, &filters, "", &SortState::unsorted(), &settings);
        assert_eq!(ids(&stale), ["b", "a"]);

        let fresh = memo.rows(2, &rows, &cols, &filters, "", &SortState::unsorted(), &settings);
        assert_eq!(ids(&fresh), ["a", "b"]);

        memo.invalidate();
        let again = memo.rows(2, &rows, &cols, &filters, "", &by_price(), &settings);
        assert_eq!(ids(&again), ["b", "a"]);
    }
}
