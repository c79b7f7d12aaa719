//! Column-type-aware row ordering and header-click direction cycling.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::coerce::{sort_key, SortKey};
use crate::schema::{Column, ColumnType};
use crate::types::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Where rows without a sort key go. Direction does not affect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullPlacement {
    Top,
    #[default]
    Bottom,
}

/// Header-click cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    /// asc → desc → asc
    TwoState,
    /// asc → desc → unsorted → asc
    ThreeState,
}

/// Active sort column and direction. A column without a direction is unsorted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortState {
    pub column: Option<String>,
    pub direction: Option<SortDirection>,
}

impl SortState {
    #[must_use]
    pub fn unsorted() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn by(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: Some(column.into()),
            direction: Some(direction),
        }
    }

    /// The sorted column and direction, if both are set.
    #[must_use]
    pub fn active(&self) -> Option<(&str, SortDirection)> {
        match (&self.column, self.direction) {
            (Some(column), Some(direction)) => Some((column.as_str(), direction)),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.active().is_some()
    }

    /// State after a click on `column_id`'s header.
    #[must_use]
    pub fn cycle(&self, column_id: &str, mode: SortMode) -> Self {
        match self.active() {
            Some((current, SortDirection::Asc)) if current == column_id => {
                Self::by(column_id, SortDirection::Desc)
            }
            Some((current, SortDirection::Desc)) if current == column_id => match mode {
                SortMode::TwoState => Self::by(column_id, SortDirection::Asc),
                SortMode::ThreeState => Self::unsorted(),
            },
            _ => Self::by(column_id, SortDirection::Asc),
        }
    }
}

/// Comparator for one sort state over one column set.
#[derive(Debug, Clone)]
pub struct SortComparator {
    target: Option<(String, ColumnType, SortDirection)>,
    nulls: NullPlacement,
}

impl SortComparator {
    /// An unsorted state or an unknown column yields the identity order.
    #[must_use]
    pub fn new(columns: &[Column], state: &SortState, nulls: NullPlacement) -> Self {
        let target = state.active().and_then(|(column_id, direction)| {
            columns
                .iter()
                .find(|c| c.id == column_id)
                .map(|c| (c.id.clone(), c.column_type, direction))
        });
        Self { target, nulls }
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.target.is_none()
    }

    fn key(&self, row: &Row) -> SortKey {
        match &self.target {
            Some((column_id, column_type, _)) => row
                .item
                .value(column_id)
                .map_or(SortKey::Null, |v| sort_key(*column_type, v)),
            None => SortKey::Null,
        }
    }

    #[must_use]
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let Some((_, _, direction)) = &self.target else {
            return Ordering::Equal;
        };
        self.compare_keys(&self.key(a), &self.key(b), *direction)
    }

    fn compare_keys(&self, a: &SortKey, b: &SortKey, direction: SortDirection) -> Ordering {
        let null_first = match self.nulls {
            NullPlacement::Top => Ordering::Less,
            NullPlacement::Bottom => Ordering::Greater,
        };
        match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => null_first,
            (false, true) => null_first.reverse(),
            (false, false) => {
                let ord = a.compare(b);
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            }
        }
    }

    /// Stable sort: rows with equal keys keep their relative order.
    pub fn sort(&self, rows: &mut [&Row]) {
        if self.is_identity() {
            return;
        }
        let mut keyed: Vec<(SortKey, &Row)> = rows.iter().map(|r| (self.key(r), *r)).collect();
        let direction = self
            .target
            .as_ref()
            .map_or(SortDirection::Asc, |(_, _, d)| *d);
        keyed.sort_by(|(a, _), (b, _)| self.compare_keys(a, b, direction));
        for (slot, (_, row)) in rows.iter_mut().zip(keyed) {
            *slot = row;
        }
    }
}
