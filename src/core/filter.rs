//! Filter engine: per-column inclusion sets plus one sort order

use crate::error::FilterError;
use crate::types::{CellValue, Column, ColumnKind, Table};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info, warn};

/// Columns with fewer distinct values than this are filterable whatever
/// their type
pub const MAX_FILTER_DISTINCT: usize = 50;

/// Sort order: one column, ascending or descending
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    #[serde(default = "default_ascending")]
    pub ascending: bool,
}

fn default_ascending() -> bool {
    true
}

impl SortSpec {
    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn descending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }
}

/// Values of one column a row may hold to survive filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub column: String,
    pub selected: Vec<CellValue>,
}

impl ColumnFilter {
    pub fn new(column: impl Into<String>, selected: Vec<CellValue>) -> Self {
        Self {
            column: column.into(),
            selected,
        }
    }

    fn selects(&self, cell: &CellValue) -> bool {
        self.selected.iter().any(|s| cell.matches(s))
    }
}

/// What the UI offers for one filterable column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOption {
    pub column: String,
    pub kind: ColumnKind,
    pub values: Vec<CellValue>,
}

/// Text/mixed columns, and any column with few distinct values
pub fn is_filterable(column: &Column) -> bool {
    column.is_categorical() || column.distinct_count() < MAX_FILTER_DISTINCT
}

/// Filter choices for every filterable column with at least one value.
/// The default selection is all of `values`.
pub fn filter_options(raw: &Table) -> Vec<FilterOption> {
    raw.columns
        .iter()
        .filter(|column| is_filterable(column))
        .map(|column| FilterOption {
            column: column.name.clone(),
            kind: column.kind(),
            values: column.distinct_values(),
        })
        .filter(|option| !option.values.is_empty())
        .collect()
}

/// Row predicates then sort, over the raw table.
///
/// A selection that still covers every distinct value of its column leaves
/// the column unfiltered, missing cells included. Once narrowed, rows with
/// a missing cell in that column are dropped.
pub fn apply_filters(
    raw: &Table,
    filters: &[ColumnFilter],
    sort: Option<&SortSpec>,
) -> Result<Table, FilterError> {
    let mut keep: Vec<usize> = (0..raw.row_count()).collect();

    for filter in filters {
        let column = raw
            .column(&filter.column)
            .ok_or_else(|| FilterError::UnknownColumn(filter.column.clone()))?;

        if !is_filterable(column) {
            warn!(column = %column.name, "ignoring filter on high-cardinality column");
            continue;
        }

        let covers_all = column
            .distinct_values()
            .iter()
            .all(|value| filter.selects(value));
        if covers_all {
            continue;
        }

        let before = keep.len();
        keep.retain(|&row| filter.selects(&column.values[row]));
        debug!(column = %column.name, before, after = keep.len(), "applied column filter");
    }

    if let Some(spec) = sort {
        let column = raw
            .column(&spec.column)
            .ok_or_else(|| FilterError::UnknownSortColumn(spec.column.clone()))?;
        // Vec::sort_by is stable: ties keep their original order
        keep.sort_by(|&a, &b| sort_cmp(&column.values[a], &column.values[b], spec.ascending));
    }

    let filtered = raw.take_rows(&keep);
    info!(
        rows = filtered.row_count(),
        of = raw.row_count(),
        sort = ?sort.map(|s| &s.column),
        "filtered table"
    );
    Ok(filtered)
}

/// Missing values sort last in both directions
fn sort_cmp(a: &CellValue, b: &CellValue, ascending: bool) -> Ordering {
    match (a.is_missing(), b.is_missing()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = a.natural_cmp(b);
            if ascending {
                ord
            } else {
                ord.reverse()
            }
        }
    }
}
