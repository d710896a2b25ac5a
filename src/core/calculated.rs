//! Calculated-table state: derived columns survive re-filtering
//!
//! After every filter pass, columns that exist in the previous calculated
//! table but not in the new filtered table are reattached. The default
//! carry-over is by row position, which misaligns derived values whenever
//! the filter pass changed row order or count. `CarryOver::RowIdentity`
//! follows each row's id instead.

use crate::types::{CellValue, Column, Table};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// How derived columns are reattached after a filter pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarryOver {
    /// Row i of the new table gets row i of the previous one
    #[default]
    Positional,
    /// Each row gets the value derived for the same source row, if any
    RowIdentity,
}

impl std::str::FromStr for CarryOver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positional" => Ok(CarryOver::Positional),
            "row_identity" | "row-identity" => Ok(CarryOver::RowIdentity),
            other => Err(format!(
                "unknown carry-over mode '{}' (expected positional or row_identity)",
                other
            )),
        }
    }
}

/// For each derived column, the row id every value was computed for,
/// position by position
pub type RowOrigins = HashMap<String, Vec<usize>>;

/// Result of merging a filter pass with the previous calculated table
#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    pub table: Table,
    /// Names of the reattached columns
    pub carried: Vec<String>,
    /// Origins of the reattached columns in the new table
    pub origins: RowOrigins,
    /// Some reattached value sits on a row other than the one it was
    /// derived for
    pub misaligned: bool,
}

/// Whether any derived column holds values computed for other rows
pub fn is_misaligned(table: &Table, origins: &RowOrigins) -> bool {
    origins.values().any(|origin| *origin != table.row_ids)
}

/// Reattach the previous table's extra columns onto `filtered`.
///
/// Reattached columns always have the filtered table's row count: rows with
/// no counterpart get `Missing`, surplus previous rows are dropped. A column
/// missing from `origins` is taken to match the previous table's rows.
pub fn merge_derived(
    filtered: Table,
    previous: Option<&Table>,
    origins: &RowOrigins,
    mode: CarryOver,
) -> Merge {
    let Some(previous) = previous else {
        return Merge {
            table: filtered,
            carried: Vec::new(),
            origins: RowOrigins::new(),
            misaligned: false,
        };
    };

    let rows = filtered.row_count();
    let extra: Vec<&Column> = previous
        .columns
        .iter()
        .filter(|c| !filtered.has_column(&c.name))
        .collect();

    let positions: HashMap<usize, usize> = match mode {
        CarryOver::RowIdentity => previous
            .row_ids
            .iter()
            .enumerate()
            .map(|(pos, id)| (*id, pos))
            .collect(),
        CarryOver::Positional => HashMap::new(),
    };

    let mut table = filtered;
    let mut carried = Vec::with_capacity(extra.len());
    let mut carried_origins = RowOrigins::new();
    for column in extra {
        let origin = origins.get(&column.name).unwrap_or(&previous.row_ids);
        // Prior position feeding each new row, if any
        let sources: Vec<Option<usize>> = match mode {
            CarryOver::Positional => (0..rows)
                .map(|i| (i < column.values.len()).then_some(i))
                .collect(),
            CarryOver::RowIdentity => table
                .row_ids
                .iter()
                .map(|id| positions.get(id).copied())
                .collect(),
        };

        let values: Vec<CellValue> = sources
            .iter()
            .map(|source| {
                source
                    .and_then(|pos| column.values.get(pos))
                    .cloned()
                    .unwrap_or(CellValue::Missing)
            })
            .collect();
        // A Missing filler belongs to whichever row it lands on
        let moved: Vec<usize> = sources
            .iter()
            .zip(&table.row_ids)
            .map(|(source, id)| source.and_then(|pos| origin.get(pos)).copied().unwrap_or(*id))
            .collect();

        carried.push(column.name.clone());
        carried_origins.insert(column.name.clone(), moved);
        table.add_column(Column::new(column.name.clone(), values));
    }

    let misaligned = is_misaligned(&table, &carried_origins);
    if misaligned {
        warn!(
            columns = ?carried,
            "derived columns carried over by position; rows changed since they were computed"
        );
    } else if !carried.is_empty() {
        debug!(columns = ?carried, mode = ?mode, "carried derived columns");
    }

    Merge {
        table,
        carried,
        origins: carried_origins,
        misaligned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn n(v: f64) -> CellValue {
        CellValue::Number(v)
    }

    fn previous() -> Table {
        let mut table = Table::from_columns(vec![Column::numbers(
            "v",
            &[Some(1.0), Some(2.0), Some(3.0)],
        )]);
        table.add_column(Column::numbers("double", &[Some(2.0), Some(4.0), Some(6.0)]));
        table
    }

    #[test]
    fn test_no_previous_table() {
        let filtered = Table::from_columns(vec![Column::numbers("v", &[Some(1.0)])]);
        let merge = merge_derived(filtered.clone(), None, &RowOrigins::new(), CarryOver::Positional);
        assert_eq!(merge.table, filtered);
        assert!(merge.carried.is_empty());
    }

    #[test]
    fn test_positional_same_rows_is_aligned() {
        let prev = previous();
        let filtered = Table::from_columns(vec![prev.column("v").unwrap().clone()]);
        let merge = merge_derived(filtered, Some(&prev), &RowOrigins::new(), CarryOver::Positional);
        assert_eq!(merge.table, prev);
        assert_eq!(merge.carried, vec!["double".to_string()]);
        assert!(!merge.misaligned);
    }

    #[test]
    fn test_positional_after_reorder_misaligns() {
        let prev = previous();
        let raw = Table::from_columns(vec![prev.column("v").unwrap().clone()]);
        let reversed = raw.take_rows(&[2, 1, 0]);
        let merge = merge_derived(reversed, Some(&prev), &RowOrigins::new(), CarryOver::Positional);
        // Values stay at their positions, not with their rows
        assert_eq!(
            merge.table.column("double").unwrap().values,
            vec![n(2.0), n(4.0), n(6.0)]
        );
        assert!(merge.misaligned);
    }

    #[test]
    fn test_positional_pads_and_truncates() {
        let prev = previous();
        let raw = Table::from_columns(vec![Column::numbers(
            "v",
            &[Some(1.0), Some(2.0), Some(3.0), Some(4.0)],
        )]);
        let merge = merge_derived(raw.clone(), Some(&prev), &RowOrigins::new(), CarryOver::Positional);
        assert_eq!(
            merge.table.column("double").unwrap().values,
            vec![n(2.0), n(4.0), n(6.0), CellValue::Missing]
        );

        let shorter = raw.take_rows(&[0]);
        let merge = merge_derived(shorter, Some(&prev), &RowOrigins::new(), CarryOver::Positional);
        assert_eq!(merge.table.column("double").unwrap().values, vec![n(2.0)]);
        assert!(merge.table.validate_lengths().is_ok());
    }

    #[test]
    fn test_row_identity_follows_rows() {
        let prev = previous();
        let raw = Table::from_columns(vec![Column::numbers(
            "v",
            &[Some(1.0), Some(2.0), Some(3.0), Some(4.0)],
        )]);
        let reordered = raw.take_rows(&[3, 2, 0]);
        let merge = merge_derived(reordered, Some(&prev), &RowOrigins::new(), CarryOver::RowIdentity);
        assert_eq!(
            merge.table.column("double").unwrap().values,
            vec![CellValue::Missing, n(6.0), n(2.0)]
        );
        assert!(!merge.misaligned);
    }

    #[test]
    fn test_positional_keeps_flag_while_values_stay_moved() {
        let prev = previous();
        let raw = Table::from_columns(vec![prev.column("v").unwrap().clone()]);
        let reversed = raw.take_rows(&[2, 1, 0]);
        let first = merge_derived(
            reversed.clone(),
            Some(&prev),
            &RowOrigins::new(),
            CarryOver::Positional,
        );
        assert!(first.misaligned);
        assert_eq!(first.origins["double"], vec![0, 1, 2]);

        // Same ordering again: row ids match the previous table but not the values
        let second =
            merge_derived(reversed, Some(&first.table), &first.origins, CarryOver::Positional);
        assert!(second.misaligned);
        assert_eq!(
            second.table.column("double").unwrap().values,
            vec![n(2.0), n(4.0), n(6.0)]
        );

        // Back to raw order the values sit on their own rows again
        let restored =
            merge_derived(raw, Some(&second.table), &second.origins, CarryOver::Positional);
        assert!(!restored.misaligned);
    }

    #[test]
    fn test_positional_truncation_of_same_prefix_is_aligned() {
        let prev = previous();
        let raw = Table::from_columns(vec![prev.column("v").unwrap().clone()]);
        let merge = merge_derived(
            raw.take_rows(&[0, 1]),
            Some(&prev),
            &RowOrigins::new(),
            CarryOver::Positional,
        );
        assert_eq!(merge.table.column("double").unwrap().values, vec![n(2.0), n(4.0)]);
        assert!(!merge.misaligned);
    }

    #[test]
    fn test_carry_over_from_str() {
        assert_eq!("positional".parse::<CarryOver>(), Ok(CarryOver::Positional));
        assert_eq!("row-identity".parse::<CarryOver>(), Ok(CarryOver::RowIdentity));
        assert!("sideways".parse::<CarryOver>().is_err());
    }
}
