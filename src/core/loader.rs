//! Table loader: reads one sheet and cleans it into a `Table`
//!
//! Cleaning rules, applied in order:
//! 1. column names are stringified, trimmed, and every run of non-word
//!    characters becomes `_`; later duplicates of a name are dropped
//! 2. all-missing columns, then all-missing rows, are dropped
//! 3. with a `date` column, rows with a missing date or a date whose text
//!    starts with `1900` are dropped (spreadsheet epoch placeholders)
//! 4. columns named `Unnamed...` (unlabelled header cells) are dropped

use crate::error::LoadError;
use crate::excel::{ExcelImporter, RawSheet, SheetSelector};
use crate::types::{CellValue, Column, Table};
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info};

/// Name of the column the epoch-placeholder rule applies to
pub const DATE_COLUMN: &str = "date";

/// Prefix given to unlabelled header cells
pub const UNNAMED_PREFIX: &str = "Unnamed";

const EPOCH_PLACEHOLDER_PREFIX: &str = "1900";

/// Normalizes raw header cells into column names
pub struct ColumnNamer {
    non_word: Regex,
}

impl ColumnNamer {
    pub fn new() -> Result<Self, LoadError> {
        let non_word = Regex::new(r"\W+")
            .map_err(|e| LoadError::Unreadable(format!("Regex error: {}", e)))?;
        Ok(Self { non_word })
    }

    /// Trim, then collapse every run of non-word characters into `_`
    pub fn sanitize(&self, raw: &str) -> String {
        self.non_word.replace_all(raw.trim(), "_").into_owned()
    }

    /// Column name for the header cell at `index`
    pub fn header_name(&self, cell: &CellValue, index: usize) -> String {
        let name = match cell {
            CellValue::Missing => String::new(),
            other => self.sanitize(&other.to_string()),
        };
        if name.is_empty() {
            format!("{}_{}", UNNAMED_PREFIX, index)
        } else {
            name
        }
    }
}

/// List the sheets of a workbook
pub fn sheet_names(bytes: &[u8]) -> Result<Vec<String>, LoadError> {
    ExcelImporter::new(bytes).sheet_names()
}

/// Read and clean one sheet
pub fn load_table(bytes: &[u8], selector: &SheetSelector) -> Result<Table, LoadError> {
    let raw = ExcelImporter::new(bytes).read_sheet(selector)?;
    clean(raw)
}

/// Apply the cleaning rules to a raw sheet
pub fn clean(raw: RawSheet) -> Result<Table, LoadError> {
    let namer = ColumnNamer::new()?;
    let RawSheet { name: sheet, header, rows } = raw;

    // Unique names, first occurrence wins
    let mut seen = HashSet::new();
    let kept: Vec<(usize, String)> = header
        .iter()
        .enumerate()
        .map(|(idx, cell)| (idx, namer.header_name(cell, idx)))
        .filter(|(_, name)| seen.insert(name.clone()))
        .collect();
    debug!(
        sheet = %sheet,
        header_cells = header.len(),
        unique = kept.len(),
        "normalized column names"
    );

    let columns: Vec<Column> = kept
        .into_iter()
        .map(|(idx, name)| {
            let values = rows
                .iter()
                .map(|row| row.get(idx).cloned().unwrap_or(CellValue::Missing))
                .collect();
            Column::new(name, values)
        })
        .filter(|column| !column.is_all_missing())
        .collect();

    let mut table = Table::from_columns(columns);

    let non_empty: Vec<usize> = (0..table.row_count())
        .filter(|&row| table.row(row).iter().any(|cell| !cell.is_missing()))
        .collect();
    table = table.take_rows(&non_empty);

    let dated_rows: Option<Vec<usize>> = table.column(DATE_COLUMN).map(|date| {
        date.values
            .iter()
            .enumerate()
            .filter(|(_, cell)| {
                !cell.is_missing() && !cell.to_string().starts_with(EPOCH_PLACEHOLDER_PREFIX)
            })
            .map(|(row, _)| row)
            .collect()
    });
    if let Some(valid) = dated_rows {
        table = table.take_rows(&valid);
    }

    table
        .columns
        .retain(|column| !column.name.starts_with(UNNAMED_PREFIX));

    if table.is_empty() {
        return Err(LoadError::Empty(sheet));
    }

    // Row ids start over: this is the table later stages trace rows back to
    table.row_ids = (0..table.row_count()).collect();

    info!(
        sheet = %sheet,
        rows = table.row_count(),
        columns = table.columns.len(),
        "loaded table"
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn t(s: &str) -> CellValue {
        CellValue::text(s)
    }

    fn n(v: f64) -> CellValue {
        CellValue::Number(v)
    }

    fn sheet(header: Vec<CellValue>, rows: Vec<Vec<CellValue>>) -> RawSheet {
        RawSheet {
            name: "Sheet1".to_string(),
            header,
            rows,
        }
    }

    #[test]
    fn test_sanitize() {
        let namer = ColumnNamer::new().unwrap();
        assert_eq!(namer.sanitize("  NAV unit  "), "NAV_unit");
        assert_eq!(namer.sanitize("Price ($)"), "Price_");
        assert_eq!(namer.sanitize("a -- b"), "a_b");
        assert_eq!(namer.sanitize("already_ok"), "already_ok");
    }

    #[test]
    fn test_header_name_for_numbers_and_blanks() {
        let namer = ColumnNamer::new().unwrap();
        assert_eq!(namer.header_name(&n(2023.0), 0), "2023");
        assert_eq!(namer.header_name(&CellValue::Missing, 3), "Unnamed_3");
        assert_eq!(namer.header_name(&t("   "), 4), "Unnamed_4");
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let table = clean(sheet(
            vec![t("a b"), t("a-b"), t("c")],
            vec![vec![n(1.0), n(2.0), n(3.0)]],
        ))
        .unwrap();
        assert_eq!(table.column_names(), vec!["a_b", "c"]);
        assert_eq!(table.column("a_b").unwrap().values, vec![n(1.0)]);
    }

    #[test]
    fn test_drops_empty_columns_and_rows() {
        let table = clean(sheet(
            vec![t("x"), t("empty"), t("y")],
            vec![
                vec![n(1.0), CellValue::Missing, t("a")],
                vec![CellValue::Missing, CellValue::Missing, CellValue::Missing],
                vec![n(3.0)],
            ],
        ))
        .unwrap();
        assert_eq!(table.column_names(), vec!["x", "y"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column("y").unwrap().values, vec![t("a"), CellValue::Missing]);
        assert_eq!(table.row_ids, vec![0, 1]);
    }

    #[test]
    fn test_date_rules() {
        let day = |y, m, d| {
            CellValue::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap())
        };
        let table = clean(sheet(
            vec![t("date"), t("v")],
            vec![
                vec![day(2024, 1, 2), n(1.0)],
                vec![day(1900, 1, 1), n(2.0)],
                vec![CellValue::Missing, n(3.0)],
                vec![t("1900-01-00"), n(4.0)],
                vec![day(2024, 1, 3), n(5.0)],
            ],
        ))
        .unwrap();
        assert_eq!(table.column("v").unwrap().values, vec![n(1.0), n(5.0)]);
    }

    #[test]
    fn test_unnamed_columns_dropped() {
        let table = clean(sheet(
            vec![t("a"), CellValue::Missing, t("Unnamed: 2")],
            vec![vec![n(1.0), n(2.0), n(3.0)]],
        ))
        .unwrap();
        assert_eq!(table.column_names(), vec!["a"]);
    }

    #[test]
    fn test_no_data_is_error() {
        let result = clean(sheet(vec![t("a")], vec![vec![CellValue::Missing]]));
        assert_eq!(result, Err(LoadError::Empty("Sheet1".to_string())));

        let result = clean(sheet(vec![], vec![]));
        assert!(matches!(result, Err(LoadError::Empty(_))));
    }
}
