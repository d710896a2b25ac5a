//! Spreadsheet importer - one sheet of an xlsx/xls/xlsb/ods workbook → raw grid

use crate::error::LoadError;
use crate::types::CellValue;
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::io::Cursor;
use tracing::debug;

/// Strings read as missing values
pub const NA_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Which sheet of the workbook to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    Index(usize),
    Name(String),
}

impl Default for SheetSelector {
    fn default() -> Self {
        SheetSelector::Index(0)
    }
}

impl From<Option<String>> for SheetSelector {
    fn from(name: Option<String>) -> Self {
        name.map(SheetSelector::Name).unwrap_or_default()
    }
}

/// A sheet as read: header row plus data rows, cells already typed
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub name: String,
    pub header: Vec<CellValue>,
    pub rows: Vec<Vec<CellValue>>,
}

/// Reads sheets out of in-memory workbook bytes
pub struct ExcelImporter<'a> {
    bytes: &'a [u8],
}

impl<'a> ExcelImporter<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn open(&self) -> Result<Sheets<Cursor<&'a [u8]>>, LoadError> {
        open_workbook_auto_from_rs(Cursor::new(self.bytes))
            .map_err(|e| LoadError::Unreadable(e.to_string()))
    }

    /// Names of all sheets, in workbook order
    pub fn sheet_names(&self) -> Result<Vec<String>, LoadError> {
        let workbook = self.open()?;
        Ok(workbook.sheet_names().to_vec())
    }

    /// Read the selected sheet. The first row is the header.
    pub fn read_sheet(&self, selector: &SheetSelector) -> Result<RawSheet, LoadError> {
        let mut workbook = self.open()?;
        let names = workbook.sheet_names().to_vec();
        if names.is_empty() {
            return Err(LoadError::NoSheets);
        }

        let name = match selector {
            SheetSelector::Name(name) => names
                .iter()
                .find(|n| *n == name)
                .cloned()
                .ok_or_else(|| LoadError::SheetNotFound(name.clone()))?,
            SheetSelector::Index(index) => {
                names
                    .get(*index)
                    .cloned()
                    .ok_or(LoadError::SheetIndexOutOfRange {
                        index: *index,
                        count: names.len(),
                    })?
            }
        };

        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| LoadError::Unreadable(format!("sheet '{}': {}", name, e)))?;
        debug!(sheet = %name, size = ?range.get_size(), "read worksheet range");

        Ok(Self::grid(name, &range))
    }

    fn grid(name: String, range: &Range<Data>) -> RawSheet {
        let mut rows = range
            .rows()
            .map(|row| row.iter().map(convert_cell).collect::<Vec<_>>());
        let header = rows.next().unwrap_or_default();
        RawSheet {
            name,
            header,
            rows: rows.collect(),
        }
    }
}

/// Convert a calamine cell to a typed cell
pub fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::number(*i as f64),
        Data::Float(f) => CellValue::number(*f),
        Data::String(s) => text_cell(s),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::DateTime(dt) => {
            if dt.is_duration() {
                CellValue::number(dt.as_f64())
            } else {
                dt.as_datetime().map(CellValue::Date).unwrap_or(CellValue::Missing)
            }
        }
        Data::DateTimeIso(s) => parse_iso_datetime(s)
            .map(CellValue::Date)
            .unwrap_or_else(|| text_cell(s)),
        Data::DurationIso(s) => text_cell(s),
        // Cell errors (#DIV/0!, #REF!, ...) and blanks
        _ => CellValue::Missing,
    }
}

fn text_cell(s: &str) -> CellValue {
    if NA_MARKERS.contains(&s) {
        CellValue::Missing
    } else {
        CellValue::text(s)
    }
}

fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_numbers() {
        assert_eq!(convert_cell(&Data::Int(7)), CellValue::Number(7.0));
        assert_eq!(convert_cell(&Data::Float(2.5)), CellValue::Number(2.5));
        assert_eq!(convert_cell(&Data::Float(f64::NAN)), CellValue::Missing);
    }

    #[test]
    fn test_convert_strings_and_na_markers() {
        assert_eq!(convert_cell(&Data::String("East".into())), CellValue::text("East"));
        assert_eq!(convert_cell(&Data::String(String::new())), CellValue::Missing);
        assert_eq!(convert_cell(&Data::String("#N/A".into())), CellValue::Missing);
        assert_eq!(convert_cell(&Data::String("n/a".into())), CellValue::Missing);
        // Whitespace is real text
        assert_eq!(convert_cell(&Data::String(" ".into())), CellValue::text(" "));
    }

    #[test]
    fn test_convert_bool_and_empty() {
        assert_eq!(convert_cell(&Data::Bool(true)), CellValue::Boolean(true));
        assert_eq!(convert_cell(&Data::Empty), CellValue::Missing);
    }

    #[test]
    fn test_convert_iso_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(
            convert_cell(&Data::DateTimeIso("2024-05-17T08:30:00".into())),
            CellValue::Date(expected)
        );
        assert_eq!(
            convert_cell(&Data::DateTimeIso("not a date".into())),
            CellValue::text("not a date")
        );
    }

    #[test]
    fn test_unreadable_bytes() {
        let importer = ExcelImporter::new(b"definitely not a workbook");
        assert!(matches!(
            importer.sheet_names(),
            Err(LoadError::Unreadable(_))
        ));
    }

    #[test]
    fn test_sheet_selector_from_option() {
        assert_eq!(SheetSelector::from(None), SheetSelector::Index(0));
        assert_eq!(
            SheetSelector::from(Some("Prices".to_string())),
            SheetSelector::Name("Prices".to_string())
        );
    }
}
