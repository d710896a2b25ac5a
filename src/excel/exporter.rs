//! Write a table back out as a single-sheet .xlsx workbook

use crate::error::{TabflowError, TabflowResult};
use crate::types::{CellValue, Table};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, Worksheet};
use std::path::Path;

pub const DEFAULT_SHEET_NAME: &str = "Calculated";

/// Exports a table with a bold header row and one typed cell per value
pub struct ExcelExporter<'a> {
    table: &'a Table,
    sheet_name: String,
}

impl<'a> ExcelExporter<'a> {
    pub fn new(table: &'a Table) -> Self {
        Self {
            table,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
        }
    }

    pub fn with_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = name.into();
        self
    }

    /// Save the workbook to disk
    pub fn export(&self, output_path: &Path) -> TabflowResult<()> {
        let mut workbook = self.build()?;
        workbook.save(output_path).map_err(|e| {
            TabflowError::Export(format!(
                "Failed to save {}: {}",
                output_path.display(),
                e
            ))
        })?;
        Ok(())
    }

    /// Serialize the workbook in memory
    pub fn to_bytes(&self) -> TabflowResult<Vec<u8>> {
        let mut workbook = self.build()?;
        Ok(workbook.save_to_buffer()?)
    }

    fn build(&self) -> TabflowResult<Workbook> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(&self.sheet_name)
            .map_err(|e| TabflowError::Export(format!("Invalid worksheet name: {}", e)))?;

        let header = Format::new().set_bold();
        let date = Format::new().set_num_format("yyyy-mm-dd");
        let datetime = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

        for (col_idx, column) in self.table.columns.iter().enumerate() {
            let col = col_idx as u16;
            worksheet.write_string_with_format(0, col, &column.name, &header)?;
            for (row_idx, value) in column.values.iter().enumerate() {
                let row = row_idx as u32 + 1;
                write_cell(worksheet, row, col, value, &date, &datetime)?;
            }
        }

        Ok(workbook)
    }
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &CellValue,
    date: &Format,
    datetime: &Format,
) -> TabflowResult<()> {
    match value {
        CellValue::Number(n) => {
            worksheet.write_number(row, col, *n)?;
        }
        CellValue::Text(s) => {
            worksheet.write_string(row, col, s)?;
        }
        CellValue::Boolean(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        CellValue::Date(d) => {
            let stamp = ExcelDateTime::parse_from_str(&d.format("%Y-%m-%dT%H:%M:%S").to_string())?;
            let format = if d.time() == chrono::NaiveTime::MIN {
                date
            } else {
                datetime
            };
            worksheet.write_datetime_with_format(row, col, &stamp, format)?;
        }
        // Left blank
        CellValue::Missing => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::excel::{ExcelImporter, SheetSelector};
    use crate::types::Column;
    use chrono::NaiveDate;

    fn sample() -> Table {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Table::from_columns(vec![
            Column::new("date", vec![CellValue::Date(day), CellValue::Missing]),
            Column::numbers("qty", &[Some(1.5), None]),
            Column::texts("region", &["East", "West"]),
        ])
    }

    #[test]
    fn test_export_reads_back() {
        let table = sample();
        let bytes = ExcelExporter::new(&table).to_bytes().unwrap();

        let importer = ExcelImporter::new(&bytes);
        assert_eq!(importer.sheet_names().unwrap(), vec![DEFAULT_SHEET_NAME]);

        let sheet = importer.read_sheet(&SheetSelector::default()).unwrap();
        assert_eq!(
            sheet.header,
            vec![
                CellValue::text("date"),
                CellValue::text("qty"),
                CellValue::text("region")
            ]
        );
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0][1], CellValue::Number(1.5));
        assert_eq!(sheet.rows[1][2], CellValue::text("West"));
        assert!(matches!(sheet.rows[0][0], CellValue::Date(_)));
    }

    #[test]
    fn test_custom_sheet_name() {
        let table = sample();
        let bytes = ExcelExporter::new(&table)
            .with_sheet_name("Report")
            .to_bytes()
            .unwrap();
        let names = ExcelImporter::new(&bytes).sheet_names().unwrap();
        assert_eq!(names, vec!["Report"]);
    }

    #[test]
    fn test_invalid_sheet_name_is_an_error() {
        let table = sample();
        let result = ExcelExporter::new(&table).with_sheet_name("a/b").to_bytes();
        assert!(matches!(result, Err(TabflowError::Export(_))));
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        ExcelExporter::new(&sample()).export(&path).unwrap();
        assert!(path.exists());
    }
}
