//! Spreadsheet I/O
//!
//! - Import: workbook bytes → typed cell grid (calamine)
//! - Export: table → .xlsx (rust_xlsxwriter)

mod exporter;
mod importer;

pub use exporter::{ExcelExporter, DEFAULT_SHEET_NAME};
pub use importer::{convert_cell, ExcelImporter, RawSheet, SheetSelector, NA_MARKERS};
