//! Workbook fixtures built in memory
#![allow(dead_code)]

use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, Worksheet};
use std::path::{Path, PathBuf};

fn date(worksheet: &mut Worksheet, row: u32, col: u16, day: u8) {
    let format = Format::new().set_num_format("yyyy-mm-dd");
    let value = ExcelDateTime::from_ymd(2024, 1, day).unwrap();
    worksheet
        .write_datetime_with_format(row, col, &value, &format)
        .unwrap();
}

/// Sheets:
///
/// - `Sales`: 8 data rows, of which 5 survive cleaning (dates 2024-01-01,
///   02, 03, 05, 06; regions East, West, East, East, West; sales 100, 110,
///   121, 133.1, 146.41; units 10, 11, 12, 14, 15)
/// - `Fund`: `NAV unit` 10, 11, 12.1, 12.1, 9.68 by `month` 1..5
/// - `Empty`: a header and no data
pub fn workbook() -> Vec<u8> {
    let mut workbook = Workbook::new();

    let sales = workbook.add_worksheet();
    sales.set_name("Sales").unwrap();
    for (col, name) in ["date", "region", "sales", "units", "", "notes"]
        .iter()
        .enumerate()
    {
        if !name.is_empty() {
            sales.write_string(0, col as u16, *name).unwrap();
        }
    }
    // row 1, 2: full rows with text under the unnamed header
    date(sales, 1, 0, 1);
    sales.write_string(1, 1, "East").unwrap();
    sales.write_number(1, 2, 100.0).unwrap();
    sales.write_number(1, 3, 10.0).unwrap();
    sales.write_string(1, 4, "x").unwrap();
    date(sales, 2, 0, 2);
    sales.write_string(2, 1, "West").unwrap();
    sales.write_number(2, 2, 110.0).unwrap();
    sales.write_number(2, 3, 11.0).unwrap();
    sales.write_string(2, 4, "y").unwrap();
    // row 3 left empty
    date(sales, 4, 0, 3);
    sales.write_string(4, 1, "East").unwrap();
    sales.write_number(4, 2, 121.0).unwrap();
    sales.write_number(4, 3, 12.0).unwrap();
    // placeholder date
    sales.write_string(5, 0, "1900-01-01").unwrap();
    sales.write_string(5, 1, "West").unwrap();
    sales.write_number(5, 2, 999.0).unwrap();
    sales.write_number(5, 3, 99.0).unwrap();
    // no date
    sales.write_string(6, 1, "West").unwrap();
    sales.write_number(6, 2, 888.0).unwrap();
    sales.write_number(6, 3, 88.0).unwrap();
    date(sales, 7, 0, 5);
    sales.write_string(7, 1, "East").unwrap();
    sales.write_number(7, 2, 133.1).unwrap();
    sales.write_number(7, 3, 14.0).unwrap();
    date(sales, 8, 0, 6);
    sales.write_string(8, 1, "West").unwrap();
    sales.write_number(8, 2, 146.41).unwrap();
    sales.write_number(8, 3, 15.0).unwrap();
    sales.write_string(8, 5, "N/A").unwrap();

    let fund = workbook.add_worksheet();
    fund.set_name("Fund").unwrap();
    fund.write_string(0, 0, "month").unwrap();
    fund.write_string(0, 1, "NAV unit").unwrap();
    for (i, nav) in [10.0, 11.0, 12.1, 12.1, 9.68].iter().enumerate() {
        let row = i as u32 + 1;
        fund.write_number(row, 0, (i + 1) as f64).unwrap();
        fund.write_number(row, 1, *nav).unwrap();
    }

    let empty = workbook.add_worksheet();
    empty.set_name("Empty").unwrap();
    empty.write_string(0, 0, "a").unwrap();

    workbook.save_to_buffer().unwrap()
}

pub fn write_workbook(dir: &Path) -> PathBuf {
    let path = dir.join("sales.xlsx");
    std::fs::write(&path, workbook()).unwrap();
    path
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}
