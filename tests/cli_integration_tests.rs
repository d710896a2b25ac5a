//! CLI Integration Tests
//!
//! Runs the `tabflow` binary against a workbook written to a temp dir.

#![allow(deprecated)] // Command::cargo_bin deprecation - no stable replacement yet

mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn tabflow() -> Command {
    let mut cmd = Command::cargo_bin("tabflow").unwrap();
    cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

// ═══════════════════════════════════════════════════════════════════════════
// HELP AND VERSION TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_cli_help() {
    tabflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("tabflow"))
        .stdout(predicate::str::contains("COMMANDS"));
}

#[test]
fn test_cli_version() {
    tabflow()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tabflow"));
}

#[test]
fn test_show_help_lists_functions() {
    tabflow()
        .args(["show", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pct_change"));
}

// ═══════════════════════════════════════════════════════════════════════════
// PIPELINE COMMANDS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_sheets_lists_all_sheets() {
    let dir = TempDir::new().unwrap();
    let file = common::write_workbook(dir.path());
    tabflow()
        .arg("sheets")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Sales"))
        .stdout(predicate::str::contains("Fund"))
        .stdout(predicate::str::contains("Empty"));
}

#[test]
fn test_show_csv_with_filter_sort_and_formula() {
    let dir = TempDir::new().unwrap();
    let file = common::write_workbook(dir.path());
    tabflow()
        .arg("show")
        .arg(&file)
        .args(["--filter", "region=East", "--sort", "units", "--descending"])
        .args(["-f", "double=units * 2", "--format", "csv"])
        .assert()
        .success()
        .stdout(
            "date,region,sales,units,double\n\
             2024-01-05,East,133.1,14,28\n\
             2024-01-03,East,121,12,24\n\
             2024-01-01,East,100,10,20\n",
        );
}

#[test]
fn test_show_json() {
    let dir = TempDir::new().unwrap();
    let file = common::write_workbook(dir.path());
    let output = tabflow()
        .arg("show")
        .arg(&file)
        .args(["--format", "json", "--limit", "2"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["rows"].as_array().unwrap().len(), 2);
    assert_eq!(json["columns"][0]["name"], "date");
    assert_eq!(json["columns"][0]["kind"], "date");
    assert_eq!(json["rows"][0][0], "2024-01-01T00:00:00");
}

#[test]
fn test_show_with_recipe() {
    let dir = TempDir::new().unwrap();
    let file = common::write_workbook(dir.path());
    let recipe = dir.path().join("fund.yaml");
    std::fs::write(
        &recipe,
        "sheet: Fund\nformulas:\n  - name: pct\n    expr: NAV_unit.pct_change() * 100\n",
    )
    .unwrap();
    tabflow()
        .arg("show")
        .arg(&file)
        .arg("--recipe")
        .arg(&recipe)
        .args(["--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("month,NAV_unit,pct\n1,10,\n"));
}

#[test]
fn test_columns_json() {
    let dir = TempDir::new().unwrap();
    let file = common::write_workbook(dir.path());
    let output = tabflow()
        .arg("columns")
        .arg(&file)
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["numeric"], serde_json::json!(["sales", "units"]));
    let filters = json["filters"].as_array().unwrap();
    assert!(filters.iter().any(|f| f["column"] == "region"));
}

#[test]
fn test_plot_csv() {
    let dir = TempDir::new().unwrap();
    let file = common::write_workbook(dir.path());
    tabflow()
        .arg("plot")
        .arg(&file)
        .args(["--sheet", "Fund", "-x", "month", "-y", "NAV_unit", "--format", "csv"])
        .assert()
        .success()
        .stdout("month,NAV_unit\n1,10\n2,11\n3,12.1\n4,12.1\n5,9.68\n");
}

#[test]
fn test_plot_requires_axes() {
    let dir = TempDir::new().unwrap();
    let file = common::write_workbook(dir.path());
    tabflow()
        .arg("plot")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--x and --y"));
}

#[test]
fn test_export_writes_calculated_table() {
    let dir = TempDir::new().unwrap();
    let file = common::write_workbook(dir.path());
    let out = dir.path().join("out.xlsx");
    tabflow()
        .arg("export")
        .arg(&file)
        .arg(&out)
        .args(["-f", "double=sales * 2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Export Complete"));

    let bytes = std::fs::read(&out).unwrap();
    let table = tabflow::core::load_table(&bytes, &Default::default()).unwrap();
    assert_eq!(
        table.column_names(),
        vec!["date", "region", "sales", "units", "double"]
    );
    assert_eq!(table.row_count(), 5);
}

// ═══════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_missing_file_fails() {
    tabflow()
        .args(["show", "/nonexistent/book.xlsx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_bad_formula_fails_with_message() {
    let dir = TempDir::new().unwrap();
    let file = common::write_workbook(dir.path());
    tabflow()
        .arg("show")
        .arg(&file)
        .args(["-f", "x=revenue * 2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown column: revenue"));
}

#[test]
fn test_unknown_sheet_fails() {
    let dir = TempDir::new().unwrap();
    let file = common::write_workbook(dir.path());
    tabflow()
        .arg("show")
        .arg(&file)
        .args(["--sheet", "Nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Sheet 'Nope' not found"));
}

#[test]
fn test_recipe_filter_without_formulas_does_not_warn() {
    let dir = TempDir::new().unwrap();
    let file = common::write_workbook(dir.path());
    let recipe = dir.path().join("r.yaml");
    std::fs::write(&recipe, "filters:\n  region: [West]\n").unwrap();
    tabflow()
        .arg("show")
        .arg(&file)
        .arg("--recipe")
        .arg(&recipe)
        .assert()
        .success()
        .stderr(predicate::str::contains("carried over by position").not());
}
