use crate::api::{run_api_server, ApiConfig};
use crate::core::{CarryOver, ColumnFilter, FormulaRequest, Series, Session, SortSpec};
use crate::error::{TabflowError, TabflowResult};
use crate::excel::{ExcelExporter, ExcelImporter};
use crate::recipe::{PlotAxes, Recipe};
use crate::types::{CellValue, ColumnInfo, Table};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How tables and series are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

/// Pipeline settings shared by `columns`, `show`, `plot` and `export`.
/// Flags are layered over the recipe file, if any.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub sheet: Option<String>,
    pub recipe: Option<PathBuf>,
    /// `column=value1,value2`
    pub filters: Vec<String>,
    pub sort: Option<String>,
    pub descending: bool,
    /// `name=expression`
    pub formulas: Vec<String>,
    pub carry_over: Option<CarryOver>,
}

impl PipelineOptions {
    pub fn to_recipe(&self) -> TabflowResult<Recipe> {
        let base = match &self.recipe {
            Some(path) => Recipe::from_path(path)?,
            None => Recipe::default(),
        };

        let mut overlay = Recipe {
            sheet: self.sheet.clone(),
            carry_over: self.carry_over,
            sort: self.sort.as_ref().map(|column| SortSpec {
                column: column.clone(),
                ascending: !self.descending,
            }),
            ..Recipe::default()
        };
        for raw in &self.filters {
            let filter = parse_filter(raw)?;
            overlay.filters.insert(filter.column, filter.selected);
        }
        for raw in &self.formulas {
            overlay.formulas.push(raw.parse::<FormulaRequest>().map_err(TabflowError::Argument)?);
        }

        let mut recipe = base.merge(overlay);
        // --descending alone flips the recipe's sort
        if self.descending && self.sort.is_none() {
            if let Some(sort) = recipe.sort.as_mut() {
                sort.ascending = false;
            }
        }
        Ok(recipe)
    }
}

/// Parse `column=value1,value2`
pub fn parse_filter(raw: &str) -> TabflowResult<ColumnFilter> {
    let (column, values) = raw.split_once('=').ok_or_else(|| {
        TabflowError::Argument(format!("filter '{}' must look like column=value1,value2", raw))
    })?;
    let column = column.trim();
    if column.is_empty() {
        return Err(TabflowError::Argument(format!("filter '{}' has no column", raw)));
    }
    let selected = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(CellValue::text)
        .collect();
    Ok(ColumnFilter::new(column, selected))
}

fn read_file(file: &Path) -> TabflowResult<Vec<u8>> {
    let bytes = fs::read(file)?;
    debug!(path = %file.display(), bytes = bytes.len(), "read workbook");
    Ok(bytes)
}

/// Load `file` and run the recipe built from `options`
fn run_pipeline(file: &Path, options: &PipelineOptions) -> TabflowResult<(Session, Recipe)> {
    let recipe = options.to_recipe()?;
    let bytes = read_file(file)?;
    let mut session = Session::new();
    recipe.run(&mut session, &bytes)?;

    if session.derived_misaligned() {
        eprintln!(
            "{}",
            "⚠️  Derived columns were carried over by position after the rows changed; \
             use --carry-over row_identity to keep them with their rows"
                .yellow()
        );
    }
    Ok((session, recipe))
}

/// Execute the sheets command
pub fn sheets(file: PathBuf) -> TabflowResult<()> {
    let bytes = read_file(&file)?;
    let names = ExcelImporter::new(&bytes).sheet_names()?;

    println!("{}", "📒 Sheets".bold().green());
    println!("   File: {}\n", file.display());
    for (index, name) in names.iter().enumerate() {
        println!("   {} {}", format!("[{}]", index).bright_black(), name.cyan());
    }
    println!();
    Ok(())
}

/// Execute the columns command: column kinds, numeric columns, filter choices
pub fn columns(file: PathBuf, options: PipelineOptions, format: OutputFormat) -> TabflowResult<()> {
    let (session, _) = run_pipeline(&file, &options)?;
    let table = session.calculated().ok_or(TabflowError::NoTable)?;
    let filters = session.filter_options();

    if format == OutputFormat::Json {
        let json = serde_json::json!({
            "columns": table.columns.iter().map(ColumnInfo::from).collect::<Vec<_>>(),
            "numeric": session.numeric_columns(),
            "filters": filters,
        });
        println!("{}", to_json(&json)?);
        return Ok(());
    }

    println!("{}", "📋 Columns".bold().green());
    println!("   File: {} ({} rows)\n", file.display(), table.row_count());
    for column in &table.columns {
        let kind = format!("{:?}", column.kind()).to_lowercase();
        let marker = if column.is_numeric() { "📈" } else { "  " };
        println!("   {} {:<24} {}", marker, column.name.cyan(), kind.bright_black());
    }

    if !filters.is_empty() {
        println!("\n{}", "🔎 Filter choices".bold().green());
        for option in &filters {
            let values: Vec<String> = option.values.iter().map(|v| v.to_string()).collect();
            println!("   {}: {}", option.column.bright_blue().bold(), values.join(", "));
        }
    }
    println!();
    Ok(())
}

/// Execute the show command: print the calculated table
pub fn show(
    file: PathBuf,
    options: PipelineOptions,
    format: OutputFormat,
    limit: Option<usize>,
) -> TabflowResult<()> {
    let (session, _) = run_pipeline(&file, &options)?;
    let table = session.calculated().ok_or(TabflowError::NoTable)?;
    let table = match limit {
        Some(n) if n < table.row_count() => table.take_rows(&(0..n).collect::<Vec<_>>()),
        _ => table.clone(),
    };

    match format {
        OutputFormat::Json => println!("{}", to_json(&table)?),
        OutputFormat::Csv => print!("{}", to_csv(&table)?),
        OutputFormat::Table => {
            println!("{}", render_table(&table));
            println!(
                "{}",
                format!("{} rows × {} columns", table.row_count(), table.columns.len())
                    .bright_black()
            );
        }
    }
    Ok(())
}

/// Execute the plot command: print the (x, y) series
pub fn plot(
    file: PathBuf,
    options: PipelineOptions,
    x: Option<String>,
    y: Option<String>,
    format: OutputFormat,
) -> TabflowResult<()> {
    let (session, recipe) = run_pipeline(&file, &options)?;
    let axes = match (x, y, recipe.plot) {
        (Some(x), Some(y), _) => PlotAxes { x, y },
        (x, y, Some(axes)) => PlotAxes {
            x: x.unwrap_or(axes.x),
            y: y.unwrap_or(axes.y),
        },
        _ => {
            return Err(TabflowError::Argument(
                "plot needs --x and --y (or a plot section in the recipe)".to_string(),
            ))
        }
    };

    let series = session.plot(&axes.x, &axes.y)?;
    match format {
        OutputFormat::Json => println!("{}", to_json(&series)?),
        OutputFormat::Csv => print!("{}", series_to_csv(&series)?),
        OutputFormat::Table => {
            println!(
                "{}",
                format!("📈 {} by {}", series.y, series.x).bold().green()
            );
            for point in &series.points {
                println!("   {:<24} {}", point.x.to_string().cyan(), point.y);
            }
            println!(
                "{}",
                format!("{} points", series.points.len()).bright_black()
            );
        }
    }
    Ok(())
}

/// Execute the export command: write the calculated table to .xlsx
pub fn export(
    file: PathBuf,
    output: PathBuf,
    options: PipelineOptions,
    sheet_name: Option<String>,
) -> TabflowResult<()> {
    let (session, _) = run_pipeline(&file, &options)?;
    let table = session.calculated().ok_or(TabflowError::NoTable)?;

    let mut exporter = ExcelExporter::new(table);
    if let Some(name) = sheet_name {
        exporter = exporter.with_sheet_name(name);
    }
    exporter.export(&output)?;

    println!("{}", "✅ Export Complete!".bold().green());
    println!("   Input:  {}", file.display());
    println!("   Output: {}", output.display());
    println!("   {} rows × {} columns\n", table.row_count(), table.columns.len());
    Ok(())
}

/// Execute the serve command
pub fn serve(config: ApiConfig) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_api_server(config))
}

fn to_json<T: serde::Serialize>(value: &T) -> TabflowResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| TabflowError::Export(format!("Failed to serialize JSON: {}", e)))
}

fn csv_error(err: impl std::fmt::Display) -> TabflowError {
    TabflowError::Export(format!("Failed to write CSV: {}", err))
}

fn csv_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn csv_text(writer: csv::Writer<Vec<u8>>) -> TabflowResult<String> {
    let bytes = writer.into_inner().map_err(|e| csv_error(e.error()))?;
    String::from_utf8(bytes).map_err(csv_error)
}

/// Header row of column names, then one record per row in display form
pub fn to_csv(table: &Table) -> TabflowResult<String> {
    let mut writer = csv_writer();
    writer
        .write_record(table.columns.iter().map(|c| c.name.as_str()))
        .map_err(csv_error)?;
    for i in 0..table.row_count() {
        writer
            .write_record(table.row(i).iter().map(|v| v.to_string()))
            .map_err(csv_error)?;
    }
    csv_text(writer)
}

pub fn series_to_csv(series: &Series) -> TabflowResult<String> {
    let mut writer = csv_writer();
    writer
        .write_record([series.x.as_str(), series.y.as_str()])
        .map_err(csv_error)?;
    for point in &series.points {
        writer
            .write_record([point.x.to_string(), point.y.to_string()])
            .map_err(csv_error)?;
    }
    csv_text(writer)
}

/// Plain aligned text table, header in bold
pub fn render_table(table: &Table) -> String {
    let cells: Vec<Vec<String>> = (0..table.row_count())
        .map(|i| table.row(i).iter().map(|v| v.to_string()).collect())
        .collect();
    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(j, c)| {
            cells
                .iter()
                .map(|row| row[j].chars().count())
                .chain(std::iter::once(c.name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(cells.len() + 2);
    let header: Vec<String> = table
        .columns
        .iter()
        .zip(&widths)
        .map(|(c, &w)| format!("{:<w$}", c.name, w = w))
        .collect();
    lines.push(header.join("  ").trim_end().bold().to_string());
    lines.push(
        widths
            .iter()
            .map(|&w| "-".repeat(w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(v, &w)| format!("{:<w$}", v, w = w))
            .collect();
        lines.push(line.join("  ").trim_end().to_string());
    }
    lines.join("\n")
}
