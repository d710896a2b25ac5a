//! Plot projector: (x, y) series for a line chart

use crate::error::PlotError;
use crate::types::{CellValue, Table};
use serde::Serialize;
use tracing::info;

/// One point of a line chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotPoint {
    pub x: CellValue,
    pub y: f64,
}

/// Points in table row order; x values are neither sorted nor aggregated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub x: String,
    pub y: String,
    pub points: Vec<PlotPoint>,
}

/// Columns the y-axis selector may offer
pub fn numeric_columns(table: &Table) -> Vec<&str> {
    table
        .columns
        .iter()
        .filter(|c| c.is_numeric())
        .map(|c| c.name.as_str())
        .collect()
}

/// Pair up `x` and `y`, dropping rows where either is missing
pub fn project(table: &Table, x: &str, y: &str) -> Result<Series, PlotError> {
    let x_column = table
        .column(x)
        .ok_or_else(|| PlotError::UnknownColumn(x.to_string()))?;
    let y_column = table
        .column(y)
        .ok_or_else(|| PlotError::UnknownColumn(y.to_string()))?;
    if !y_column.is_numeric() {
        return Err(PlotError::NonNumericY(y.to_string()));
    }

    let points: Vec<PlotPoint> = x_column
        .values
        .iter()
        .zip(&y_column.values)
        .filter(|(x, _)| !x.is_missing())
        .filter_map(|(x, y)| {
            y.as_number().map(|y| PlotPoint {
                x: x.clone(),
                y,
            })
        })
        .collect();

    if points.is_empty() {
        return Err(PlotError::NoData {
            x: x.to_string(),
            y: y.to_string(),
        });
    }

    info!(x, y, points = points.len(), of = table.row_count(), "projected series");
    Ok(Series {
        x: x.to_string(),
        y: y.to_string(),
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Column;

    fn table() -> Table {
        Table::from_columns(vec![
            Column::texts("month", &["Jan", "Feb", "Feb", "Mar"]),
            Column::numbers("sales", &[Some(1.0), None, Some(3.0), Some(4.0)]),
            Column::new(
                "label",
                vec![CellValue::Missing, CellValue::text("b"), CellValue::text("c"), CellValue::text("d")],
            ),
        ])
    }

    #[test]
    fn test_numeric_columns() {
        assert_eq!(numeric_columns(&table()), vec!["sales"]);
    }

    #[test]
    fn test_project_keeps_row_order_and_duplicates() {
        let series = project(&table(), "month", "sales").unwrap();
        let xs: Vec<String> = series.points.iter().map(|p| p.x.to_string()).collect();
        assert_eq!(xs, vec!["Jan", "Feb", "Mar"]);
        let ys: Vec<f64> = series.points.iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![1.0, 3.0, 4.0]);
    }

    #[test]
    fn test_missing_x_dropped() {
        let series = project(&table(), "label", "sales").unwrap();
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[0].x, CellValue::text("c"));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            project(&table(), "nope", "sales"),
            Err(PlotError::UnknownColumn("nope".to_string()))
        );
        assert_eq!(
            project(&table(), "sales", "month"),
            Err(PlotError::NonNumericY("month".to_string()))
        );
        let empty = Table::from_columns(vec![
            Column::texts("x", &["a"]),
            Column::numbers("y", &[None]),
        ]);
        assert!(matches!(project(&empty, "x", "y"), Err(PlotError::NoData { .. })));
    }
}
