//! Column operations allowed in formulas
//!
//! Each is reachable either as a method (`price.shift(1)`) or as a function
//! with the column first (`shift(price, 1)`). Names are case-insensitive.

use super::evaluator::{binary_value, map_values, zip_with, Operand};
use super::parser::BinaryOp;
use crate::error::FormulaError;
use crate::types::CellValue;

/// Every function name a formula may call
pub const FUNCTIONS: &[&str] = &[
    "shift",
    "diff",
    "pct_change",
    "cumsum",
    "abs",
    "round",
    "fillna",
    "sum",
    "mean",
    "min",
    "max",
    "count",
];

/// Dispatch a call by name
pub fn call(name: &str, args: Vec<Operand>) -> Result<Operand, FormulaError> {
    let lower = name.to_lowercase();

    match lower.as_str() {
        // ═══════════════════════════════════════════════════════════════════
        // POSITIONAL
        // ═══════════════════════════════════════════════════════════════════
        "shift" => {
            let (column, periods) = column_and_periods(&lower, args)?;
            Ok(Operand::Column(shift(&column, periods)))
        }

        "diff" => {
            let (column, periods) = column_and_periods(&lower, args)?;
            let lagged = Operand::Column(shift(&column, periods));
            zip_with(Operand::Column(column), lagged, |a, b| {
                binary_value(BinaryOp::Sub, a, b)
            })
        }

        "pct_change" => {
            let (column, periods) = column_and_periods(&lower, args)?;
            let lagged = Operand::Column(shift(&column, periods));
            let ratio = zip_with(Operand::Column(column), lagged, |a, b| {
                binary_value(BinaryOp::Div, a, b)
            })?;
            map_values(ratio, |v| {
                binary_value(BinaryOp::Sub, v, &CellValue::Number(1.0))
            })
        }

        "cumsum" => {
            require_args(&lower, &args, 1, 1)?;
            let column = expect_column(&lower, first(args))?;
            let mut total = 0.0;
            let values = column
                .iter()
                .map(|v| match v {
                    CellValue::Missing => Ok(CellValue::Missing),
                    other => {
                        total += numeric(&lower, other)?;
                        Ok(CellValue::number(total))
                    }
                })
                .collect::<Result<_, FormulaError>>()?;
            Ok(Operand::Column(values))
        }

        // ═══════════════════════════════════════════════════════════════════
        // ELEMENT-WISE
        // ═══════════════════════════════════════════════════════════════════
        "abs" => {
            require_args(&lower, &args, 1, 1)?;
            map_values(first(args), |v| match v {
                CellValue::Missing => Ok(CellValue::Missing),
                other => Ok(CellValue::number(numeric("abs", other)?.abs())),
            })
        }

        "round" => {
            require_args(&lower, &args, 1, 2)?;
            let mut args = args.into_iter();
            let value = args.next().unwrap_or(Operand::Scalar(CellValue::Missing));
            let decimals = match args.next() {
                Some(arg) => integer_scalar(&lower, arg)?,
                None => 0,
            };
            let multiplier = 10_f64.powi(decimals as i32);
            map_values(value, |v| match v {
                CellValue::Missing => Ok(CellValue::Missing),
                other => Ok(CellValue::number(
                    (numeric("round", other)? * multiplier).round() / multiplier,
                )),
            })
        }

        "fillna" => {
            require_args(&lower, &args, 2, 2)?;
            let mut args = args.into_iter();
            let value = args.next().unwrap_or(Operand::Scalar(CellValue::Missing));
            let fill = args.next().unwrap_or(Operand::Scalar(CellValue::Missing));
            zip_with(value, fill, |v, f| {
                Ok(if v.is_missing() { f.clone() } else { v.clone() })
            })
        }

        // ═══════════════════════════════════════════════════════════════════
        // AGGREGATES (broadcast back as scalars)
        // ═══════════════════════════════════════════════════════════════════
        "sum" | "mean" => {
            require_args(&lower, &args, 1, 1)?;
            let numbers = present(first(args))
                .iter()
                .map(|v| numeric(&lower, v))
                .collect::<Result<Vec<f64>, _>>()?;
            let sum: f64 = numbers.iter().sum();
            Ok(Operand::Scalar(if lower == "sum" {
                CellValue::number(sum)
            } else if numbers.is_empty() {
                CellValue::Missing
            } else {
                CellValue::number(sum / numbers.len() as f64)
            }))
        }

        "min" | "max" => {
            require_args(&lower, &args, 1, 1)?;
            let values = present(first(args));
            if let Some(first) = values.first() {
                if values.iter().any(|v| v.type_name() != first.type_name()) {
                    return Err(FormulaError::Type(format!(
                        "{}() needs values of a single type",
                        lower
                    )));
                }
            }
            let pick = |a: &&CellValue, b: &&CellValue| a.natural_cmp(b);
            let best = if lower == "min" {
                values.iter().min_by(pick)
            } else {
                values.iter().max_by(pick)
            };
            Ok(Operand::Scalar(best.cloned().unwrap_or(CellValue::Missing)))
        }

        "count" => {
            require_args(&lower, &args, 1, 1)?;
            Ok(Operand::Scalar(CellValue::Number(
                present(first(args)).len() as f64,
            )))
        }

        _ => Err(FormulaError::UnknownFunction(name.to_string())),
    }
}

/// Lag by `periods` rows; negative periods lead. Vacated rows are missing.
pub fn shift(values: &[CellValue], periods: i64) -> Vec<CellValue> {
    let len = values.len() as i64;
    (0..len)
        .map(|i| {
            let source = i - periods;
            if (0..len).contains(&source) {
                values[source as usize].clone()
            } else {
                CellValue::Missing
            }
        })
        .collect()
}

fn require_args(
    name: &str,
    args: &[Operand],
    min: usize,
    max: usize,
) -> Result<(), FormulaError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        return Err(FormulaError::Arity {
            function: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn first(args: Vec<Operand>) -> Operand {
    args.into_iter()
        .next()
        .unwrap_or(Operand::Scalar(CellValue::Missing))
}

fn expect_column(name: &str, operand: Operand) -> Result<Vec<CellValue>, FormulaError> {
    match operand {
        Operand::Column(values) => Ok(values),
        Operand::Scalar(_) => Err(FormulaError::Type(format!("{}() needs a column", name))),
    }
}

/// `(column[, periods])` with periods defaulting to 1
fn column_and_periods(name: &str, args: Vec<Operand>) -> Result<(Vec<CellValue>, i64), FormulaError> {
    require_args(name, &args, 1, 2)?;
    let mut args = args.into_iter();
    let column = expect_column(name, args.next().unwrap_or(Operand::Scalar(CellValue::Missing)))?;
    let periods = match args.next() {
        Some(arg) => integer_scalar(name, arg)?,
        None => 1,
    };
    Ok((column, periods))
}

fn integer_scalar(name: &str, operand: Operand) -> Result<i64, FormulaError> {
    match operand {
        Operand::Scalar(CellValue::Number(n)) if n.fract() == 0.0 => Ok(n as i64),
        other => Err(FormulaError::Type(format!(
            "{}() expects an integer, got a {}",
            name,
            other.type_label()
        ))),
    }
}

fn numeric(name: &str, value: &CellValue) -> Result<f64, FormulaError> {
    value.as_number().ok_or_else(|| {
        FormulaError::Type(format!("{}() needs numbers, got {}", name, value.type_name()))
    })
}

/// Non-missing values of an operand
fn present(operand: Operand) -> Vec<CellValue> {
    let values = match operand {
        Operand::Scalar(v) => vec![v],
        Operand::Column(values) => values,
    };
    values.into_iter().filter(|v| !v.is_missing()).collect()
}
