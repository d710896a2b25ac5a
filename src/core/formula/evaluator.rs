//! Formula evaluator
//!
//! Evaluates an AST against the columns of one table. Every operation is
//! element-wise over whole columns; scalars broadcast. The only names an
//! expression can reach are the table's columns and the functions in
//! `functions.rs`.

use super::functions;
use super::parser::{BinaryOp, Expr, UnaryOp};
use crate::error::FormulaError;
use crate::types::{CellValue, Table};
use chrono::TimeDelta;
use std::cmp::Ordering;

/// Intermediate evaluation result
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Scalar(CellValue),
    Column(Vec<CellValue>),
}

impl Operand {
    /// Expand to one value per row
    pub fn into_column(self, rows: usize) -> Vec<CellValue> {
        match self {
            Operand::Scalar(value) => vec![value; rows],
            Operand::Column(values) => values,
        }
    }

    pub fn type_label(&self) -> &'static str {
        match self {
            Operand::Scalar(_) => "scalar",
            Operand::Column(_) => "column",
        }
    }
}

/// The operands an expression may read: the columns of one table
pub struct EvalContext<'a> {
    table: &'a Table,
}

impl<'a> EvalContext<'a> {
    pub fn new(table: &'a Table) -> Self {
        Self { table }
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    fn column(&self, name: &str) -> Result<&'a [CellValue], FormulaError> {
        self.table
            .column(name)
            .map(|c| c.values.as_slice())
            .ok_or_else(|| FormulaError::UnknownColumn(name.to_string()))
    }
}

/// Evaluate an expression in the given context
pub fn evaluate(expr: &Expr, ctx: &EvalContext) -> Result<Operand, FormulaError> {
    match expr {
        Expr::Number(n) => Ok(Operand::Scalar(CellValue::number(*n))),
        Expr::Text(s) => Ok(Operand::Scalar(CellValue::text(s.clone()))),
        Expr::Boolean(b) => Ok(Operand::Scalar(CellValue::Boolean(*b))),
        Expr::Column(name) => Ok(Operand::Column(ctx.column(name)?.to_vec())),
        Expr::Call { name, args } => {
            let values = args
                .iter()
                .map(|arg| evaluate(arg, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            functions::call(name, values)
        }
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, ctx)?;
            let right = evaluate(right, ctx)?;
            zip_with(left, right, |a, b| binary_value(*op, a, b))
        }
        Expr::Unary { op, operand } => {
            let operand = evaluate(operand, ctx)?;
            map_values(operand, |v| unary_value(*op, v))
        }
    }
}

/// Apply `f` to every value of an operand
pub fn map_values(
    operand: Operand,
    f: impl Fn(&CellValue) -> Result<CellValue, FormulaError>,
) -> Result<Operand, FormulaError> {
    match operand {
        Operand::Scalar(v) => Ok(Operand::Scalar(f(&v)?)),
        Operand::Column(values) => Ok(Operand::Column(
            values.iter().map(f).collect::<Result<_, _>>()?,
        )),
    }
}

/// Combine two operands element-wise, broadcasting scalars
pub fn zip_with(
    left: Operand,
    right: Operand,
    f: impl Fn(&CellValue, &CellValue) -> Result<CellValue, FormulaError>,
) -> Result<Operand, FormulaError> {
    match (left, right) {
        (Operand::Scalar(a), Operand::Scalar(b)) => Ok(Operand::Scalar(f(&a, &b)?)),
        (Operand::Column(a), Operand::Scalar(b)) => Ok(Operand::Column(
            a.iter().map(|x| f(x, &b)).collect::<Result<_, _>>()?,
        )),
        (Operand::Scalar(a), Operand::Column(b)) => Ok(Operand::Column(
            b.iter().map(|y| f(&a, y)).collect::<Result<_, _>>()?,
        )),
        (Operand::Column(a), Operand::Column(b)) => {
            if a.len() != b.len() {
                return Err(FormulaError::LengthMismatch {
                    expected: a.len(),
                    got: b.len(),
                });
            }
            Ok(Operand::Column(
                a.iter()
                    .zip(b.iter())
                    .map(|(x, y)| f(x, y))
                    .collect::<Result<_, _>>()?,
            ))
        }
    }
}

fn type_error(op: BinaryOp, a: &CellValue, b: &CellValue) -> FormulaError {
    FormulaError::Type(format!(
        "unsupported operand types for {}: {} and {}",
        op.symbol(),
        a.type_name(),
        b.type_name()
    ))
}

/// One element of a binary operation
pub fn binary_value(op: BinaryOp, a: &CellValue, b: &CellValue) -> Result<CellValue, FormulaError> {
    if op.is_comparison() {
        compare(op, a, b)
    } else {
        arithmetic(op, a, b)
    }
}

fn arithmetic(op: BinaryOp, a: &CellValue, b: &CellValue) -> Result<CellValue, FormulaError> {
    match (a, b) {
        (CellValue::Missing, _) | (_, CellValue::Missing) => Ok(CellValue::Missing),

        (CellValue::Text(x), CellValue::Text(y)) if op == BinaryOp::Add => {
            Ok(CellValue::text(format!("{}{}", x, y)))
        }

        (CellValue::Date(x), CellValue::Date(y)) if op == BinaryOp::Sub => {
            Ok(CellValue::number((*x - *y).num_seconds() as f64 / 86_400.0))
        }
        (CellValue::Date(d), other) | (other, CellValue::Date(d))
            if matches!(other, CellValue::Number(_))
                && (op == BinaryOp::Add || (op == BinaryOp::Sub && matches!(a, CellValue::Date(_)))) =>
        {
            let shifted = other
                .as_number()
                .and_then(day_offset)
                .and_then(|offset| match op {
                    BinaryOp::Add => d.checked_add_signed(offset),
                    _ => d.checked_sub_signed(offset),
                });
            // Offsets outside the calendar become missing
            Ok(shifted.map(CellValue::Date).unwrap_or(CellValue::Missing))
        }

        _ => {
            let (Some(x), Some(y)) = (a.as_number(), b.as_number()) else {
                return Err(type_error(op, a, b));
            };
            let result = match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div => x / y,
                // Sign follows the divisor
                BinaryOp::Mod => x - y * (x / y).floor(),
                BinaryOp::Pow => x.powf(y),
                _ => return Err(type_error(op, a, b)),
            };
            // Division by zero and other non-finite results become missing
            Ok(CellValue::number(result))
        }
    }
}

/// A number of days as a duration, `None` when it cannot be represented
fn day_offset(days: f64) -> Option<TimeDelta> {
    let seconds = (days * 86_400.0).round();
    if !seconds.is_finite() || seconds.abs() >= i64::MAX as f64 {
        return None;
    }
    TimeDelta::try_seconds(seconds as i64)
}

fn compare(op: BinaryOp, a: &CellValue, b: &CellValue) -> Result<CellValue, FormulaError> {
    if a.is_missing() || b.is_missing() {
        return Ok(CellValue::Boolean(op == BinaryOp::Ne));
    }

    let ordering = match (a, b) {
        (CellValue::Text(x), CellValue::Text(y)) => Some(x.cmp(y)),
        (CellValue::Date(x), CellValue::Date(y)) => Some(x.cmp(y)),
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    };

    let result = match (op, ordering) {
        (BinaryOp::Eq, ord) => ord == Some(Ordering::Equal),
        (BinaryOp::Ne, ord) => ord != Some(Ordering::Equal),
        (_, None) => return Err(type_error(op, a, b)),
        (BinaryOp::Lt, Some(ord)) => ord == Ordering::Less,
        (BinaryOp::Gt, Some(ord)) => ord == Ordering::Greater,
        (BinaryOp::Le, Some(ord)) => ord != Ordering::Greater,
        (BinaryOp::Ge, Some(ord)) => ord != Ordering::Less,
        _ => return Err(type_error(op, a, b)),
    };
    Ok(CellValue::Boolean(result))
}

fn unary_value(op: UnaryOp, v: &CellValue) -> Result<CellValue, FormulaError> {
    match (op, v) {
        (_, CellValue::Missing) => Ok(CellValue::Missing),
        (UnaryOp::Neg, other) => other
            .as_number()
            .map(|n| CellValue::number(-n))
            .ok_or_else(|| FormulaError::Type(format!("bad operand type for unary -: {}", other.type_name()))),
        (UnaryOp::Plus, other) => other
            .as_number()
            .map(CellValue::number)
            .ok_or_else(|| FormulaError::Type(format!("bad operand type for unary +: {}", other.type_name()))),
    }
}
