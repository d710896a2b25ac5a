//! Formula evaluator: derives a new column from an expression over the
//! current table's columns
//!
//! Formulas never reach a general-purpose interpreter: text goes through
//! the tokenizer and parser here, and evaluation can only read the table's
//! columns and call the functions listed in [`functions::FUNCTIONS`].

pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod tokenizer;

use crate::error::FormulaError;
use crate::types::{CellValue, Column, Table};
use evaluator::{evaluate, EvalContext};
use parser::Expr;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One "add calculated column" submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaRequest {
    /// Name of the column to create or overwrite
    pub name: String,
    /// Expression over existing column names
    pub expr: String,
}

impl FormulaRequest {
    pub fn new(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expr: expr.into(),
        }
    }
}

impl std::str::FromStr for FormulaRequest {
    type Err = String;

    /// `name=expression`; only the first '=' separates
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, expr) = s
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=EXPRESSION, got '{}'", s))?;
        Ok(Self::new(name.trim(), expr.trim()))
    }
}

/// Tokenize and parse a formula
pub fn compile(formula: &str) -> Result<Expr, FormulaError> {
    let tokens =
        tokenizer::tokenize(formula).map_err(|e| FormulaError::Syntax(e.to_string()))?;
    parser::parse(tokens).map_err(|e| FormulaError::Syntax(e.to_string()))
}

/// Whether `name` can be used as a column name
pub fn is_valid_column_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Evaluate a formula to one value per row of `table`
pub fn evaluate_formula(table: &Table, formula: &str) -> Result<Vec<CellValue>, FormulaError> {
    let expr = compile(formula)?;

    // Report unknown names before doing any work
    if let Some(unknown) = expr.columns().into_iter().find(|c| !table.has_column(c)) {
        return Err(FormulaError::UnknownColumn(unknown.to_string()));
    }

    let rows = table.row_count();
    let values = evaluate(&expr, &EvalContext::new(table))?.into_column(rows);
    if values.len() != rows {
        return Err(FormulaError::LengthMismatch {
            expected: rows,
            got: values.len(),
        });
    }
    debug!(formula, rows, "evaluated formula");
    Ok(values)
}

/// Add (or overwrite) the requested column. On error the input table is
/// untouched.
pub fn apply_formula(table: &Table, request: &FormulaRequest) -> Result<Table, FormulaError> {
    if !is_valid_column_name(&request.name) {
        return Err(FormulaError::InvalidName(request.name.clone()));
    }
    let values = evaluate_formula(table, &request.expr)?;

    let mut updated = table.clone();
    updated.add_column(Column::new(request.name.clone(), values));
    info!(column = %request.name, formula = %request.expr, "added calculated column");
    Ok(updated)
}
