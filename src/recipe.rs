//! YAML recipes: one pipeline pass described in a file
//!
//! ```yaml
//! sheet: Sales
//! filters:
//!   region: [East, West]
//! sort:
//!   column: date
//!   ascending: true
//! carry_over: positional
//! formulas:
//!   - name: growth
//!     expr: sales.pct_change()
//! plot:
//!   x: date
//!   y: growth
//! ```

use crate::core::{CarryOver, ColumnFilter, FormulaRequest, Session, SortSpec};
use crate::error::{TabflowError, TabflowResult};
use crate::excel::SheetSelector;
use crate::types::{CellValue, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotAxes {
    pub x: String,
    pub y: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Recipe {
    pub sheet: Option<String>,
    pub filters: BTreeMap<String, Vec<CellValue>>,
    pub sort: Option<SortSpec>,
    pub carry_over: Option<CarryOver>,
    pub formulas: Vec<FormulaRequest>,
    pub plot: Option<PlotAxes>,
}

impl Recipe {
    pub fn from_path(path: &Path) -> TabflowResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let recipe = Self::from_yaml(&content)?;
        debug!(path = %path.display(), formulas = recipe.formulas.len(), "read recipe");
        Ok(recipe)
    }

    pub fn from_yaml(content: &str) -> TabflowResult<Self> {
        // An empty file is an empty recipe
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn to_yaml(&self) -> TabflowResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn selector(&self) -> SheetSelector {
        SheetSelector::from(self.sheet.clone())
    }

    pub fn column_filters(&self) -> Vec<ColumnFilter> {
        self.filters
            .iter()
            .map(|(column, values)| ColumnFilter::new(column.clone(), values.clone()))
            .collect()
    }

    /// Layer `other` on top: scalars are replaced when set, filters are
    /// merged per column, formulas are appended
    pub fn merge(mut self, other: Recipe) -> Recipe {
        if other.sheet.is_some() {
            self.sheet = other.sheet;
        }
        self.filters.extend(other.filters);
        if other.sort.is_some() {
            self.sort = other.sort;
        }
        if other.carry_over.is_some() {
            self.carry_over = other.carry_over;
        }
        self.formulas.extend(other.formulas);
        if other.plot.is_some() {
            self.plot = other.plot;
        }
        self
    }

    /// Load `bytes` into `session` and run the filter and formula steps
    pub fn run<'s>(&self, session: &'s mut Session, bytes: &[u8]) -> TabflowResult<&'s Table> {
        session.load(bytes, &self.selector())?;
        if let Some(mode) = self.carry_over {
            session.set_carry_over(mode);
        }
        self.apply(session)
    }

    /// Run the filter and formula steps on an already loaded session
    pub fn apply<'s>(&self, session: &'s mut Session) -> TabflowResult<&'s Table> {
        let filters = self.column_filters();
        if !filters.is_empty() || self.sort.is_some() {
            session.apply_filter(&filters, self.sort.as_ref())?;
        }
        for formula in &self.formulas {
            session.add_formula(formula)?;
        }

        let table = session.calculated().ok_or(TabflowError::NoTable)?;
        info!(
            rows = table.row_count(),
            columns = table.columns.len(),
            formulas = self.formulas.len(),
            "recipe applied"
        );
        Ok(table)
    }
}
