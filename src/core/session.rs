//! Session state: the raw, filtered and calculated tables of one user
//!
//! Every interaction is a single synchronous pass through the stages it
//! touches. A failing pass leaves the session exactly as it was.

use super::calculated::{is_misaligned, merge_derived, CarryOver, RowOrigins};
use super::filter::{apply_filters, filter_options, ColumnFilter, FilterOption, SortSpec};
use super::formula::{apply_formula, FormulaRequest};
use super::loader::load_table;
use super::plot::{numeric_columns, project, Series};
use crate::error::{TabflowError, TabflowResult};
use crate::excel::SheetSelector;
use crate::types::Table;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct Session {
    raw: Option<Table>,
    filtered: Option<Table>,
    calculated: Option<Table>,
    carry_over: CarryOver,
    origins: RowOrigins,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_carry_over(mut self, mode: CarryOver) -> Self {
        self.carry_over = mode;
        self
    }

    pub fn carry_over(&self) -> CarryOver {
        self.carry_over
    }

    pub fn set_carry_over(&mut self, mode: CarryOver) {
        self.carry_over = mode;
    }

    pub fn raw(&self) -> Option<&Table> {
        self.raw.as_ref()
    }

    pub fn filtered(&self) -> Option<&Table> {
        self.filtered.as_ref()
    }

    pub fn calculated(&self) -> Option<&Table> {
        self.calculated.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.raw.is_some()
    }

    /// Whether some derived column holds values carried onto rows they were
    /// not computed for. Stays set until the column is recomputed, the rows
    /// line up again, or a new table is loaded.
    pub fn derived_misaligned(&self) -> bool {
        self.calculated
            .as_ref()
            .is_some_and(|table| is_misaligned(table, &self.origins))
    }

    /// Read a sheet and start over from it
    pub fn load(&mut self, bytes: &[u8], selector: &SheetSelector) -> TabflowResult<&Table> {
        let table = load_table(bytes, selector)?;
        self.replace(table);
        self.calculated.as_ref().ok_or(TabflowError::NoTable)
    }

    /// Start over from an already cleaned table
    pub fn replace(&mut self, table: Table) {
        self.filtered = Some(table.clone());
        self.calculated = Some(table.clone());
        self.raw = Some(table);
        self.origins.clear();
    }

    /// Forget the loaded file
    pub fn clear(&mut self) {
        let carry_over = self.carry_over;
        *self = Self::default().with_carry_over(carry_over);
    }

    /// Filter choices, derived fresh from the raw table
    pub fn filter_options(&self) -> Vec<FilterOption> {
        self.raw.as_ref().map(filter_options).unwrap_or_default()
    }

    /// Re-filter the raw table and reattach previously derived columns
    pub fn apply_filter(
        &mut self,
        filters: &[ColumnFilter],
        sort: Option<&SortSpec>,
    ) -> TabflowResult<&Table> {
        let raw = self.raw.as_ref().ok_or(TabflowError::NoTable)?;
        let filtered = apply_filters(raw, filters, sort).inspect_err(|e| {
            warn!(error = %e, "filter rejected");
        })?;

        let merge = merge_derived(
            filtered.clone(),
            self.calculated.as_ref(),
            &self.origins,
            self.carry_over,
        );
        self.filtered = Some(filtered);
        self.origins = merge.origins;
        Ok(self.calculated.insert(merge.table))
    }

    /// Evaluate a formula against the calculated table
    pub fn add_formula(&mut self, request: &FormulaRequest) -> TabflowResult<&Table> {
        let calculated = self.calculated.as_ref().ok_or(TabflowError::NoTable)?;
        let updated = apply_formula(calculated, request).inspect_err(|e| {
            warn!(column = %request.name, error = %e, "formula rejected");
        })?;
        self.origins.insert(request.name.clone(), updated.row_ids.clone());
        Ok(self.calculated.insert(updated))
    }

    /// Candidate y-axis columns
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.calculated.as_ref().map(numeric_columns).unwrap_or_default()
    }

    pub fn plot(&self, x: &str, y: &str) -> TabflowResult<Series> {
        let calculated = self.calculated.as_ref().ok_or(TabflowError::NoTable)?;
        Ok(project(calculated, x, y)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FilterError, FormulaError};
    use crate::types::{CellValue, Column};

    fn loaded() -> Session {
        let mut session = Session::new();
        session.replace(Table::from_columns(vec![
            Column::texts("k", &["b", "a", "c"]),
            Column::numbers("v", &[Some(2.0), Some(1.0), Some(3.0)]),
        ]));
        session
    }

    #[test]
    fn test_operations_need_a_table() {
        let mut session = Session::new();
        assert!(matches!(session.apply_filter(&[], None), Err(TabflowError::NoTable)));
        assert!(matches!(
            session.add_formula(&FormulaRequest::new("x", "1")),
            Err(TabflowError::NoTable)
        ));
        assert!(matches!(session.plot("a", "b"), Err(TabflowError::NoTable)));
        assert!(session.filter_options().is_empty());
    }

    #[test]
    fn test_failed_load_keeps_state() {
        let mut session = loaded();
        let before = session.calculated().cloned();
        assert!(session.load(b"garbage", &SheetSelector::default()).is_err());
        assert_eq!(session.calculated().cloned(), before);
    }

    #[test]
    fn test_failed_filter_keeps_state() {
        let mut session = loaded();
        session.add_formula(&FormulaRequest::new("d", "v * 2")).unwrap();
        let before = session.calculated().cloned();
        let err = session
            .apply_filter(&[], Some(&SortSpec::ascending("zzz")))
            .unwrap_err();
        assert!(matches!(err, TabflowError::Filter(FilterError::UnknownSortColumn(_))));
        assert_eq!(session.calculated().cloned(), before);
    }

    #[test]
    fn test_failed_formula_keeps_state() {
        let mut session = loaded();
        let before = session.calculated().cloned();
        let err = session
            .add_formula(&FormulaRequest::new("x", "nope + 1"))
            .unwrap_err();
        assert!(matches!(err, TabflowError::Formula(FormulaError::UnknownColumn(_))));
        assert_eq!(session.calculated().cloned(), before);
    }

    #[test]
    fn test_filtered_table_has_no_derived_columns() {
        let mut session = loaded();
        session.add_formula(&FormulaRequest::new("d", "v * 2")).unwrap();
        session.apply_filter(&[], None).unwrap();
        assert_eq!(session.filtered().unwrap().column_names(), vec!["k", "v"]);
        assert_eq!(session.calculated().unwrap().column_names(), vec!["k", "v", "d"]);
        assert!(!session.derived_misaligned());
    }

    #[test]
    fn test_sorting_flags_misalignment() {
        let mut session = loaded();
        session.add_formula(&FormulaRequest::new("d", "v * 2")).unwrap();
        session
            .apply_filter(&[], Some(&SortSpec::ascending("v")))
            .unwrap();
        assert!(session.derived_misaligned());
        // Positional carry-over: d still reads 4, 2, 6 top to bottom
        assert_eq!(
            session.calculated().unwrap().column("d").unwrap().values,
            vec![CellValue::Number(4.0), CellValue::Number(2.0), CellValue::Number(6.0)]
        );
    }

    #[test]
    fn test_repeated_sort_stays_misaligned() {
        let mut session = loaded();
        session.add_formula(&FormulaRequest::new("d", "v * 2")).unwrap();
        let by_v = SortSpec::ascending("v");
        session.apply_filter(&[], Some(&by_v)).unwrap();
        session.apply_filter(&[], Some(&by_v)).unwrap();
        assert!(session.derived_misaligned());
        assert_eq!(
            session.calculated().unwrap().column("d").unwrap().values,
            vec![CellValue::Number(4.0), CellValue::Number(2.0), CellValue::Number(6.0)]
        );
    }

    #[test]
    fn test_recomputing_clears_misalignment() {
        let mut session = loaded();
        session.add_formula(&FormulaRequest::new("d", "v * 2")).unwrap();
        session
            .apply_filter(&[], Some(&SortSpec::ascending("v")))
            .unwrap();
        assert!(session.derived_misaligned());

        let table = session.add_formula(&FormulaRequest::new("d", "v * 2")).unwrap();
        assert_eq!(
            table.column("d").unwrap().values,
            vec![CellValue::Number(2.0), CellValue::Number(4.0), CellValue::Number(6.0)]
        );
        assert!(!session.derived_misaligned());
    }

    #[test]
    fn test_unsorting_realigns() {
        let mut session = loaded();
        session.add_formula(&FormulaRequest::new("d", "v * 2")).unwrap();
        session
            .apply_filter(&[], Some(&SortSpec::ascending("v")))
            .unwrap();
        assert!(session.derived_misaligned());
        session.apply_filter(&[], None).unwrap();
        assert!(!session.derived_misaligned());
    }

    #[test]
    fn test_reload_resets_misalignment() {
        let mut session = loaded();
        session.add_formula(&FormulaRequest::new("d", "v * 2")).unwrap();
        session
            .apply_filter(&[], Some(&SortSpec::ascending("v")))
            .unwrap();
        session.replace(Table::from_columns(vec![Column::numbers("v", &[Some(1.0)])]));
        assert!(!session.derived_misaligned());
    }

    #[test]
    fn test_clear_keeps_carry_over_mode() {
        let mut session = loaded().with_carry_over(CarryOver::RowIdentity);
        session.clear();
        assert!(!session.is_loaded());
        assert_eq!(session.carry_over(), CarryOver::RowIdentity);
    }
}
