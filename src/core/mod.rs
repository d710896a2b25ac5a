//! The pipeline stages: load, filter, carry derived columns, evaluate
//! formulas, project plot series. `Session` holds the tables between calls.

pub mod calculated;
pub mod filter;
pub mod formula;
pub mod loader;
pub mod plot;
pub mod session;

pub use calculated::{is_misaligned, merge_derived, CarryOver, Merge, RowOrigins};
pub use filter::{apply_filters, filter_options, ColumnFilter, FilterOption, SortSpec};
pub use formula::{apply_formula, FormulaRequest};
pub use loader::{load_table, sheet_names};
pub use plot::{numeric_columns, project, PlotPoint, Series};
pub use session::Session;
