//! tabflow - load a spreadsheet sheet, filter it, derive columns, plot them
//!
//! A session holds three tables:
//!
//! - the raw table, cleaned once at load time and never modified
//! - the filtered table, recomputed from the raw table on every filter pass
//! - the calculated table, the filtered table plus every derived column
//!
//! Derived columns come from a small, sandboxed expression language (see
//! [`core::formula`]) and survive re-filtering.
//!
//! # Example
//!
//! ```no_run
//! use tabflow::core::{FormulaRequest, Session, SortSpec};
//! use tabflow::excel::SheetSelector;
//!
//! let bytes = std::fs::read("sales.xlsx")?;
//! let mut session = Session::new();
//! session.load(&bytes, &SheetSelector::default())?;
//! session.apply_filter(&[], Some(&SortSpec::ascending("date")))?;
//! session.add_formula(&FormulaRequest::new("growth", "sales.pct_change()"))?;
//!
//! let series = session.plot("date", "growth")?;
//! println!("{} points", series.points.len());
//! # Ok::<(), tabflow::error::TabflowError>(())
//! ```

pub mod api;
pub mod cli;
pub mod core;
pub mod error;
pub mod excel;
pub mod logging;
pub mod recipe;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use error::{TabflowError, TabflowResult};
pub use types::{CellValue, Column, ColumnKind, Table};
