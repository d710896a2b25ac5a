use thiserror::Error;

pub type TabflowResult<T> = Result<T, TabflowError>;

#[derive(Error, Debug)]
pub enum TabflowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Recipe error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error(transparent)]
    Plot(#[from] PlotError),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("No file loaded")]
    NoTable,
}

impl From<rust_xlsxwriter::XlsxError> for TabflowError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        TabflowError::Export(err.to_string())
    }
}

/// Failures while reading a sheet into a table
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("Failed to open spreadsheet: {0}")]
    Unreadable(String),

    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),

    #[error("Sheet index {index} out of range ({count} sheets)")]
    SheetIndexOutOfRange { index: usize, count: usize },

    #[error("Workbook contains no sheets")]
    NoSheets,

    #[error("No data left in sheet '{0}' after cleaning")]
    Empty(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Unknown filter column: {0}")]
    UnknownColumn(String),

    #[error("Cannot sort by unknown column: {0}")]
    UnknownSortColumn(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("Formula syntax error: {0}")]
    Syntax(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("{function} expects {expected} argument(s), got {got}")]
    Arity {
        function: String,
        expected: String,
        got: usize,
    },

    #[error("Type error: {0}")]
    Type(String),

    #[error("Invalid column name '{0}': use letters, digits and underscores only")]
    InvalidName(String),

    #[error("Result has {got} rows, table has {expected}")]
    LengthMismatch { expected: usize, got: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlotError {
    #[error("Unknown plot column: {0}")]
    UnknownColumn(String),

    #[error("Y-axis column '{0}' is not numeric")]
    NonNumericY(String),

    #[error("No complete ({x}, {y}) pairs to plot")]
    NoData { x: String, y: String },
}
