use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

//==============================================================================
// Cell values
//==============================================================================

/// A single typed cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Finite number (integers are stored as f64)
    Number(f64),
    /// Free text
    Text(String),
    /// Date or timestamp
    Date(NaiveDateTime),
    /// Boolean cell or comparison result
    Boolean(bool),
    /// Empty / undefined
    Missing,
}

/// Hashable identity of a non-missing cell, used for distinct-value sets
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKey {
    Number(u64),
    Text(String),
    Date(NaiveDateTime),
    Boolean(bool),
}

impl CellValue {
    /// Build a number cell; NaN and infinities become `Missing`
    pub fn number(n: f64) -> Self {
        if n.is_finite() {
            CellValue::Number(n)
        } else {
            CellValue::Missing
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    /// Numeric view of the cell. Booleans count as 0/1.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Number(_) => "number",
            CellValue::Text(_) => "text",
            CellValue::Date(_) => "date",
            CellValue::Boolean(_) => "boolean",
            CellValue::Missing => "missing",
        }
    }

    pub fn key(&self) -> Option<CellKey> {
        match self {
            // -0.0 and 0.0 are the same value
            CellValue::Number(n) => Some(CellKey::Number((*n + 0.0).to_bits())),
            CellValue::Text(s) => Some(CellKey::Text(s.clone())),
            CellValue::Date(d) => Some(CellKey::Date(*d)),
            CellValue::Boolean(b) => Some(CellKey::Boolean(*b)),
            CellValue::Missing => None,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            CellValue::Number(_) => 0,
            CellValue::Date(_) => 1,
            CellValue::Text(_) => 2,
            CellValue::Boolean(_) => 3,
            CellValue::Missing => 4,
        }
    }

    /// Natural ordering across types: numbers, then dates, then text, then
    /// booleans, with `Missing` last.
    pub fn natural_cmp(&self, other: &CellValue) -> Ordering {
        match (self, other) {
            (CellValue::Number(a), CellValue::Number(b)) => a.total_cmp(b),
            (CellValue::Text(a), CellValue::Text(b)) => a.cmp(b),
            (CellValue::Date(a), CellValue::Date(b)) => a.cmp(b),
            (CellValue::Boolean(a), CellValue::Boolean(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    /// Whether a user-supplied selection value picks this cell.
    ///
    /// Same-typed values compare exactly. When either side is text the
    /// display forms are compared, so a selection of `"2023"` matches the
    /// number `2023`. Dates also accept their ISO wire form.
    pub fn matches(&self, selection: &CellValue) -> bool {
        match (self, selection) {
            (CellValue::Missing, _) | (_, CellValue::Missing) => false,
            (CellValue::Text(a), CellValue::Text(b)) => a == b,
            (CellValue::Date(d), CellValue::Text(t)) | (CellValue::Text(t), CellValue::Date(d)) => {
                parse_datetime(t).is_some_and(|parsed| parsed == *d)
            }
            (CellValue::Boolean(b), CellValue::Text(t)) | (CellValue::Text(t), CellValue::Boolean(b)) => {
                CellValue::Boolean(*b).to_string().eq_ignore_ascii_case(t)
            }
            (CellValue::Text(t), other) | (other, CellValue::Text(t)) => other.to_string() == *t,
            (a, b) => a.key() == b.key(),
        }
    }
}

/// Parse the date forms tabflow writes: ISO wire form, display form, bare date
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Format a number for display, dropping the fraction of integral values
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{}", format_number(*n)),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Date(d) => {
                if d.time() == NaiveTime::MIN {
                    write!(f, "{}", d.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S"))
                }
            }
            CellValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Missing => Ok(()),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Date(d) => {
                serializer.serialize_str(&d.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
            CellValue::Boolean(b) => serializer.serialize_bool(*b),
            CellValue::Missing => serializer.serialize_none(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireCell {
    Number(f64),
    Boolean(bool),
    Text(String),
    Missing,
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match WireCell::deserialize(deserializer)? {
            WireCell::Number(n) => CellValue::number(n),
            WireCell::Boolean(b) => CellValue::Boolean(b),
            WireCell::Text(s) => CellValue::Text(s),
            WireCell::Missing => CellValue::Missing,
        })
    }
}

//==============================================================================
// Columns and tables
//==============================================================================

/// Inferred type of a column from its non-missing cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Number,
    Text,
    Date,
    Boolean,
    Mixed,
    /// No non-missing cells
    Empty,
}

/// A named column of cells
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Column of numbers; `None` entries are missing
    pub fn numbers(name: impl Into<String>, values: &[Option<f64>]) -> Self {
        Self::new(
            name,
            values
                .iter()
                .map(|v| v.map(CellValue::number).unwrap_or(CellValue::Missing))
                .collect(),
        )
    }

    pub fn texts(name: impl Into<String>, values: &[&str]) -> Self {
        Self::new(name, values.iter().map(|s| CellValue::text(*s)).collect())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_all_missing(&self) -> bool {
        self.values.iter().all(CellValue::is_missing)
    }

    pub fn kind(&self) -> ColumnKind {
        let mut kind = ColumnKind::Empty;
        for value in &self.values {
            let this = match value {
                CellValue::Number(_) => ColumnKind::Number,
                CellValue::Text(_) => ColumnKind::Text,
                CellValue::Date(_) => ColumnKind::Date,
                CellValue::Boolean(_) => ColumnKind::Boolean,
                CellValue::Missing => continue,
            };
            if kind == ColumnKind::Empty {
                kind = this;
            } else if kind != this {
                return ColumnKind::Mixed;
            }
        }
        kind
    }

    /// Numeric columns hold only numbers (an all-missing column counts)
    pub fn is_numeric(&self) -> bool {
        matches!(self.kind(), ColumnKind::Number | ColumnKind::Empty)
    }

    /// Text or mixed-type columns
    pub fn is_categorical(&self) -> bool {
        matches!(self.kind(), ColumnKind::Text | ColumnKind::Mixed)
    }

    /// Distinct non-missing values in order of first appearance
    pub fn distinct_values(&self) -> Vec<CellValue> {
        let mut seen = HashSet::new();
        self.values
            .iter()
            .filter(|v| v.key().is_some_and(|k| seen.insert(k)))
            .cloned()
            .collect()
    }

    pub fn distinct_count(&self) -> usize {
        self.values.iter().filter_map(CellValue::key).collect::<HashSet<_>>().len()
    }
}

/// An ordered set of equal-length columns.
///
/// `row_ids` records, for every row, its position in the table it was loaded
/// as, so rows can be traced back after filtering and sorting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<Column>,
    pub row_ids: Vec<usize>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table whose row ids are the row positions
    pub fn from_columns(columns: Vec<Column>) -> Self {
        let rows = columns.first().map_or(0, Column::len);
        Self {
            columns,
            row_ids: (0..rows).collect(),
        }
    }

    /// Append a column, or replace the one with the same name in place
    pub fn add_column(&mut self, column: Column) {
        if self.columns.is_empty() && self.row_ids.is_empty() {
            self.row_ids = (0..column.len()).collect();
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(self.row_ids.len(), Column::len)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.row_count() == 0
    }

    /// Cells of one row, in column order
    pub fn row(&self, index: usize) -> Vec<&CellValue> {
        self.columns.iter().map(|c| &c.values[index]).collect()
    }

    /// New table made of the given rows, in the given order
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| {
                    Column::new(
                        c.name.clone(),
                        indices.iter().map(|&i| c.values[i].clone()).collect(),
                    )
                })
                .collect(),
            row_ids: indices.iter().map(|&i| self.row_ids[i]).collect(),
        }
    }

    /// Validate all columns have the same length
    pub fn validate_lengths(&self) -> Result<(), String> {
        let row_count = self.row_count();
        if self.row_ids.len() != row_count {
            return Err(format!(
                "Table has {} row ids for {} rows",
                self.row_ids.len(),
                row_count
            ));
        }
        for column in &self.columns {
            if column.len() != row_count {
                return Err(format!(
                    "Column '{}' has {} rows, expected {} rows",
                    column.name,
                    column.len(),
                    row_count
                ));
            }
        }
        Ok(())
    }
}

/// Column header as sent to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
}

impl From<&Column> for ColumnInfo {
    fn from(column: &Column) -> Self {
        Self {
            name: column.name.clone(),
            kind: column.kind(),
        }
    }
}

/// Row-major form: `{"columns": [{name, kind}], "rows": [[cell, ...]]}`
impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let columns: Vec<ColumnInfo> = self.columns.iter().map(ColumnInfo::from).collect();
        let rows: Vec<Vec<&CellValue>> = (0..self.row_count()).map(|i| self.row(i)).collect();

        let mut state = serializer.serialize_struct("Table", 2)?;
        state.serialize_field("columns", &columns)?;
        state.serialize_field("rows", &rows)?;
        state.end()
    }
}
