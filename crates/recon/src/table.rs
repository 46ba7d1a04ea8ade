use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::error::ReconError;

/// Text form of a separator cell when it has to be rendered as text (JSON output).
pub const SEPARATOR_MARKER: &str = "_SEPARATOR_";

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Number(f64),
    /// Placeholder held by every cell of a separator row.
    Separator,
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Null, or text that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) | Self::Separator => false,
        }
    }

    pub fn is_separator(&self) -> bool {
        matches!(self, Self::Separator)
    }

    /// Numeric reading of the value. Text is parsed after trimming; anything
    /// that does not parse to a finite number is `None`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Canonical text form used for join and match keys.
    pub fn key_text(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Number(n) => Some(format_number(*n)),
            Self::Null | Self::Separator => None,
        }
    }

    /// Key equality on the canonical text form. Null never matches anything,
    /// not even another null.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            _ => match (self.key_text(), other.key_text()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

/// Integral numbers print without a decimal point (`6901234567890`, not
/// `6901234567890.0`).
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null | Self::Separator => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => f.write_str(&format_number(*n)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Number(n) if n.is_finite() => serializer.serialize_f64(*n),
            Self::Number(_) => serializer.serialize_none(),
            Self::Separator => serializer.serialize_str(SEPARATOR_MARKER),
        }
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// Transient provenance tag. Set by the merger and the group assembler,
/// removed by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowSource {
    Declaration,
    Benchmark,
    Separator,
}

impl fmt::Display for RowSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declaration => write!(f, "declaration"),
            Self::Benchmark => write!(f, "benchmark"),
            Self::Separator => write!(f, "separator"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<Value>,
    pub source: Option<RowSource>,
}

impl Row {
    pub fn new(cells: Vec<Value>) -> Self {
        Self { cells, source: None }
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Ordered columns plus rows. Every row is exactly as wide as the column list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
    normalized: bool,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            normalized: false,
        }
    }

    pub fn from_rows<I, S>(columns: I, rows: Vec<Vec<Value>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(columns);
        for cells in rows {
            table.push(cells);
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append an untagged row, padding with nulls or truncating to the table width.
    pub fn push(&mut self, cells: Vec<Value>) {
        self.push_row(Row::new(cells));
    }

    pub fn push_row(&mut self, mut row: Row) {
        row.cells.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn record(&self, index: usize) -> Option<Record<'_>> {
        (index < self.rows.len()).then_some(Record { table: self, index })
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        (0..self.rows.len()).map(move |index| Record { table: self, index })
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| &r.cells[col])
    }

    /// All values of one column, in row order.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value> + '_> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r.cells[col]))
    }

    /// Rows for which `keep` returns true, same columns, tags preserved.
    pub fn filter(&self, mut keep: impl FnMut(&Record<'_>) -> bool) -> Table {
        let mut out = Table::new(self.columns.clone());
        for record in self.records() {
            if keep(&record) {
                out.rows.push(self.rows[record.index].clone());
            }
        }
        out
    }

    /// Rows at `indices`, in that order.
    pub fn take(&self, indices: &[usize]) -> Table {
        let mut out = Table::new(self.columns.clone());
        out.rows = indices.iter().filter_map(|&i| self.rows.get(i).cloned()).collect();
        out
    }

    /// Rewrite every cell of a column in place. Returns false if the column is absent.
    pub fn map_column(&mut self, name: &str, mut f: impl FnMut(&Value) -> Value) -> bool {
        let Some(col) = self.column_index(name) else {
            return false;
        };
        for row in &mut self.rows {
            row.cells[col] = f(&row.cells[col]);
        }
        true
    }

    /// Replace a column's values, or append the column if it does not exist.
    /// `values` shorter than the table are padded with nulls.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) {
        let col = match self.column_index(name) {
            Some(col) => col,
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.cells.push(Value::Null);
                }
                self.columns.len() - 1
            }
        };
        let mut values = values.into_iter();
        for row in &mut self.rows {
            row.cells[col] = values.next().unwrap_or(Value::Null);
        }
    }

    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(col) = self.column_index(name) else {
            return false;
        };
        self.columns.remove(col);
        for row in &mut self.rows {
            row.cells.remove(col);
        }
        true
    }

    /// Tag every row with the same source.
    pub fn tag(&mut self, source: RowSource) {
        for row in &mut self.rows {
            row.source = Some(source);
        }
    }

    pub fn clear_tags(&mut self) {
        for row in &mut self.rows {
            row.source = None;
        }
    }

    pub fn is_tagged(&self) -> bool {
        self.rows.iter().any(|r| r.source.is_some())
    }

    /// Whether the value normalizer already produced this table.
    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    pub(crate) fn set_normalized(&mut self, normalized: bool) {
        self.normalized = normalized;
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Row> {
        &mut self.rows
    }

    /// Project onto `columns`: shared columns are copied, missing ones are null.
    pub fn aligned_to(&self, columns: &[String]) -> Table {
        if self.columns == columns {
            return self.clone();
        }
        let positions: Vec<Option<usize>> = columns.iter().map(|c| self.column_index(c)).collect();
        let mut out = Table::new(columns.to_vec());
        for row in &self.rows {
            let cells = positions
                .iter()
                .map(|p| p.map(|i| row.cells[i].clone()).unwrap_or(Value::Null))
                .collect();
            out.rows.push(Row { cells, source: row.source });
        }
        out
    }

    /// Stack tables vertically. Columns are the union in first-seen order.
    pub fn concat(parts: impl IntoIterator<Item = Table>) -> Table {
        let parts: Vec<Table> = parts.into_iter().collect();
        let columns = union_columns(parts.iter().map(|p| p.columns()));
        let mut out = Table::new(columns);
        for part in parts {
            if part.columns == out.columns {
                out.rows.extend(part.rows);
            } else {
                let aligned = part.aligned_to(&out.columns);
                out.rows.extend(aligned.rows);
            }
        }
        out
    }

    /// Parse CSV text with a header row. Empty fields become nulls.
    pub fn from_csv_str(data: &str) -> Result<Table, ReconError> {
        Self::from_csv_reader(data.as_bytes(), b',')
    }

    pub fn from_csv_reader<R: std::io::Read>(reader: R, delimiter: u8) -> Result<Table, ReconError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ReconError::Io(e.to_string()))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut table = Table::new(headers);
        for record in reader.records() {
            let record = record.map_err(|e| ReconError::Io(e.to_string()))?;
            let cells = record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Value::Null
                    } else {
                        Value::Text(field.to_string())
                    }
                })
                .collect();
            table.push(cells);
        }
        Ok(table)
    }
}

/// Union of several column lists, first-seen order.
pub fn union_columns<'a>(lists: impl IntoIterator<Item = &'a [String]>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for list in lists {
        for c in list {
            if !columns.contains(c) {
                columns.push(c.clone());
            }
        }
    }
    columns
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for record in self.records() {
            seq.serialize_element(&record)?;
        }
        seq.end()
    }
}

// ---------------------------------------------------------------------------
// Record view
// ---------------------------------------------------------------------------

/// Borrowed view of one row as an ordered field -> value mapping.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> Record<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, field: &str) -> Option<&'a Value> {
        let col = self.table.column_index(field)?;
        Some(&self.table.rows[self.index].cells[col])
    }

    /// Value of `field`, treating an absent column as null.
    pub fn value_or_null(&self, field: &str) -> &'a Value {
        const NULL: &Value = &Value::Null;
        self.get(field).unwrap_or(NULL)
    }

    pub fn source(&self) -> Option<RowSource> {
        self.table.rows[self.index].source
    }

    pub fn cells(&self) -> &'a [Value] {
        &self.table.rows[self.index].cells
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        let table = self.table;
        table
            .columns
            .iter()
            .map(String::as_str)
            .zip(table.rows[self.index].cells.iter())
    }
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.table.width()))?;
        for (field, value) in self.iter() {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}
