//! Dataset payloads
//!
//! Every stored dataset is one of two shapes: a uniform rectangular [`Table`] with an
//! index axis, or an opaque byte blob. The shape is an explicit tag rather than
//! something inferred from the value at runtime.

use crate::error::StorageError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

/// A single table cell or index label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for Cell {
    fn from(v: bool) -> Self {
        Cell::Bool(v)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("null"),
            Cell::Bool(v) => write!(f, "{}", v),
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(v) => f.write_str(v),
        }
    }
}

impl Cell {
    /// Order two cells; ints and floats compare numerically, other mixes do not
    pub fn compare(&self, other: &Cell) -> Option<Ordering> {
        match (self, other) {
            (Cell::Null, Cell::Null) => Some(Ordering::Equal),
            (Cell::Bool(a), Cell::Bool(b)) => Some(a.cmp(b)),
            (Cell::Int(a), Cell::Int(b)) => Some(a.cmp(b)),
            (Cell::Int(a), Cell::Float(b)) => (*a as f64).partial_cmp(b),
            (Cell::Float(a), Cell::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Cell::Float(a), Cell::Float(b)) => a.partial_cmp(b),
            (Cell::Text(a), Cell::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Shape family of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    /// Named columns
    Frame,
    /// A single value column
    Series,
}

/// Uniform rectangular table with an index axis
///
/// Invariants: `index.len() == rows.len()`, every row has `columns.len()` cells,
/// column names are unique, and a `Series` has exactly one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    kind: TableKind,
    columns: Vec<String>,
    index: Vec<Cell>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Build a frame with an explicit index
    pub fn frame(
        columns: Vec<String>,
        index: Vec<Cell>,
        rows: Vec<Vec<Cell>>,
    ) -> Result<Self, StorageError> {
        let table = Table {
            kind: TableKind::Frame,
            columns,
            index,
            rows,
        };
        table.check()?;
        Ok(table)
    }

    /// Build a frame indexed by row position
    pub fn frame_from_rows(
        columns: Vec<String>,
        rows: Vec<Vec<Cell>>,
    ) -> Result<Self, StorageError> {
        let index = range_index(rows.len());
        Self::frame(columns, index, rows)
    }

    /// Build a series from parallel index and value vectors
    pub fn series(
        name: impl Into<String>,
        index: Vec<Cell>,
        values: Vec<Cell>,
    ) -> Result<Self, StorageError> {
        let table = Table {
            kind: TableKind::Series,
            columns: vec![name.into()],
            index,
            rows: values.into_iter().map(|v| vec![v]).collect(),
        };
        table.check()?;
        Ok(table)
    }

    pub(crate) fn check(&self) -> Result<(), StorageError> {
        if self.kind == TableKind::Series && self.columns.len() != 1 {
            return Err(StorageError::ShapeMismatch(format!(
                "series must have exactly one column, got {}",
                self.columns.len()
            )));
        }
        if self.index.len() != self.rows.len() {
            return Err(StorageError::ShapeMismatch(format!(
                "index has {} labels but table has {} rows",
                self.index.len(),
                self.rows.len()
            )));
        }
        if let Some((pos, row)) = self
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.columns.len())
        {
            return Err(StorageError::ShapeMismatch(format!(
                "row {} has {} cells, expected {}",
                pos,
                row.len(),
                self.columns.len()
            )));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.as_str()) {
                return Err(StorageError::ShapeMismatch(format!(
                    "duplicate column: {}",
                    column
                )));
            }
        }
        Ok(())
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn index(&self) -> &[Cell] {
        &self.index
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, pos: usize) -> Option<&[Cell]> {
        self.rows.get(pos).map(|r| r.as_slice())
    }

    /// Values of one column in row order
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let col = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[col]).collect())
    }

    /// Apply a row range, row filter, and column projection
    ///
    /// Column projection only applies to frames; a series keeps its single column.
    pub fn select(&self, options: &ReadOptions) -> Result<Table, StorageError> {
        let keep = self.matching_rows(options)?;

        let positions: Vec<usize> = match (&options.columns, self.kind) {
            (Some(wanted), TableKind::Frame) => wanted
                .iter()
                .map(|name| self.column_position(name))
                .collect::<Result<_, _>>()?,
            _ => (0..self.columns.len()).collect(),
        };

        Ok(Table {
            kind: self.kind,
            columns: positions.iter().map(|&p| self.columns[p].clone()).collect(),
            index: keep.iter().map(|&r| self.index[r].clone()).collect(),
            rows: keep
                .iter()
                .map(|&r| positions.iter().map(|&p| self.rows[r][p].clone()).collect())
                .collect(),
        })
    }

    /// Drop the rows selected by the row range and filter; returns how many went
    pub fn remove_rows(&mut self, options: &ReadOptions) -> Result<usize, StorageError> {
        let doomed: HashSet<usize> = self.matching_rows(options)?.into_iter().collect();

        let index = std::mem::take(&mut self.index);
        let rows = std::mem::take(&mut self.rows);
        for (pos, (label, row)) in index.into_iter().zip(rows).enumerate() {
            if !doomed.contains(&pos) {
                self.index.push(label);
                self.rows.push(row);
            }
        }
        Ok(doomed.len())
    }

    /// Positions of rows inside the range that pass the filter
    fn matching_rows(&self, options: &ReadOptions) -> Result<Vec<usize>, StorageError> {
        let len = self.rows.len();
        let stop = options.stop.map_or(len, |s| s.min(len));
        let start = options.start.map_or(0, |s| s.min(stop));

        let Some(filter) = &options.filter else {
            return Ok((start..stop).collect());
        };
        let col = self.column_position(&filter.column)?;
        Ok((start..stop)
            .filter(|&r| filter.matches(&self.rows[r][col]))
            .collect())
    }

    fn column_position(&self, name: &str) -> Result<usize, StorageError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| StorageError::UnknownColumn(name.to_string()))
    }

    /// Append rows from a table of the same shape family and columns
    pub fn append(&mut self, other: &Table) -> Result<(), StorageError> {
        if self.kind != other.kind {
            return Err(StorageError::ShapeMismatch(format!(
                "cannot append {:?} to {:?}",
                other.kind, self.kind
            )));
        }
        if self.columns != other.columns {
            return Err(StorageError::ShapeMismatch(format!(
                "columns differ: {:?} vs {:?}",
                self.columns, other.columns
            )));
        }
        self.index.extend(other.index.iter().cloned());
        self.rows.extend(other.rows.iter().cloned());
        Ok(())
    }
}

fn range_index(len: usize) -> Vec<Cell> {
    (0..len as i64).map(Cell::Int).collect()
}

/// A stored dataset value, tagged by shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Table(Table),
    Opaque(Vec<u8>),
}

impl Payload {
    /// Encode any serializable value as an opaque payload
    pub fn encode_json<T: Serialize>(value: &T) -> Result<Self, StorageError> {
        serde_json::to_vec(value)
            .map(Payload::Opaque)
            .map_err(|e| StorageError::ShapeMismatch(format!("value not serializable: {}", e)))
    }

    /// Decode an opaque payload written by [`Payload::encode_json`]
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, StorageError> {
        match self {
            Payload::Opaque(bytes) => serde_json::from_slice(bytes)
                .map_err(|e| StorageError::ShapeMismatch(format!("undecodable value: {}", e))),
            Payload::Table(_) => Err(StorageError::ShapeMismatch(
                "payload is a table, not an opaque value".to_string(),
            )),
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Payload::Table(t) => Some(t),
            Payload::Opaque(_) => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&[u8]> {
        match self {
            Payload::Opaque(b) => Some(b),
            Payload::Table(_) => None,
        }
    }
}

impl From<Table> for Payload {
    fn from(t: Table) -> Self {
        Payload::Table(t)
    }
}

/// Comparison applied by a [`RowFilter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Row predicate on one column, e.g. `D > 0.3`
///
/// Cells that cannot be ordered against `value` only pass `Ne`.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFilter {
    pub column: String,
    pub op: Compare,
    pub value: Cell,
}

impl RowFilter {
    pub fn new(column: impl Into<String>, op: Compare, value: impl Into<Cell>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn matches(&self, cell: &Cell) -> bool {
        let ordering = cell.compare(&self.value);
        match self.op {
            Compare::Eq => ordering == Some(Ordering::Equal),
            Compare::Ne => ordering != Some(Ordering::Equal),
            Compare::Lt => ordering == Some(Ordering::Less),
            Compare::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            Compare::Gt => ordering == Some(Ordering::Greater),
            Compare::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

/// Options passed through unchanged to each member's read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadOptions {
    /// First row to return
    pub start: Option<usize>,
    /// Row to stop before
    pub stop: Option<usize>,
    /// Columns to return; all when `None`
    pub columns: Option<Vec<String>>,
    /// Rows to keep, checked after the row range
    pub filter: Option<RowFilter>,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(mut self, start: usize) -> Self {
        self.start = Some(start);
        self
    }

    pub fn stop(mut self, stop: usize) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(mut self, filter: RowFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none()
            && self.stop.is_none()
            && self.columns.is_none()
            && self.filter.is_none()
    }
}
