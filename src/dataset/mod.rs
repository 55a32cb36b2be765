//! Datasets
//!
//! Per-member named datasets. A member reaches its datasets only through the
//! [`DatasetStore`] capability it was constructed with; the aggregation layer never
//! touches data files directly.

pub mod payload;
pub mod storage;

pub use payload::{Cell, Compare, Payload, ReadOptions, RowFilter, Table, TableKind};
pub use storage::FileDatasetStore;

use crate::error::StorageError;
use std::collections::BTreeSet;

/// Dataset access capability of a single member
pub trait DatasetStore: Send + Sync {
    /// Handles of every dataset currently stored
    fn handles(&self) -> Result<BTreeSet<String>, StorageError>;

    /// Read a dataset; `Ok(None)` when the handle does not exist
    fn read(&self, handle: &str, options: &ReadOptions) -> Result<Option<Payload>, StorageError>;

    /// Store a dataset, replacing any existing one under the same handle
    fn write(&self, handle: &str, payload: &Payload) -> Result<(), StorageError>;

    /// Append rows to a stored table, creating it if absent
    fn append(&self, handle: &str, rows: &Table) -> Result<(), StorageError>;

    /// Delete a dataset; a missing handle is a no-op
    fn remove(&self, handle: &str) -> Result<(), StorageError>;

    /// Delete the rows of a table selected by `options` (row range and filter)
    ///
    /// `columns` does not narrow the removal. Opaque values, and calls without any
    /// options, remove the whole dataset. A missing handle is a no-op.
    fn remove_rows(&self, handle: &str, options: &ReadOptions) -> Result<(), StorageError>;

    fn contains(&self, handle: &str) -> Result<bool, StorageError> {
        Ok(self.handles()?.contains(handle))
    }
}
