//! Membership Table
//!
//! Ordered, uuid-keyed records of the members of a collection. Insertion order is
//! the iteration order callers see. Tables hold plain data only; resolving records
//! into member handles is the collection's job.

pub mod cache;
pub mod memory;
pub mod persistence;

pub use cache::MemberCache;
pub use memory::MemoryMembershipTable;
pub use persistence::SledMembershipTable;

use crate::error::StorageError;
use crate::types::{MemberId, MemberKind, MemberRecord};
use std::path::PathBuf;

/// Membership table interface
///
/// Every mutation is atomic: it either applies fully or leaves the table unchanged.
pub trait MembershipTable: Send + Sync {
    /// Insert a record, or update kind and location of the record with the same uuid
    fn add(&self, record: MemberRecord) -> Result<(), StorageError>;

    /// Delete records by uuid; unknown uuids are ignored
    fn remove(&self, uuids: &[MemberId]) -> Result<(), StorageError>;

    fn remove_all(&self) -> Result<(), StorageError>;

    fn get(&self, uuid: &MemberId) -> Result<Option<MemberRecord>, StorageError>;

    /// All records in table order
    fn records(&self) -> Result<Vec<MemberRecord>, StorageError>;

    fn len(&self) -> Result<usize, StorageError> {
        Ok(self.records()?.len())
    }

    fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    fn uuids(&self) -> Result<Vec<MemberId>, StorageError> {
        Ok(self.records()?.into_iter().map(|r| r.uuid).collect())
    }

    fn kinds(&self) -> Result<Vec<MemberKind>, StorageError> {
        Ok(self.records()?.into_iter().map(|r| r.kind).collect())
    }

    fn locations(&self) -> Result<Vec<PathBuf>, StorageError> {
        Ok(self.records()?.into_iter().map(|r| r.location).collect())
    }
}
