//! In-memory membership table for non-persistent collections.

use crate::error::StorageError;
use crate::membership::MembershipTable;
use crate::types::{MemberId, MemberRecord};
use parking_lot::RwLock;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct MemoryMembershipTable {
    records: RwLock<Vec<MemberRecord>>,
}

impl MemoryMembershipTable {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MembershipTable for MemoryMembershipTable {
    fn add(&self, record: MemberRecord) -> Result<(), StorageError> {
        let mut records = self.records.write();
        match records.iter_mut().find(|r| r.uuid == record.uuid) {
            Some(existing) => {
                existing.kind = record.kind;
                existing.location = record.location;
            }
            None => records.push(record),
        }
        Ok(())
    }

    fn remove(&self, uuids: &[MemberId]) -> Result<(), StorageError> {
        let doomed: HashSet<&MemberId> = uuids.iter().collect();
        self.records.write().retain(|r| !doomed.contains(&r.uuid));
        Ok(())
    }

    fn remove_all(&self) -> Result<(), StorageError> {
        self.records.write().clear();
        Ok(())
    }

    fn get(&self, uuid: &MemberId) -> Result<Option<MemberRecord>, StorageError> {
        Ok(self.records.read().iter().find(|r| r.uuid == *uuid).cloned())
    }

    fn records(&self) -> Result<Vec<MemberRecord>, StorageError> {
        Ok(self.records.read().clone())
    }

    fn len(&self) -> Result<usize, StorageError> {
        Ok(self.records.read().len())
    }
}
