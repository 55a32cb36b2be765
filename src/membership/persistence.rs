//! Persistence layer for membership tables

use crate::error::StorageError;
use crate::membership::MembershipTable;
use crate::types::{MemberId, MemberRecord};
use parking_lot::Mutex;
use std::path::Path;

const RECORD_PREFIX: &[u8] = b"rec:";
const UUID_PREFIX: &[u8] = b"uuid:";

/// Sled-based implementation of MembershipTable
///
/// Records are keyed `rec:{seq}` with a big-endian sequence number from
/// `generate_id`, so key order is insertion order. A `uuid:{bytes}` entry maps each
/// uuid to its sequence number. Every mutation is a single atomic batch, and
/// mutations through one handle are serialized so the uuid lookup and the batch
/// cannot interleave with another writer's.
pub struct SledMembershipTable {
    db: sled::Db,
    write_lock: Mutex<()>,
}

impl SledMembershipTable {
    /// Open (or create) a table at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::Backend(format!("Failed to open sled database: {}", e))
        })?;
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn sequence_of(&self, uuid: &MemberId) -> Result<Option<u64>, StorageError> {
        match self.db.get(uuid_key(uuid))? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    StorageError::IoError(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("Malformed sequence number for member {}", uuid),
                    ))
                })?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
            None => Ok(None),
        }
    }
}

fn record_key(seq: u64) -> Vec<u8> {
    let mut key = RECORD_PREFIX.to_vec();
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn uuid_key(uuid: &MemberId) -> Vec<u8> {
    let mut key = UUID_PREFIX.to_vec();
    key.extend_from_slice(uuid.as_bytes());
    key
}

fn decode_record(bytes: &[u8]) -> Result<MemberRecord, StorageError> {
    bincode::deserialize(bytes).map_err(|e| {
        StorageError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to deserialize member record: {}", e),
        ))
    })
}

impl MembershipTable for SledMembershipTable {
    fn add(&self, record: MemberRecord) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        let seq = match self.sequence_of(&record.uuid)? {
            Some(seq) => seq,
            None => self.db.generate_id()?,
        };
        let value = bincode::serialize(&record).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Failed to serialize member record: {}", e),
            ))
        })?;

        let mut batch = sled::Batch::default();
        batch.insert(record_key(seq), value);
        batch.insert(uuid_key(&record.uuid), seq.to_be_bytes().to_vec());
        self.db.apply_batch(batch)?;
        Ok(())
    }

    fn remove(&self, uuids: &[MemberId]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        let mut batch = sled::Batch::default();
        for uuid in uuids {
            if let Some(seq) = self.sequence_of(uuid)? {
                batch.remove(record_key(seq));
                batch.remove(uuid_key(uuid));
            }
        }
        self.db.apply_batch(batch)?;
        Ok(())
    }

    fn remove_all(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        let mut batch = sled::Batch::default();
        for key in self.db.iter().keys() {
            batch.remove(key?);
        }
        self.db.apply_batch(batch)?;
        Ok(())
    }

    fn get(&self, uuid: &MemberId) -> Result<Option<MemberRecord>, StorageError> {
        let Some(seq) = self.sequence_of(uuid)? else {
            return Ok(None);
        };
        match self.db.get(record_key(seq))? {
            Some(bytes) => Ok(Some(decode_record(&bytes)?)),
            None => Ok(None),
        }
    }

    fn records(&self) -> Result<Vec<MemberRecord>, StorageError> {
        let mut records = Vec::new();
        for item in self.db.scan_prefix(RECORD_PREFIX) {
            let (_, value) = item?;
            records.push(decode_record(&value)?);
        }
        Ok(records)
    }
}
