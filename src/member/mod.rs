//! Members
//!
//! A member is a directory on disk marked by a state file. In memory it is a
//! [`Member`] handle composed with the dataset capability it reads and writes
//! through.

pub mod state;

pub use state::MemberState;

use crate::dataset::{DatasetStore, FileDatasetStore};
use crate::error::StorageError;
use crate::types::{MemberId, MemberKind, MemberRecord};
use chrono::Utc;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resolved in-memory handle of a member
pub struct Member {
    state: MemberState,
    location: PathBuf,
    data: Arc<dyn DatasetStore>,
}

impl Member {
    /// Compose a member from its state, location and dataset capability
    pub fn new(state: MemberState, location: PathBuf, data: Arc<dyn DatasetStore>) -> Self {
        Self {
            state,
            location,
            data,
        }
    }

    /// Create a new member directory with a fresh identity
    pub fn create<P: AsRef<Path>>(
        dir: P,
        name: impl Into<String>,
        kind: MemberKind,
    ) -> Result<Self, StorageError> {
        let location = absolute(dir.as_ref())?;
        let state = MemberState {
            uuid: MemberId::new(),
            name: name.into(),
            kind,
            created: Utc::now(),
        };
        state::write_state(&location, &state)?;
        let location = absolute(&location)?;
        let data = Arc::new(FileDatasetStore::new(&location));
        Ok(Self::new(state, location, data))
    }

    /// Load a member from its state file
    pub fn open<P: AsRef<Path>>(state_file: P) -> Result<Self, StorageError> {
        let state_file = state_file.as_ref();
        let state = state::read_state(state_file)?;
        let dir = state_file.parent().ok_or_else(|| StorageError::InvalidStateFile {
            path: state_file.to_path_buf(),
            reason: "state file has no parent directory".to_string(),
        })?;
        let location = absolute(dir)?;
        let data = Arc::new(FileDatasetStore::new(&location));
        Ok(Self::new(state, location, data))
    }

    pub fn uuid(&self) -> MemberId {
        self.state.uuid
    }

    /// Display label; not guaranteed unique within a collection
    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn kind(&self) -> MemberKind {
        self.state.kind
    }

    /// Absolute path of the member directory
    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn state(&self) -> &MemberState {
        &self.state
    }

    /// Dataset access capability
    pub fn data(&self) -> &dyn DatasetStore {
        self.data.as_ref()
    }

    /// Membership record describing this member
    pub fn record(&self) -> MemberRecord {
        MemberRecord::new(self.uuid(), self.kind(), self.location.clone())
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("uuid", &self.state.uuid)
            .field("name", &self.state.name)
            .field("kind", &self.state.kind)
            .field("location", &self.location)
            .finish()
    }
}

/// Absolute form of a path; canonical when the path exists
pub(crate) fn absolute(path: &Path) -> Result<PathBuf, StorageError> {
    match dunce::canonicalize(path) {
        Ok(p) => Ok(p),
        Err(_) => Ok(std::path::absolute(path)?),
    }
}
