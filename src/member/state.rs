//! Member state files
//!
//! A member directory is marked by a JSON state file named `{Kind}.{uuid}.json`.
//! The name alone identifies the member, so searches can match candidates without
//! opening them.

use crate::error::StorageError;
use crate::types::{MemberId, MemberKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const STATE_EXTENSION: &str = "json";

/// Persisted identity of a member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberState {
    pub uuid: MemberId,
    pub name: String,
    pub kind: MemberKind,
    pub created: DateTime<Utc>,
}

/// State file name for a member
pub fn state_filename(kind: MemberKind, uuid: &MemberId) -> String {
    format!("{}.{}.{}", kind, uuid, STATE_EXTENSION)
}

/// Parse a state file name back into its kind and uuid
pub fn parse_state_filename(name: &str) -> Option<(MemberKind, MemberId)> {
    let stem = name.strip_suffix(STATE_EXTENSION)?.strip_suffix('.')?;
    let (kind, uuid) = stem.split_once('.')?;
    Some((kind.parse().ok()?, uuid.parse().ok()?))
}

/// Read and check a state file
pub fn read_state(path: &Path) -> Result<MemberState, StorageError> {
    let bytes = fs::read(path)?;
    let state: MemberState =
        serde_json::from_slice(&bytes).map_err(|e| StorageError::InvalidStateFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    // The file name is what searches match on; it must agree with the content.
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if parse_state_filename(file_name) != Some((state.kind, state.uuid)) {
        return Err(StorageError::InvalidStateFile {
            path: path.to_path_buf(),
            reason: format!(
                "file name does not match {} {}",
                state.kind, state.uuid
            ),
        });
    }

    Ok(state)
}

/// Write a state file into `dir` atomically and return its path
pub fn write_state(dir: &Path, state: &MemberState) -> Result<PathBuf, StorageError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(state_filename(state.kind, &state.uuid));
    let bytes = serde_json::to_vec_pretty(state).map_err(|e| {
        StorageError::IoError(std::io::Error::new(
            ErrorKind::InvalidData,
            format!("Failed to serialize member state: {}", e),
        ))
    })?;

    let temp_path = dir.join(format!(".state.{}.tmp", Uuid::new_v4()));
    fs::write(&temp_path, &bytes)?;
    if let Err(e) = fs::rename(&temp_path, &path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(path)
}

/// State files directly inside `dir`, sorted by file name
pub fn state_files_in(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry?;
        let is_state = entry
            .file_name()
            .to_str()
            .map_or(false, |n| parse_state_filename(n).is_some());
        if is_state && entry.path().is_file() {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}

/// State file for `uuid` in `dir`, whatever kind it currently has
pub fn find_state_file(dir: &Path, uuid: &MemberId) -> Option<PathBuf> {
    MemberKind::ALL
        .iter()
        .map(|kind| dir.join(state_filename(*kind, uuid)))
        .find(|path| path.is_file())
}

/// State files a user-supplied path refers to
///
/// A path is either a state file itself or a directory holding state files.
/// Nonexistent paths yield nothing.
pub fn discover(path: &Path) -> Result<Vec<PathBuf>, StorageError> {
    if path.is_file() {
        let is_state = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| parse_state_filename(n).is_some());
        return Ok(if is_state {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        });
    }
    if path.is_dir() {
        return state_files_in(path);
    }
    Ok(Vec::new())
}
