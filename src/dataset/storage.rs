//! Filesystem dataset storage
//!
//! Each dataset lives in its own directory below the member directory:
//! `{root}/{handle}/table.bin` for tables, `{root}/{handle}/object.bin` for opaque
//! values. The data file name is the shape tag.
//!
//! Every operation opens a [`DataFile`] for exactly that call. File handles never
//! outlive the call, so a dataset that appears or disappears on disk while a member
//! is loaded is simply seen by the next operation.
//!
//! Mutations hold an exclusive lock on `{root}/.locks/{handle}.lock` for their
//! whole read-modify-write, so concurrent appenders in this or another process
//! serialize instead of overwriting each other. Readers take no lock; renames keep
//! them from seeing a partial file.

use crate::dataset::payload::{Payload, ReadOptions, Table};
use crate::dataset::DatasetStore;
use crate::error::StorageError;
use fs4::FileExt;
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

pub const TABLE_DATAFILE: &str = "table.bin";
pub const OBJECT_DATAFILE: &str = "object.bin";
const LOCK_DIR: &str = ".locks";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataFileKind {
    Table,
    Object,
}

impl DataFileKind {
    fn file_name(self) -> &'static str {
        match self {
            DataFileKind::Table => TABLE_DATAFILE,
            DataFileKind::Object => OBJECT_DATAFILE,
        }
    }

    fn of(payload: &Payload) -> Self {
        match payload {
            Payload::Table(_) => DataFileKind::Table,
            Payload::Opaque(_) => DataFileKind::Object,
        }
    }
}

/// One data file, scoped to a single read or write
struct DataFile {
    path: PathBuf,
    kind: DataFileKind,
}

impl DataFile {
    /// Find the data file in a dataset directory; tables win if both exist
    fn locate(dir: &Path) -> Option<DataFile> {
        [DataFileKind::Table, DataFileKind::Object]
            .into_iter()
            .map(|kind| DataFile {
                path: dir.join(kind.file_name()),
                kind,
            })
            .find(|file| file.path.is_file())
    }

    /// Read and decode; `Ok(None)` if the file vanished since it was located
    fn read(&self) -> Result<Option<Payload>, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match self.kind {
            DataFileKind::Object => Ok(Some(Payload::Opaque(bytes))),
            DataFileKind::Table => {
                let table: Table =
                    bincode::deserialize(&bytes).map_err(|e| StorageError::Corrupt {
                        path: self.path.clone(),
                        reason: e.to_string(),
                    })?;
                table.check().map_err(|e| StorageError::Corrupt {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })?;
                Ok(Some(Payload::Table(table)))
            }
        }
    }

    /// Write atomically: unique temp file in the same directory, then rename
    fn write(dir: &Path, payload: &Payload) -> Result<DataFile, StorageError> {
        let kind = DataFileKind::of(payload);
        let path = dir.join(kind.file_name());

        let bytes = match payload {
            Payload::Opaque(bytes) => bytes.clone(),
            Payload::Table(table) => bincode::serialize(table).map_err(|e| {
                StorageError::IoError(std::io::Error::new(
                    ErrorKind::InvalidData,
                    format!("Failed to serialize table: {}", e),
                ))
            })?,
        };

        fs::create_dir_all(dir)?;
        let temp_path = dir.join(format!(".{}.{}.tmp", kind.file_name(), Uuid::new_v4()));
        fs::write(&temp_path, &bytes)?;
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        Ok(DataFile { path, kind })
    }
}

/// Exclusive lock on one dataset; released when dropped
struct DatasetLock {
    _file: File,
}

impl DatasetLock {
    fn acquire(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self { _file: file })
    }
}

/// Dataset store rooted at a member directory
#[derive(Debug, Clone)]
pub struct FileDatasetStore {
    root: PathBuf,
}

impl FileDatasetStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a dataset, whether it exists or not
    fn dataset_dir(&self, handle: &str) -> Result<PathBuf, StorageError> {
        let mut dir = self.root.clone();
        for part in handle.split('/') {
            if part.is_empty() || part.starts_with('.') {
                return Err(StorageError::InvalidHandle(handle.to_string()));
            }
            dir.push(part);
        }
        Ok(dir)
    }

    /// Take the dataset's write lock, blocking until it is free
    fn lock(&self, handle: &str) -> Result<DatasetLock, StorageError> {
        self.dataset_dir(handle)?;
        let mut path = self.root.join(LOCK_DIR).join(handle).into_os_string();
        path.push(".lock");
        DatasetLock::acquire(Path::new(&path))
    }

    /// Delete the data file and prune directories; caller holds the lock
    fn remove_locked(&self, dir: &Path, file: &DataFile) -> Result<(), StorageError> {
        match fs::remove_file(&file.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.prune_empty_dirs(dir);
        Ok(())
    }

    /// Directory containing a stored dataset, if it exists
    pub fn locate(&self, handle: &str) -> Result<Option<PathBuf>, StorageError> {
        let dir = self.dataset_dir(handle)?;
        Ok(DataFile::locate(&dir).map(|_| dir))
    }

    /// Path for an auxiliary file kept next to a dataset
    ///
    /// The path is built whether or not the file or dataset exists.
    pub fn make_filepath(&self, handle: &str, filename: &str) -> Result<PathBuf, StorageError> {
        Ok(self.dataset_dir(handle)?.join(filename))
    }

    /// Remove empty directories from `dir` up to (not including) the root
    fn prune_empty_dirs(&self, mut dir: &Path) {
        while dir != self.root && dir.starts_with(&self.root) {
            if fs::remove_dir(dir).is_err() {
                break;
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }
}

impl DatasetStore for FileDatasetStore {
    fn handles(&self) -> Result<BTreeSet<String>, StorageError> {
        let mut handles = BTreeSet::new();
        if !self.root.is_dir() {
            return Ok(handles);
        }

        for entry in WalkDir::new(&self.root).min_depth(2) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.io_error().map(|io| io.kind()) == Some(ErrorKind::NotFound) => {
                    continue
                }
                Err(e) => {
                    return Err(StorageError::IoError(std::io::Error::new(
                        ErrorKind::Other,
                        format!("Failed to walk {:?}: {}", self.root, e),
                    )))
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name();
            if name != TABLE_DATAFILE && name != OBJECT_DATAFILE {
                continue;
            }
            let Some(dir) = entry.path().parent() else {
                continue;
            };
            if let Ok(relative) = dir.strip_prefix(&self.root) {
                let handle: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                handles.insert(handle.join("/"));
            }
        }

        Ok(handles)
    }

    fn read(&self, handle: &str, options: &ReadOptions) -> Result<Option<Payload>, StorageError> {
        let dir = self.dataset_dir(handle)?;
        let Some(file) = DataFile::locate(&dir) else {
            return Ok(None);
        };

        match file.read()? {
            Some(Payload::Table(table)) if !options.is_empty() => {
                Ok(Some(Payload::Table(table.select(options)?)))
            }
            other => Ok(other),
        }
    }

    fn write(&self, handle: &str, payload: &Payload) -> Result<(), StorageError> {
        let dir = self.dataset_dir(handle)?;
        let _lock = self.lock(handle)?;
        let written = DataFile::write(&dir, payload)?;

        // A dataset has one shape; drop the data file of the other one.
        for kind in [DataFileKind::Table, DataFileKind::Object] {
            if kind != written.kind {
                match fs::remove_file(dir.join(kind.file_name())) {
                    Ok(()) => debug!(handle, "replaced dataset of a different shape"),
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(())
    }

    fn append(&self, handle: &str, rows: &Table) -> Result<(), StorageError> {
        let dir = self.dataset_dir(handle)?;
        let _lock = self.lock(handle)?;
        let existing = match DataFile::locate(&dir) {
            Some(file) => file.read()?,
            None => None,
        };

        let table = match existing {
            None => rows.clone(),
            Some(Payload::Table(mut table)) => {
                table.append(rows)?;
                table
            }
            Some(Payload::Opaque(_)) => {
                return Err(StorageError::ShapeMismatch(format!(
                    "dataset '{}' is not a table",
                    handle
                )))
            }
        };

        DataFile::write(&dir, &Payload::Table(table))?;
        Ok(())
    }

    fn remove(&self, handle: &str) -> Result<(), StorageError> {
        let dir = self.dataset_dir(handle)?;
        let _lock = self.lock(handle)?;
        let Some(file) = DataFile::locate(&dir) else {
            return Ok(());
        };
        self.remove_locked(&dir, &file)
    }

    fn remove_rows(&self, handle: &str, options: &ReadOptions) -> Result<(), StorageError> {
        let dir = self.dataset_dir(handle)?;
        let _lock = self.lock(handle)?;
        let Some(file) = DataFile::locate(&dir) else {
            return Ok(());
        };

        match file.read()? {
            None => Ok(()),
            Some(Payload::Table(mut table)) if !options.is_empty() => {
                let removed = table.remove_rows(options)?;
                debug!(handle, removed, "rows removed from dataset");
                DataFile::write(&dir, &Payload::Table(table))?;
                Ok(())
            }
            // Opaque values have no rows; the whole dataset goes.
            Some(_) => self.remove_locked(&dir, &file),
        }
    }

    fn contains(&self, handle: &str) -> Result<bool, StorageError> {
        Ok(self.locate(handle)?.is_some())
    }
}
