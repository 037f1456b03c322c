//! File mirror: one `.dat` file per entry.
//!
//! Writes go through a temp file in the same directory followed by a
//! rename, so a crash leaves either the old file or the new one.

use std::ffi::OsString;
use std::fs;
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::entry::Entry;
use super::error::{StorageError, StorageResult};

/// Extension of mirror files.
pub const MIRROR_EXTENSION: &str = "dat";

const TEMP_PREFIX: &str = ".spool-";
const TEMP_SUFFIX: &str = ".tmp";

pub struct FileMirror<E> {
    dir: PathBuf,
    _entry: PhantomData<fn() -> E>,
}

impl<E: Entry> FileMirror<E> {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            _entry: PhantomData,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<payload file name>.dat`, or `None` when the entry has no payload.
    pub fn path_for(&self, entry: &E) -> Option<PathBuf> {
        let name = entry.payload_file()?.file_name()?;
        let mut file_name = OsString::from(name);
        file_name.push(".");
        file_name.push(MIRROR_EXTENSION);
        Some(self.dir.join(file_name))
    }

    /// Whether `path` looks like a mirror file (by extension only).
    pub fn is_mirror_file(path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == MIRROR_EXTENSION)
    }

    /// Serialize and atomically write the mirror file.
    pub fn try_write(&self, entry: &E) -> StorageResult<PathBuf> {
        let path = self.path_for(entry).ok_or_else(|| {
            StorageError::InvalidPayload(format!("entry {} has no payload file", entry.id()))
        })?;
        let bytes = entry.encode().map_err(|e| StorageError::CorruptEntry {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StorageError::Io(e.error))?;

        debug!(entry_id = entry.id(), path = %path.display(), bytes = bytes.len(), "Mirror written");
        Ok(path)
    }

    /// Write the mirror file, logging instead of failing.
    pub fn write(&self, entry: &E) -> bool {
        match self.try_write(entry) {
            Ok(_) => true,
            Err(e) => {
                warn!(entry_id = entry.id(), error = %e, "Failed to write mirror file");
                false
            }
        }
    }

    /// Remove the mirror file. Returns `Ok(false)` when it did not exist.
    pub fn try_delete(&self, entry: &E) -> StorageResult<bool> {
        let Some(path) = self.path_for(entry) else {
            return Ok(false);
        };
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    pub fn delete(&self, entry: &E) -> bool {
        match self.try_delete(entry) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(entry_id = entry.id(), error = %e, "Failed to delete mirror file");
                false
            }
        }
    }

    /// Decode one mirror file.
    ///
    /// Zero-length files and undecodable bytes are `CorruptEntry`; failures to
    /// read the file at all are `Io`.
    pub fn read(path: &Path) -> StorageResult<E> {
        let bytes = fs::read(path)?;
        if bytes.is_empty() {
            return Err(StorageError::CorruptEntry {
                path: path.to_path_buf(),
                reason: "zero-length file".to_string(),
            });
        }
        E::decode(&bytes).map_err(|e| StorageError::CorruptEntry {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
