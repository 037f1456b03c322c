//! Storage configuration.
//!
//! Environment-based configuration for spool directories and capacity.

use std::path::PathBuf;

use super::error::{StorageError, StorageResult};

/// Spool storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding one `.dat` mirror file per entry
    pub directory: PathBuf,
    /// Capacity bound (0 = unbounded)
    pub max_size: usize,
    /// Mirror every mutation to disk
    pub sync_enabled: bool,
    /// Delete the payload file when its entry is removed
    pub delete_files_on_remove: bool,
    /// Rebuild the collection from `directory` when the storage is opened
    pub restore_on_start: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./spool"),
            max_size: 0,
            sync_enabled: true,
            delete_files_on_remove: false,
            restore_on_start: true,
        }
    }
}

impl StorageConfig {
    /// In-memory storage: no mirror, no restore.
    pub fn in_memory(max_size: usize) -> Self {
        Self {
            directory: PathBuf::new(),
            max_size,
            sync_enabled: false,
            delete_files_on_remove: false,
            restore_on_start: false,
        }
    }

    /// Persistent storage rooted at `directory`, restored on open.
    pub fn persistent(directory: impl Into<PathBuf>, max_size: usize) -> Self {
        Self {
            directory: directory.into(),
            max_size,
            ..Self::default()
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            directory: std::env::var("SPOOL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.directory),
            max_size: env_parse("SPOOL_MAX_SIZE").unwrap_or(defaults.max_size),
            sync_enabled: env_flag("SPOOL_SYNC").unwrap_or(defaults.sync_enabled),
            delete_files_on_remove: env_flag("SPOOL_DELETE_PAYLOADS")
                .unwrap_or(defaults.delete_files_on_remove),
            restore_on_start: env_flag("SPOOL_RESTORE").unwrap_or(defaults.restore_on_start),
        }
    }

    /// Check the directory requirements of a persistent storage.
    pub fn validate(&self) -> StorageResult<()> {
        if !self.sync_enabled {
            if self.restore_on_start {
                return Err(StorageError::InvalidConfig(
                    "restore_on_start requires sync_enabled".to_string(),
                ));
            }
            return Ok(());
        }
        if self.directory.as_os_str().is_empty() {
            return Err(StorageError::InvalidConfig(
                "directory is required when sync is enabled".to_string(),
            ));
        }
        if !self.directory.is_dir() {
            return Err(StorageError::InvalidConfig(format!(
                "{} does not exist or is not a directory",
                self.directory.display()
            )));
        }
        Ok(())
    }
}

pub(crate) fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

pub(crate) fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}
