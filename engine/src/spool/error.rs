//! Error taxonomy for spool storage.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Storage error type.
#[derive(Debug)]
pub enum StorageError {
    /// Operation attempted after `release()`
    Disposed,
    /// Insert rejected because the storage is at `max_size`
    CapacityExceeded { max_size: usize },
    /// Operation not supported by the storage discipline
    UnsupportedOperation(&'static str),
    /// A mirror file could not be decoded
    CorruptEntry { path: PathBuf, reason: String },
    /// Mirror or directory I/O failure
    Io(io::Error),
    /// Poll or peek on an empty storage
    EmptyCollection,
    /// Index outside the collection bounds
    IndexOutOfBounds { index: usize, len: usize },
    /// Payload file missing, empty or not a regular file
    InvalidPayload(String),
    /// An entry with the same id (or the same mirror file) is already stored
    DuplicateEntry { id: u64 },
    /// Storage configuration rejected at open time
    InvalidConfig(String),
}

impl StorageError {
    /// Contract violations are caller bugs and are always surfaced as hard errors.
    /// Everything else is a recoverable rejection or a persistence degradation.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            StorageError::Disposed
                | StorageError::UnsupportedOperation(_)
                | StorageError::EmptyCollection
                | StorageError::IndexOutOfBounds { .. }
        )
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Disposed => write!(f, "storage has been released"),
            StorageError::CapacityExceeded { max_size } => {
                write!(f, "storage is full (max_size = {})", max_size)
            }
            StorageError::UnsupportedOperation(op) => write!(f, "unsupported operation: {}", op),
            StorageError::CorruptEntry { path, reason } => {
                write!(f, "corrupt entry {}: {}", path.display(), reason)
            }
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
            StorageError::EmptyCollection => write!(f, "storage is empty"),
            StorageError::IndexOutOfBounds { index, len } => {
                write!(f, "index {} out of bounds (len = {})", index, len)
            }
            StorageError::InvalidPayload(msg) => write!(f, "invalid payload: {}", msg),
            StorageError::DuplicateEntry { id } => write!(f, "entry {} is already stored", id),
            StorageError::InvalidConfig(msg) => write!(f, "invalid storage config: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        StorageError::Io(e)
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
