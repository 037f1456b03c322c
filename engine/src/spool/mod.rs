//! Spool module - durable work storage with file mirroring and restore.
//!
//! ## Module Organization
//!
//! - `entry.rs` - `Entry` trait (id, payload file, explicit encode/decode)
//! - `item.rs` - `UploadItem`, the MessagePack-encoded entry used by the binary
//! - `storage.rs` - `Storage` shared contract, `ListStorage`, `QueueStorage`, `Cursor`
//! - `discipline.rs` - list and FIFO containers behind the storage
//! - `mirror.rs` - one `.dat` file per entry, atomic writes
//! - `restore.rs` - directory scan that rebuilds a storage on open
//! - `listener.rs` - listener registry and fan-out
//! - `policy.rs` - capacity policies (reject, evict)
//! - `config.rs` - `StorageConfig` and environment parsing
//! - `error.rs` - `StorageError`

pub mod config;
pub mod discipline;
pub mod entry;
pub mod error;
pub mod item;
pub mod listener;
pub mod mirror;
pub mod policy;
pub mod restore;
mod storage;

#[cfg(test)]
mod tests;

pub use config::StorageConfig;
pub use discipline::{Discipline, ListItems, QueueItems};
pub use entry::{CodecError, Entry};
pub use error::{StorageError, StorageResult};
pub use item::UploadItem;
pub use listener::{ListenerId, ListenerRegistry, StorageListener};
pub use mirror::FileMirror;
pub use policy::{Admission, CapacityPolicy, EvictOldest, RejectWhenFull};
pub use restore::{RestoreOutcome, RestoreReport, RestoreScanner, RestoreSink};
pub use storage::{Cursor, ListStorage, Position, QueueStorage, Storage, StorageBuilder};
