//! Spool storage tests.

mod restore;

use super::*;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Payload directory plus spool directory, both removed on drop.
struct Dirs {
    payloads: TempDir,
    spool: TempDir,
}

impl Dirs {
    fn new() -> Self {
        Self {
            payloads: TempDir::new().expect("Failed to create payload dir"),
            spool: TempDir::new().expect("Failed to create spool dir"),
        }
    }

    fn spool(&self) -> &Path {
        self.spool.path()
    }

    /// Create a non-empty payload file and an item pointing at it.
    fn item(&self, name: &str) -> UploadItem {
        UploadItem::new(self.payload(name))
    }

    fn payload(&self, name: &str) -> PathBuf {
        let path = self.payloads.path().join(name);
        fs::write(&path, format!("payload {}", name)).expect("Failed to write payload");
        path
    }

    fn dat(&self, name: &str) -> PathBuf {
        self.spool().join(format!("{}.dat", name))
    }

    fn config(&self, max_size: usize) -> StorageConfig {
        StorageConfig {
            directory: self.spool().to_path_buf(),
            max_size,
            sync_enabled: true,
            delete_files_on_remove: false,
            restore_on_start: false,
        }
    }

    fn restore_config(&self, max_size: usize) -> StorageConfig {
        StorageConfig {
            restore_on_start: true,
            ..self.config(max_size)
        }
    }

    /// Mirror `item` into the spool directory with an mtime `age` in the past.
    fn mirror_aged(&self, item: &UploadItem, age: Duration) -> PathBuf {
        let mirror = FileMirror::<UploadItem>::new(self.spool());
        let path = mirror.try_write(item).expect("Failed to write mirror");
        set_mtime(&path, SystemTime::now() - age);
        path
    }

    fn dat_files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.spool())
            .expect("Failed to list spool dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".dat"))
            .collect();
        names.sort();
        names
    }
}

fn set_mtime(path: &Path, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.set_modified(time))
        .expect("Failed to set mtime");
}

fn setup_queue(dirs: &Dirs, max_size: usize) -> QueueStorage<UploadItem> {
    QueueStorage::open(dirs.config(max_size)).expect("Failed to open queue storage")
}

fn setup_list(dirs: &Dirs, max_size: usize) -> ListStorage<UploadItem> {
    ListStorage::open(dirs.config(max_size)).expect("Failed to open list storage")
}

fn memory_queue(max_size: usize) -> QueueStorage<UploadItem> {
    QueueStorage::open(StorageConfig::in_memory(max_size)).expect("Failed to open queue storage")
}

fn ids(items: &[UploadItem]) -> Vec<u64> {
    items.iter().map(|i| i.id).collect()
}

/// Listener that records every notification.
#[derive(Default)]
struct Recorder {
    sizes: Mutex<Vec<(usize, usize)>>,
    restore_started: Mutex<u32>,
    restore_finished: Mutex<Vec<RestoreReport>>,
    errors: Mutex<Vec<String>>,
}

impl StorageListener for Recorder {
    fn on_size_changed(&self, previous: usize, current: usize) {
        self.sizes.lock().push((previous, current));
    }

    fn on_restore_started(&self, _started_at_ms: u64) {
        *self.restore_started.lock() += 1;
    }

    fn on_restore_finished(&self, report: &RestoreReport) {
        self.restore_finished.lock().push(report.clone());
    }

    fn on_storage_error(&self, error: &StorageError) {
        self.errors.lock().push(error.to_string());
    }
}
