//! Restore scanner: rebuilds a storage from its mirror directory.
//!
//! Files are replayed oldest-modified first, which approximates
//! enqueue order. Anything that cannot be decoded or is refused by the
//! storage is deleted and counted as discarded. Files without the `.dat`
//! extension are left alone.

use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, info, warn};

use super::entry::Entry;
use super::error::StorageError;
use super::item::now_ms;
use super::mirror::FileMirror;

/// Summary of one restore pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    /// Files deleted because they were unreadable or refused
    pub discarded: usize,
    /// Files kept because a live entry already owns them
    pub superseded: usize,
    pub started_at: u64,
    pub finished_at: u64,
    pub elapsed: Duration,
    /// Stopped early by `release()`
    pub cancelled: bool,
    /// Directory could not be listed or vanished mid-scan. Counts are zero.
    pub failed: bool,
}

/// Result of handing a decoded entry to the storage.
#[derive(Debug)]
pub enum RestoreOutcome {
    Restored,
    /// Refused; the backing file is deleted.
    Rejected(StorageError),
    /// A live entry already owns this mirror file; the file is kept.
    Superseded,
}

/// The no-persist insert path of a storage.
pub trait RestoreSink<E>: Send + Sync {
    fn restore(&self, entry: E) -> RestoreOutcome;
}

pub struct RestoreScanner<E> {
    dir: PathBuf,
    _entry: PhantomData<fn() -> E>,
}

impl<E: Entry> RestoreScanner<E> {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            _entry: PhantomData,
        }
    }

    /// Scan the directory once, feeding entries into `sink`.
    ///
    /// `cancel` is checked before every file.
    pub fn scan(&self, sink: &dyn RestoreSink<E>, cancel: &AtomicBool) -> RestoreReport {
        let timer = Instant::now();
        let mut report = RestoreReport {
            started_at: now_ms(),
            ..Default::default()
        };

        match self.candidates() {
            Ok(files) => self.replay(files, sink, cancel, &mut report),
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Failed to list spool directory");
                report.failed = true;
            }
        }
        if report.failed {
            report.restored = 0;
            report.discarded = 0;
            report.superseded = 0;
        }

        report.finished_at = now_ms();
        report.elapsed = timer.elapsed();
        info!(
            dir = %self.dir.display(),
            restored = report.restored,
            discarded = report.discarded,
            superseded = report.superseded,
            cancelled = report.cancelled,
            failed = report.failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Spool restore finished"
        );
        report
    }

    /// Mirror files in the directory, oldest first.
    fn candidates(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();
        for dirent in fs::read_dir(&self.dir)? {
            let dirent = dirent?;
            let path = dirent.path();
            let metadata = match dirent.metadata() {
                Ok(m) => m,
                // Removed between listing and stat
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            if !metadata.is_file() || !FileMirror::<E>::is_mirror_file(&path) {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((modified, path));
        }
        files.sort();
        Ok(files.into_iter().map(|(_, path)| path).collect())
    }

    fn replay(
        &self,
        files: Vec<PathBuf>,
        sink: &dyn RestoreSink<E>,
        cancel: &AtomicBool,
        report: &mut RestoreReport,
    ) {
        for path in files {
            if cancel.load(Ordering::SeqCst) {
                debug!(dir = %self.dir.display(), "Spool restore cancelled");
                report.cancelled = true;
                return;
            }

            let entry = match FileMirror::<E>::read(&path) {
                Ok(entry) => entry,
                Err(StorageError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                    if !self.dir.is_dir() {
                        warn!(dir = %self.dir.display(), "Spool directory vanished during restore");
                        report.failed = true;
                        return;
                    }
                    continue;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Discarding unreadable spool file");
                    discard(&path);
                    report.discarded += 1;
                    continue;
                }
            };

            entry.on_restored();
            let entry_id = entry.id();
            match sink.restore(entry) {
                RestoreOutcome::Restored => report.restored += 1,
                RestoreOutcome::Rejected(e) => {
                    warn!(entry_id, path = %path.display(), error = %e, "Discarding rejected spool entry");
                    discard(&path);
                    report.discarded += 1;
                }
                RestoreOutcome::Superseded => {
                    debug!(entry_id, path = %path.display(), "Spool file owned by a live entry");
                    report.superseded += 1;
                }
            }
        }
    }
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to delete spool file");
        }
    }
}
