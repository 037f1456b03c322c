//! Storage: the queue-of-record shared by both disciplines.
//!
//! One mutex guards the collection. It is held for the in-memory mutation
//! and for the matching mirror write/delete, so any caller going through the
//! lock sees both or neither. Listener notifications are collected while the
//! lock is held and delivered after it is released.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use super::config::StorageConfig;
use super::discipline::{Discipline, ListItems, QueueItems};
use super::entry::Entry;
use super::error::{StorageError, StorageResult};
use super::item::now_ms;
use super::listener::{ListenerId, ListenerRegistry, StorageListener};
use super::mirror::FileMirror;
use super::policy::{Admission, CapacityPolicy, RejectWhenFull};
use super::restore::{RestoreOutcome, RestoreReport, RestoreScanner, RestoreSink};

/// Ordered-list storage: index-addressable, supports `set`.
pub type ListStorage<E> = Storage<E, ListItems<E>>;

/// FIFO-queue storage: tail insert, dequeue at either end.
pub type QueueStorage<E> = Storage<E, QueueItems<E>>;

/// Insert position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Head,
    Tail,
    Index(usize),
}

impl Position {
    #[inline]
    fn resolve(self, len: usize) -> usize {
        match self {
            Position::Head => 0,
            Position::Tail => len,
            Position::Index(i) => i,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum InsertMode {
    /// Caller insert: capacity policy consulted, mirror written.
    Live,
    /// Restore insert: plain capacity check, no mirror write.
    Restore,
}

/// Notifications gathered under the lock, delivered after it is released.
#[derive(Default)]
struct Changes {
    sizes: Vec<(usize, usize)>,
    errors: Vec<StorageError>,
}

struct Inner<D> {
    items: D,
    ids: HashSet<u64>,
    disposed: bool,
}

struct Shared<E: Entry, D: Discipline<E>> {
    inner: Mutex<Inner<D>>,
    listeners: ListenerRegistry,
    mirror: Option<FileMirror<E>>,
    policy: Box<dyn CapacityPolicy<E>>,
    config: StorageConfig,
}

struct RestoreTask {
    handle: JoinHandle<RestoreReport>,
    cancel: Arc<AtomicBool>,
}

pub struct Storage<E: Entry, D: Discipline<E>> {
    shared: Arc<Shared<E, D>>,
    restore: Mutex<Option<RestoreTask>>,
    last_report: Mutex<Option<RestoreReport>>,
    released: AtomicBool,
}

pub struct StorageBuilder<E: Entry, D: Discipline<E>> {
    config: StorageConfig,
    listeners: Vec<Arc<dyn StorageListener>>,
    policy: Option<Box<dyn CapacityPolicy<E>>>,
    _discipline: PhantomData<fn() -> D>,
}

impl<E: Entry, D: Discipline<E>> StorageBuilder<E, D> {
    /// Register a listener before the restore thread starts, so it sees
    /// the restore notifications.
    pub fn listener(mut self, listener: Arc<dyn StorageListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn policy(mut self, policy: impl CapacityPolicy<E> + 'static) -> Self {
        self.policy = Some(Box::new(policy));
        self
    }

    pub fn open(self) -> StorageResult<Storage<E, D>> {
        self.config.validate()?;

        let mirror = self
            .config
            .sync_enabled
            .then(|| FileMirror::new(self.config.directory.clone()));
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                items: D::with_capacity(self.config.max_size),
                ids: HashSet::new(),
                disposed: false,
            }),
            listeners: ListenerRegistry::new(),
            mirror,
            policy: self.policy.unwrap_or_else(|| Box::new(RejectWhenFull)),
            config: self.config,
        });
        for listener in self.listeners {
            shared.listeners.register(listener);
        }

        let restore = if shared.config.restore_on_start {
            Some(spawn_restore(&shared)?)
        } else {
            None
        };

        info!(
            discipline = D::NAME,
            dir = %shared.config.directory.display(),
            max_size = shared.config.max_size,
            sync = shared.config.sync_enabled,
            restore = shared.config.restore_on_start,
            "Spool storage opened"
        );

        Ok(Storage {
            shared,
            restore: Mutex::new(restore),
            last_report: Mutex::new(None),
            released: AtomicBool::new(false),
        })
    }
}

fn spawn_restore<E: Entry, D: Discipline<E>>(
    shared: &Arc<Shared<E, D>>,
) -> StorageResult<RestoreTask> {
    let cancel = Arc::new(AtomicBool::new(false));
    let task_shared = Arc::clone(shared);
    let task_cancel = Arc::clone(&cancel);
    let handle = thread::Builder::new()
        .name("spool-restore".to_string())
        .spawn(move || {
            let scanner = RestoreScanner::<E>::new(task_shared.config.directory.clone());
            task_shared.listeners.restore_started(now_ms());
            let report = scanner.scan(task_shared.as_ref(), &task_cancel);
            task_shared.listeners.restore_finished(&report);
            report
        })?;
    Ok(RestoreTask { handle, cancel })
}

impl<E: Entry, D: Discipline<E>> Storage<E, D> {
    pub fn builder(config: StorageConfig) -> StorageBuilder<E, D> {
        StorageBuilder {
            config,
            listeners: Vec::new(),
            policy: None,
            _discipline: PhantomData,
        }
    }

    /// Open with the default capacity policy and no initial listeners.
    pub fn open(config: StorageConfig) -> StorageResult<Self> {
        Self::builder(config).open()
    }

    pub fn config(&self) -> &StorageConfig {
        &self.shared.config
    }

    // ============== Insert / Replace ==============

    /// Append `entry`. See [`Storage::insert`].
    pub fn add(&self, entry: E) -> StorageResult<bool> {
        self.insert(Position::Tail, entry)
    }

    /// Insert `entry` at `position`.
    ///
    /// `Ok(false)` when the entry was refused (capacity, invalid payload,
    /// duplicate) or when it was stored but its mirror file could not be
    /// written. Contract violations are returned as errors.
    pub fn insert(&self, position: Position, entry: E) -> StorageResult<bool> {
        let entry_id = entry.id();
        match self.try_insert(position, entry) {
            Ok(mirrored) => Ok(mirrored),
            Err(e) if e.is_contract_violation() => Err(e),
            Err(e) => {
                debug!(entry_id, error = %e, "Spool insert rejected");
                Ok(false)
            }
        }
    }

    pub fn try_add(&self, entry: E) -> StorageResult<bool> {
        self.try_insert(Position::Tail, entry)
    }

    /// Like [`Storage::insert`] but returns the reason for a refusal.
    /// `Ok(false)` means stored without a mirror file.
    pub fn try_insert(&self, position: Position, entry: E) -> StorageResult<bool> {
        let mut changes = Changes::default();
        let result = {
            let mut inner = self.shared.lock_live()?;
            self.shared
                .insert_locked(&mut inner, position, entry, InsertMode::Live, &mut changes)
        };
        self.shared.flush(changes);
        result
    }

    /// Replace the entry at `index`, returning the old one.
    ///
    /// The old mirror file is deleted and the new one written.
    pub fn set(&self, index: usize, entry: E) -> StorageResult<E> {
        if !D::SUPPORTS_SET {
            return Err(StorageError::UnsupportedOperation(
                "queue storage does not support set",
            ));
        }
        let mut changes = Changes::default();
        let result = {
            let mut inner = self.shared.lock_live()?;
            self.shared.set_locked(&mut inner, index, entry, &mut changes)
        };
        self.shared.flush(changes);
        result
    }

    /// Modify the entry with `id` in place and rewrite its mirror file.
    ///
    /// Works on both disciplines since the position does not change. `f` may
    /// not change the id or the payload file. Returns the updated entry, or
    /// `None` when no entry has that id.
    pub fn update(&self, id: u64, f: impl FnOnce(&mut E)) -> StorageResult<Option<E>> {
        let mut changes = Changes::default();
        let result = {
            let mut inner = self.shared.lock_live()?;
            self.shared.update_locked(&mut inner, id, f, &mut changes)
        };
        self.shared.flush(changes);
        result
    }

    // ============== Removal ==============

    /// Remove by value equality. Absent entries are a no-op.
    pub fn remove(&self, entry: &E) -> StorageResult<Option<E>> {
        self.remove_where(|e| e == entry)
    }

    pub fn remove_by_id(&self, id: u64) -> StorageResult<Option<E>> {
        self.remove_where(|e| e.id() == id)
    }

    fn remove_where(&self, pred: impl FnMut(&E) -> bool) -> StorageResult<Option<E>> {
        let mut changes = Changes::default();
        let removed = {
            let mut inner = self.shared.lock_live()?;
            match inner.items.position(pred) {
                Some(index) => self
                    .shared
                    .remove_locked(&mut inner, index, true, &mut changes),
                None => None,
            }
        };
        self.shared.flush(changes);
        Ok(removed)
    }

    pub fn poll_first(&self) -> StorageResult<E> {
        self.poll(|_| 0)
    }

    pub fn poll_last(&self) -> StorageResult<E> {
        self.poll(|len| len - 1)
    }

    fn poll(&self, index: impl FnOnce(usize) -> usize) -> StorageResult<E> {
        let mut changes = Changes::default();
        let polled = {
            let mut inner = self.shared.lock_live()?;
            let len = inner.items.len();
            if len == 0 {
                return Err(StorageError::EmptyCollection);
            }
            self.shared
                .remove_locked(&mut inner, index(len), true, &mut changes)
        };
        self.shared.flush(changes);
        polled.ok_or(StorageError::EmptyCollection)
    }

    /// Remove everything, one entry at a time.
    ///
    /// Each removal is notified separately. Mirror files (and payloads when
    /// `delete_files_on_remove` is set) are only deleted if `delete_files`.
    pub fn clear(&self, delete_files: bool) -> StorageResult<usize> {
        let mut changes = Changes::default();
        let mut removed = 0;
        {
            let mut inner = self.shared.lock_live()?;
            while !inner.items.is_empty() {
                if self
                    .shared
                    .remove_locked(&mut inner, 0, delete_files, &mut changes)
                    .is_some()
                {
                    removed += 1;
                }
            }
        }
        self.shared.flush(changes);
        debug!(removed, delete_files, "Spool storage cleared");
        Ok(removed)
    }

    /// Remove every entry for which `keep` returns false.
    pub fn retain(&self, mut keep: impl FnMut(&E) -> bool) -> StorageResult<usize> {
        let mut cursor = self.cursor()?;
        let mut removed = 0;
        while let Some(entry) = cursor.next() {
            if !keep(entry) {
                cursor.remove();
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Lock the storage and walk it in order.
    ///
    /// The lock is held until the cursor is dropped; do not call other
    /// storage methods while holding it.
    pub fn cursor(&self) -> StorageResult<Cursor<'_, E, D>> {
        let guard = self.shared.lock_live()?;
        Ok(Cursor {
            shared: self.shared.as_ref(),
            guard: Some(guard),
            next: 0,
            current: None,
            changes: Changes::default(),
        })
    }

    // ============== Queries ==============

    pub fn peek_first(&self) -> StorageResult<E> {
        let inner = self.shared.lock_live()?;
        inner
            .items
            .get(0)
            .cloned()
            .ok_or(StorageError::EmptyCollection)
    }

    pub fn peek_last(&self) -> StorageResult<E> {
        let inner = self.shared.lock_live()?;
        let len = inner.items.len();
        if len == 0 {
            return Err(StorageError::EmptyCollection);
        }
        inner
            .items
            .get(len - 1)
            .cloned()
            .ok_or(StorageError::EmptyCollection)
    }

    pub fn get(&self, index: usize) -> StorageResult<E> {
        let inner = self.shared.lock_live()?;
        let len = inner.items.len();
        inner
            .items
            .get(index)
            .cloned()
            .ok_or(StorageError::IndexOutOfBounds { index, len })
    }

    /// First entry matching `pred`, cloned.
    pub fn find(&self, mut pred: impl FnMut(&E) -> bool) -> StorageResult<Option<E>> {
        let inner = self.shared.lock_live()?;
        Ok(inner.items.iter().find(|e| pred(e)).cloned())
    }

    pub fn contains(&self, entry: &E) -> StorageResult<bool> {
        let inner = self.shared.lock_live()?;
        Ok(inner.items.iter().any(|e| e == entry))
    }

    pub fn contains_id(&self, id: u64) -> StorageResult<bool> {
        Ok(self.shared.lock_live()?.ids.contains(&id))
    }

    /// Snapshot of the collection in order.
    pub fn get_all(&self) -> StorageResult<Vec<E>> {
        let inner = self.shared.lock_live()?;
        Ok(inner.items.iter().cloned().collect())
    }

    pub fn len(&self) -> StorageResult<usize> {
        Ok(self.shared.lock_live()?.items.len())
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.shared.lock_live()?.items.is_empty())
    }

    pub fn max_size(&self) -> StorageResult<usize> {
        self.shared.ensure_live()?;
        Ok(self.shared.config.max_size)
    }

    // ============== Listeners ==============

    pub fn register_listener(&self, listener: Arc<dyn StorageListener>) -> StorageResult<ListenerId> {
        self.shared.ensure_live()?;
        Ok(self.shared.listeners.register(listener))
    }

    pub fn unregister_listener(&self, id: ListenerId) -> StorageResult<bool> {
        self.shared.ensure_live()?;
        Ok(self.shared.listeners.unregister(id))
    }

    // ============== Restore / Lifecycle ==============

    pub fn is_restoring(&self) -> bool {
        self.restore
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Block until the restore pass (if any) has finished and return its report.
    pub fn join_restore(&self) -> StorageResult<Option<RestoreReport>> {
        self.shared.ensure_live()?;
        let task = self.restore.lock().take();
        if let Some(task) = task {
            self.store_report(task);
        }
        Ok(self.last_report.lock().clone())
    }

    /// Report of the last completed restore pass.
    pub fn restore_report(&self) -> Option<RestoreReport> {
        self.last_report.lock().clone()
    }

    fn store_report(&self, task: RestoreTask) {
        match task.handle.join() {
            Ok(report) => *self.last_report.lock() = Some(report),
            Err(_) => error!("Spool restore thread panicked"),
        }
    }

    /// Stop the restore thread, drop all listeners and dispose the storage.
    ///
    /// A second call fails with `Disposed`.
    pub fn release(&self) -> StorageResult<()> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Err(StorageError::Disposed);
        }

        let task = self.restore.lock().take();
        if let Some(task) = task {
            task.cancel.store(true, Ordering::SeqCst);
            self.store_report(task);
        }

        self.shared.listeners.clear();
        let remaining = {
            let mut inner = self.shared.inner.lock();
            inner.disposed = true;
            inner.items.len()
        };
        info!(discipline = D::NAME, remaining, "Spool storage released");
        Ok(())
    }
}

impl<E: Entry, D: Discipline<E>> Drop for Storage<E, D> {
    fn drop(&mut self) {
        if let Some(task) = self.restore.get_mut().take() {
            task.cancel.store(true, Ordering::SeqCst);
            if task.handle.join().is_err() {
                error!("Spool restore thread panicked");
            }
        }
    }
}

impl<E: Entry, D: Discipline<E>> Shared<E, D> {
    #[inline]
    fn lock_live(&self) -> StorageResult<MutexGuard<'_, Inner<D>>> {
        let inner = self.inner.lock();
        if inner.disposed {
            return Err(StorageError::Disposed);
        }
        Ok(inner)
    }

    #[inline]
    fn ensure_live(&self) -> StorageResult<()> {
        self.lock_live().map(|_| ())
    }

    fn flush(&self, changes: Changes) {
        for (previous, current) in changes.sizes {
            self.listeners.size_changed(previous, current);
        }
        for error in &changes.errors {
            self.listeners.storage_error(error);
        }
    }

    fn validate_payload(&self, entry: &E) -> StorageResult<()> {
        if self.mirror.is_none() {
            return Ok(());
        }
        let path = entry.payload_file().ok_or_else(|| {
            StorageError::InvalidPayload(format!("entry {} has no payload file", entry.id()))
        })?;
        let metadata = fs::metadata(path).map_err(|e| {
            StorageError::InvalidPayload(format!("{}: {}", path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(StorageError::InvalidPayload(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        if metadata.len() == 0 {
            return Err(StorageError::InvalidPayload(format!(
                "{} is empty",
                path.display()
            )));
        }
        Ok(())
    }

    /// Index of a stored entry mirrored to the same file as `entry`.
    fn mirror_owner(&self, inner: &Inner<D>, entry: &E) -> Option<usize> {
        let mirror = self.mirror.as_ref()?;
        let target = mirror.path_for(entry)?;
        inner
            .items
            .iter()
            .position(|e| mirror.path_for(e).as_deref() == Some(target.as_path()))
    }

    fn check_duplicate(&self, inner: &Inner<D>, entry: &E, skip: Option<usize>) -> StorageResult<()> {
        let id = entry.id();
        let id_taken = match skip.and_then(|i| inner.items.get(i)) {
            Some(replaced) if replaced.id() == id => false,
            _ => inner.ids.contains(&id),
        };
        let mirror_taken = self
            .mirror_owner(inner, entry)
            .is_some_and(|owner| Some(owner) != skip);
        if id_taken || mirror_taken {
            return Err(StorageError::DuplicateEntry { id });
        }
        Ok(())
    }

    fn insert_locked(
        &self,
        inner: &mut Inner<D>,
        position: Position,
        entry: E,
        mode: InsertMode,
        changes: &mut Changes,
    ) -> StorageResult<bool> {
        inner.items.check_insert(position.resolve(inner.items.len()))?;
        self.validate_payload(&entry)?;
        self.check_duplicate(inner, &entry, None)?;

        let max_size = self.config.max_size;
        if max_size > 0 && inner.items.len() >= max_size {
            let admission = match mode {
                InsertMode::Restore => Admission::Reject,
                InsertMode::Live => {
                    let queued: Vec<&E> = inner.items.iter().collect();
                    self.policy.on_full(&entry, &queued)
                }
            };
            match admission {
                Admission::Reject => return Err(StorageError::CapacityExceeded { max_size }),
                Admission::Allow if D::ALLOWS_OVERFLOW => {}
                Admission::Allow => return Err(StorageError::CapacityExceeded { max_size }),
                Admission::Evict(victim) => {
                    let index = inner
                        .items
                        .position(|e| e.id() == victim)
                        .ok_or(StorageError::CapacityExceeded { max_size })?;
                    if let Some(evicted) = self.remove_locked(inner, index, true, changes) {
                        info!(entry_id = evicted.id(), incoming = entry.id(), "Evicted spool entry to make room");
                    }
                }
            }
        }

        let len = inner.items.len();
        let index = match position {
            Position::Index(i) => i.min(len),
            other => other.resolve(len),
        };
        let id = entry.id();
        inner.items.insert(index, entry)?;
        inner.ids.insert(id);
        changes.sizes.push((len, len + 1));
        debug!(entry_id = id, index, discipline = D::NAME, "Spool entry added");

        if mode == InsertMode::Restore {
            return Ok(true);
        }
        let Some(mirror) = self.mirror.as_ref() else {
            return Ok(true);
        };
        let Some(stored) = inner.items.get(index) else {
            return Ok(true);
        };
        match mirror.try_write(stored) {
            Ok(_) => Ok(true),
            Err(e) => {
                error!(entry_id = id, error = %e, "Failed to mirror spool entry, keeping it in memory");
                changes.errors.push(e);
                Ok(false)
            }
        }
    }

    fn set_locked(
        &self,
        inner: &mut Inner<D>,
        index: usize,
        entry: E,
        changes: &mut Changes,
    ) -> StorageResult<E> {
        let len = inner.items.len();
        if index >= len {
            return Err(StorageError::IndexOutOfBounds { index, len });
        }
        self.validate_payload(&entry)?;
        self.check_duplicate(inner, &entry, Some(index))?;

        let new_id = entry.id();
        let old = inner.items.replace(index, entry)?;
        inner.ids.remove(&old.id());
        inner.ids.insert(new_id);
        debug!(old_id = old.id(), new_id, index, "Spool entry replaced");

        if let Some(mirror) = self.mirror.as_ref() {
            if let Err(e) = mirror.try_delete(&old) {
                warn!(entry_id = old.id(), error = %e, "Failed to delete replaced mirror file");
                changes.errors.push(e);
            }
            if let Some(stored) = inner.items.get(index) {
                if let Err(e) = mirror.try_write(stored) {
                    error!(entry_id = new_id, error = %e, "Failed to mirror replacement entry");
                    changes.errors.push(e);
                }
            }
        }
        Ok(old)
    }

    fn update_locked(
        &self,
        inner: &mut Inner<D>,
        id: u64,
        f: impl FnOnce(&mut E),
        changes: &mut Changes,
    ) -> StorageResult<Option<E>> {
        let Some(index) = inner.items.position(|e| e.id() == id) else {
            return Ok(None);
        };
        let Some(slot) = inner.items.get_mut(index) else {
            return Ok(None);
        };
        let mut updated = slot.clone();
        f(&mut updated);
        if updated.id() != id || updated.payload_file() != slot.payload_file() {
            return Err(StorageError::UnsupportedOperation(
                "update may not change the entry id or payload file",
            ));
        }
        *slot = updated.clone();
        debug!(entry_id = id, index, "Spool entry updated");

        if let Some(mirror) = self.mirror.as_ref() {
            if let Err(e) = mirror.try_write(&updated) {
                error!(entry_id = id, error = %e, "Failed to mirror updated entry");
                changes.errors.push(e);
            }
        }
        Ok(Some(updated))
    }

    fn remove_locked(
        &self,
        inner: &mut Inner<D>,
        index: usize,
        delete_files: bool,
        changes: &mut Changes,
    ) -> Option<E> {
        let len = inner.items.len();
        let removed = inner.items.remove(index)?;
        inner.ids.remove(&removed.id());
        changes.sizes.push((len, len - 1));
        debug!(entry_id = removed.id(), index, "Spool entry removed");

        if delete_files {
            if let Some(mirror) = self.mirror.as_ref() {
                if let Err(e) = mirror.try_delete(&removed) {
                    warn!(entry_id = removed.id(), error = %e, "Failed to delete mirror file");
                    changes.errors.push(e);
                }
            }
            if self.config.delete_files_on_remove {
                if let Some(payload) = removed.payload_file() {
                    if let Err(e) = remove_payload(payload) {
                        warn!(entry_id = removed.id(), error = %e, "Failed to delete payload file");
                        changes.errors.push(e);
                    }
                }
            }
        }
        Some(removed)
    }
}

fn remove_payload(path: &Path) -> StorageResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::Io(e)),
    }
}

impl<E: Entry, D: Discipline<E>> RestoreSink<E> for Shared<E, D> {
    fn restore(&self, entry: E) -> RestoreOutcome {
        let mut changes = Changes::default();
        let outcome = {
            let mut inner = match self.lock_live() {
                Ok(inner) => inner,
                Err(e) => return RestoreOutcome::Rejected(e),
            };
            if self.mirror_owner(&inner, &entry).is_some() {
                RestoreOutcome::Superseded
            } else {
                match self.insert_locked(
                    &mut inner,
                    Position::Tail,
                    entry,
                    InsertMode::Restore,
                    &mut changes,
                ) {
                    Ok(_) => RestoreOutcome::Restored,
                    Err(e) => RestoreOutcome::Rejected(e),
                }
            }
        };
        self.flush(changes);
        outcome
    }
}

/// Cursor over a locked storage.
///
/// [`Cursor::remove`] goes through the same mirror deletion and listener
/// notification as [`Storage::remove`]; notifications are delivered when the
/// cursor is dropped and the lock released.
pub struct Cursor<'a, E: Entry, D: Discipline<E>> {
    shared: &'a Shared<E, D>,
    guard: Option<MutexGuard<'a, Inner<D>>>,
    next: usize,
    current: Option<usize>,
    changes: Changes,
}

impl<'a, E: Entry, D: Discipline<E>> Cursor<'a, E, D> {
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&E> {
        let index = self.next;
        let entry = self.guard.as_ref()?.items.get(index)?;
        self.current = Some(index);
        self.next = index + 1;
        Some(entry)
    }

    /// Remove the entry last returned by [`Cursor::next`].
    pub fn remove(&mut self) -> Option<E> {
        let index = self.current.take()?;
        let inner = self.guard.as_mut()?;
        let removed = self
            .shared
            .remove_locked(inner, index, true, &mut self.changes)?;
        self.next = index;
        Some(removed)
    }
}

impl<E: Entry, D: Discipline<E>> Drop for Cursor<'_, E, D> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.shared.flush(std::mem::take(&mut self.changes));
    }
}
