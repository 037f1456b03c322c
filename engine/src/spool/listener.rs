//! Listener registry and notification fan-out.
//!
//! Dispatch copies the registered listeners under the registry lock and
//! invokes them after the lock is released, so a listener may call back into
//! the storage that notified it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::error::StorageError;
use super::restore::RestoreReport;

/// Observer of a storage. Every callback defaults to a no-op.
///
/// Callbacks run synchronously on the mutating thread (or the restore
/// thread) and stall it while they run.
pub trait StorageListener: Send + Sync {
    fn on_size_changed(&self, _previous: usize, _current: usize) {}

    fn on_restore_started(&self, _started_at_ms: u64) {}

    fn on_restore_finished(&self, _report: &RestoreReport) {}

    fn on_storage_error(&self, _error: &StorageError) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<Vec<(ListenerId, Arc<dyn StorageListener>)>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn StorageListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn clear(&self) {
        self.listeners.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn snapshot(&self) -> Vec<Arc<dyn StorageListener>> {
        self.listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect()
    }

    fn dispatch(&self, f: impl Fn(&dyn StorageListener)) {
        for listener in self.snapshot() {
            f(listener.as_ref());
        }
    }

    pub fn size_changed(&self, previous: usize, current: usize) {
        if previous != current {
            self.dispatch(|l| l.on_size_changed(previous, current));
        }
    }

    pub fn restore_started(&self, started_at_ms: u64) {
        self.dispatch(|l| l.on_restore_started(started_at_ms));
    }

    pub fn restore_finished(&self, report: &RestoreReport) {
        self.dispatch(|l| l.on_restore_finished(report));
    }

    pub fn storage_error(&self, error: &StorageError) {
        self.dispatch(|l| l.on_storage_error(error));
    }
}
