//! Capacity policies consulted when an insert hits `max_size`.

use super::entry::Entry;

/// Decision of a [`CapacityPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Refuse the incoming entry.
    Reject,
    /// Remove the entry with this id, then insert.
    Evict(u64),
    /// Insert anyway. Only honored by disciplines that may overflow.
    Allow,
}

pub trait CapacityPolicy<E: Entry>: Send + Sync {
    /// `queued` is the current content in storage order.
    fn on_full(&self, incoming: &E, queued: &[&E]) -> Admission;
}

/// Default policy: a full storage refuses new entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectWhenFull;

impl<E: Entry> CapacityPolicy<E> for RejectWhenFull {
    fn on_full(&self, _incoming: &E, _queued: &[&E]) -> Admission {
        Admission::Reject
    }
}

/// Drop the head of the storage to make room.
#[derive(Debug, Default, Clone, Copy)]
pub struct EvictOldest;

impl<E: Entry> CapacityPolicy<E> for EvictOldest {
    fn on_full(&self, _incoming: &E, queued: &[&E]) -> Admission {
        match queued.first() {
            Some(oldest) => Admission::Evict(oldest.id()),
            None => Admission::Reject,
        }
    }
}
