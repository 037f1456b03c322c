//! In-memory containers behind the two storage disciplines.

use std::collections::VecDeque;

use super::error::{StorageError, StorageResult};

/// Container discipline of a storage.
///
/// The storage enforces capacity, mirroring and notification; a discipline
/// only decides which positions are addressable.
pub trait Discipline<E>: Send + 'static {
    const NAME: &'static str;

    /// Whether a capacity policy may let this discipline grow past `max_size`.
    const ALLOWS_OVERFLOW: bool;

    const SUPPORTS_SET: bool;

    fn with_capacity(max_size: usize) -> Self;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Option<&E>;

    /// In-place access, available to both disciplines.
    fn get_mut(&mut self, index: usize) -> Option<&mut E>;

    /// Contents in order, split the way the container stores them.
    fn as_slices(&self) -> (&[E], &[E]);

    /// Whether `index` is a valid insert position right now.
    fn check_insert(&self, index: usize) -> StorageResult<()>;

    fn insert(&mut self, index: usize, entry: E) -> StorageResult<()>;

    fn replace(&mut self, index: usize, entry: E) -> StorageResult<E>;

    fn remove(&mut self, index: usize) -> Option<E>;

    fn iter(&self) -> std::iter::Chain<std::slice::Iter<'_, E>, std::slice::Iter<'_, E>> {
        let (front, back) = self.as_slices();
        front.iter().chain(back.iter())
    }

    fn position(&self, mut pred: impl FnMut(&E) -> bool) -> Option<usize>
    where
        Self: Sized,
    {
        self.iter().position(|e| pred(e))
    }
}

/// Index-addressable list.
pub struct ListItems<E> {
    items: Vec<E>,
}

impl<E: Send + 'static> Discipline<E> for ListItems<E> {
    const NAME: &'static str = "list";
    const ALLOWS_OVERFLOW: bool = true;
    const SUPPORTS_SET: bool = true;

    fn with_capacity(max_size: usize) -> Self {
        Self {
            items: Vec::with_capacity(max_size.min(1024)),
        }
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn get(&self, index: usize) -> Option<&E> {
        self.items.get(index)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut E> {
        self.items.get_mut(index)
    }

    fn as_slices(&self) -> (&[E], &[E]) {
        (&self.items, &[])
    }

    fn check_insert(&self, index: usize) -> StorageResult<()> {
        let len = self.items.len();
        if index > len {
            return Err(StorageError::IndexOutOfBounds { index, len });
        }
        Ok(())
    }

    fn insert(&mut self, index: usize, entry: E) -> StorageResult<()> {
        self.check_insert(index)?;
        self.items.insert(index, entry);
        Ok(())
    }

    fn replace(&mut self, index: usize, entry: E) -> StorageResult<E> {
        let len = self.items.len();
        match self.items.get_mut(index) {
            Some(slot) => Ok(std::mem::replace(slot, entry)),
            None => Err(StorageError::IndexOutOfBounds { index, len }),
        }
    }

    fn remove(&mut self, index: usize) -> Option<E> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }
}

/// FIFO queue: inserts only at the tail, removal anywhere.
pub struct QueueItems<E> {
    items: VecDeque<E>,
}

impl<E: Send + 'static> Discipline<E> for QueueItems<E> {
    const NAME: &'static str = "queue";
    const ALLOWS_OVERFLOW: bool = false;
    const SUPPORTS_SET: bool = false;

    fn with_capacity(max_size: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(max_size.min(1024)),
        }
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn get(&self, index: usize) -> Option<&E> {
        self.items.get(index)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut E> {
        self.items.get_mut(index)
    }

    fn as_slices(&self) -> (&[E], &[E]) {
        self.items.as_slices()
    }

    fn check_insert(&self, index: usize) -> StorageResult<()> {
        if index != self.items.len() {
            return Err(StorageError::UnsupportedOperation(
                "queue storage only inserts at the tail",
            ));
        }
        Ok(())
    }

    fn insert(&mut self, index: usize, entry: E) -> StorageResult<()> {
        self.check_insert(index)?;
        self.items.push_back(entry);
        Ok(())
    }

    fn replace(&mut self, _index: usize, _entry: E) -> StorageResult<E> {
        Err(StorageError::UnsupportedOperation(
            "queue storage does not support set",
        ))
    }

    fn remove(&mut self, index: usize) -> Option<E> {
        match index {
            0 => self.items.pop_front(),
            i if i + 1 == self.items.len() => self.items.pop_back(),
            i => self.items.remove(i),
        }
    }
}
