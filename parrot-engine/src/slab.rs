//! Free-list slab used as the instance pool.
//!
//! Removed entries leave an empty slot that the next insert reuses, so the
//! per-frame hot path does not grow the backing storage once the engine has
//! reached its working set.

use std::mem::swap;

/// Key of an occupied slot. Only valid until the entry is removed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey(u32);

enum Slot<T> {
    Occupied(T),
    Empty(Option<u32>),
}

pub struct Slab<T> {
    entries: Vec<Slot<T>>,
    next_free: Option<u32>,
    count: usize,
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Slab<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Vec::new(), next_free: None, count: 0 }
    }

    #[must_use]
    pub fn get(&self, key: SlotKey) -> Option<&T> {
        match self.entries.get(key.0 as usize)? {
            Slot::Occupied(value) => Some(value),
            Slot::Empty(_) => None,
        }
    }

    #[must_use]
    pub fn get_mut(&mut self, key: SlotKey) -> Option<&mut T> {
        match self.entries.get_mut(key.0 as usize)? {
            Slot::Occupied(value) => Some(value),
            Slot::Empty(_) => None,
        }
    }

    /// Inserts the value, reusing a free slot when there is one.
    ///
    /// # Panics
    /// If the slab would exceed `u32::MAX` entries.
    pub fn insert(&mut self, value: T) -> SlotKey {
        self.count += 1;
        if let Some(key) = self.next_free {
            if let Some(Slot::Empty(next_free)) = self.entries.get(key as usize) {
                self.next_free = *next_free;
                self.entries[key as usize] = Slot::Occupied(value);
                return SlotKey(key);
            }
        }
        let key = u32::try_from(self.entries.len()).expect("slab exceeded u32::MAX entries");
        self.entries.push(Slot::Occupied(value));
        SlotKey(key)
    }

    /// Removes and returns the value for the given key.
    pub fn remove(&mut self, key: SlotKey) -> Option<T> {
        let entry = self.entries.get_mut(key.0 as usize)?;
        if let Slot::Empty(_) = entry {
            return None;
        }
        let mut empty = Slot::Empty(self.next_free);
        swap(entry, &mut empty);
        self.next_free = Some(key.0);
        self.count -= 1;
        match empty {
            Slot::Occupied(value) => Some(value),
            Slot::Empty(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_free = None;
        self.count = 0;
    }
}
