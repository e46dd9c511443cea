//! Bounded pick-ID allocator with least-recently-used reclamation.
//!
//! IDs live in `[0, id_space)` and are handed out lowest-first from a sorted
//! list of disjoint free ranges. Every live ID carries the logical age at which
//! it was last requested; [`IdAllocator::reclaim_older_than`] frees the ones the
//! owner has stopped asking for. The age clock is advanced by the owner (once
//! per frame), never by the allocator itself.

use std::{collections::HashMap, hash::Hash, ops::Range};

/// Largest ID space that still fits a 3-channel 8-bit pick colour.
pub const PICK_ID_SPACE: u32 = 0xFF_FFFF;

#[derive(Debug, Clone, Copy)]
struct Slot {
    id: u32,
    last_used: u64,
}

#[derive(Debug, Clone)]
pub struct IdAllocator<K> {
    id_space: u32,
    slots: HashMap<K, Slot>,
    keys_by_id: HashMap<u32, K>,
    // Sorted by start, pairwise disjoint, never empty ranges
    free: Vec<Range<u32>>,
    age: u64,
}

impl<K: Eq + Hash + Clone> IdAllocator<K> {
    pub fn new(id_space: u32) -> Self {
        let free = if id_space > 0 {
            vec![0..id_space]
        } else {
            Vec::new()
        };

        Self {
            id_space,
            slots: HashMap::new(),
            keys_by_id: HashMap::new(),
            free,
            age: 0,
        }
    }

    /// Returns the ID bound to `key`, binding the lowest free ID if it has none.
    /// `None` means the space is exhausted; nothing is evicted to make room.
    pub fn allocate(&mut self, key: &K) -> Option<u32> {
        if let Some(id) = self.get(key) {
            return Some(id);
        }

        let first = self.free.first_mut()?;
        let id = first.start;
        first.start += 1;
        if first.is_empty() {
            self.free.remove(0);
        }

        self.slots.insert(
            key.clone(),
            Slot {
                id,
                last_used: self.age,
            },
        );
        self.keys_by_id.insert(id, key.clone());

        Some(id)
    }

    /// Unbinds `key` and returns its ID to the free list.
    pub fn release(&mut self, key: &K) -> Option<u32> {
        let slot = self.slots.remove(key)?;
        self.keys_by_id.remove(&slot.id);
        self.insert_free(slot.id);
        Some(slot.id)
    }

    /// Looks up the ID bound to `key` and marks it as used at the current age.
    pub fn get(&mut self, key: &K) -> Option<u32> {
        let age = self.age;
        self.slots.get_mut(key).map(|slot| {
            slot.last_used = age;
            slot.id
        })
    }

    /// Looks up the ID bound to `key` without refreshing it.
    pub fn peek(&self, key: &K) -> Option<u32> {
        self.slots.get(key).map(|slot| slot.id)
    }

    /// Maps an ID read back from a pick frame to the key that owns it.
    pub fn resolve(&self, id: u32) -> Option<&K> {
        self.keys_by_id.get(&id)
    }

    pub fn advance_age(&mut self) -> u64 {
        self.age += 1;
        self.age
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    /// Releases every entry with `age - last_used >= max_age`, scanning from
    /// the least recently used and stopping at the first entry still in use.
    pub fn reclaim_older_than(&mut self, max_age: u64) -> Vec<K> {
        let mut entries: Vec<(K, u64)> = self
            .slots
            .iter()
            .map(|(key, slot)| (key.clone(), slot.last_used))
            .collect();
        entries.sort_by_key(|(_, last_used)| *last_used);

        let mut released = Vec::new();
        for (key, last_used) in entries {
            if self.age - last_used < max_age {
                break;
            }

            self.release(&key);
            released.push(key);
        }

        released
    }

    /// Releases the least recently used entry, provided it was not touched at
    /// the current age. Used by callers that choose to evict on exhaustion.
    pub fn evict_oldest(&mut self) -> Option<(K, u32)> {
        let (key, slot) = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| (slot.last_used, slot.id))
            .map(|(key, slot)| (key.clone(), *slot))?;

        if slot.last_used == self.age {
            return None;
        }

        self.release(&key);
        Some((key, slot.id))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn id_space(&self) -> u32 {
        self.id_space
    }

    pub fn free_ranges(&self) -> &[Range<u32>] {
        &self.free
    }

    pub fn free_count(&self) -> u32 {
        self.free.iter().map(|range| range.end - range.start).sum()
    }

    fn insert_free(&mut self, id: u32) {
        let index = self.free.partition_point(|range| range.start < id);

        let joins_previous = index > 0 && self.free[index - 1].end == id;
        let joins_next = index < self.free.len() && self.free[index].start == id + 1;

        match (joins_previous, joins_next) {
            (true, true) => {
                let next_end = self.free[index].end;
                self.free[index - 1].end = next_end;
                self.free.remove(index);
            }
            (true, false) => self.free[index - 1].end = id + 1,
            (false, true) => self.free[index].start = id,
            (false, false) => self.free.insert(index, id..id + 1),
        }
    }
}

impl<K: Eq + Hash + Clone> Default for IdAllocator<K> {
    fn default() -> Self {
        Self::new(PICK_ID_SPACE)
    }
}
