//! Stream handles
//!
//! Handles index a slab of slots. Each slot carries a generation counter that
//! is bumped when the slot is freed, so a stale handle never resolves to a
//! later stream that reuses the slot.

use std::fmt;
use std::mem;

/// Opaque identifier of an open stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle {
    index: u32,
    generation: u32,
}

impl StreamHandle {
    /// Returned when a stream could not be opened; never resolves.
    pub const INVALID: StreamHandle = StreamHandle {
        index: u32::MAX,
        generation: u32::MAX,
    };

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "#{}.{}", self.index, self.generation)
        } else {
            f.write_str("#invalid")
        }
    }
}

#[derive(Debug)]
enum Slot<T> {
    Vacant,
    /// Handed out by `reserve`, stream still opening
    Reserved,
    Occupied(T),
}

#[derive(Debug)]
struct Entry<T> {
    generation: u32,
    slot: Slot<T>,
}

/// Slab of streams addressed by generational handles
#[derive(Debug)]
pub(crate) struct HandleTable<T> {
    entries: Vec<Entry<T>>,
    free: Vec<u32>,
}

impl<T: Clone> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Claim a slot for a stream that is about to be opened.
    pub fn reserve(&mut self) -> StreamHandle {
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.slot = Slot::Reserved;
            return StreamHandle {
                index,
                generation: entry.generation,
            };
        }

        let index = self.entries.len() as u32;
        self.entries.push(Entry {
            generation: 0,
            slot: Slot::Reserved,
        });
        StreamHandle {
            index,
            generation: 0,
        }
    }

    fn entry_mut(&mut self, handle: StreamHandle) -> Option<&mut Entry<T>> {
        self.entries
            .get_mut(handle.index as usize)
            .filter(|entry| entry.generation == handle.generation)
    }

    /// Fill a reserved slot. Returns false if `handle` is not reserved.
    pub fn occupy(&mut self, handle: StreamHandle, value: T) -> bool {
        match self.entry_mut(handle) {
            Some(entry) if matches!(entry.slot, Slot::Reserved) => {
                entry.slot = Slot::Occupied(value);
                true
            }
            _ => false,
        }
    }

    /// Free a reserved or occupied slot, invalidating `handle`.
    pub fn release(&mut self, handle: StreamHandle) -> Option<T> {
        let entry = self.entry_mut(handle)?;
        if matches!(entry.slot, Slot::Vacant) {
            return None;
        }
        let previous = mem::replace(&mut entry.slot, Slot::Vacant);
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(handle.index);

        match previous {
            Slot::Occupied(value) => Some(value),
            _ => None,
        }
    }

    pub fn get(&self, handle: StreamHandle) -> Option<T> {
        let entry = self.entries.get(handle.index as usize)?;
        if entry.generation != handle.generation {
            return None;
        }
        match &entry.slot {
            Slot::Occupied(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// All occupied values
    pub fn values(&self) -> Vec<T> {
        self.entries
            .iter()
            .filter_map(|entry| match &entry.slot {
                Slot::Occupied(value) => Some(value.clone()),
                _ => None,
            })
            .collect()
    }
}
