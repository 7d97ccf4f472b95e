// This module implements Pool<T>, the typed object pool that owns every value and
// instruction of a function. Slots are addressed by dense u32 indices so that
// analyses can key bitsets and side tables directly by id. Released slots go onto
// a free list and are handed out again by the next acquire, which keeps the index
// space compact across the many short-lived copies the register allocator inserts.
// Ownership of all pooled objects is scoped to the enclosing Function.

//! Arena with free list for IR objects.

/// Typed pool of objects addressed by dense indices.
#[derive(Debug, Clone)]
pub struct Pool<T> {
    /// Slot storage; `None` marks a released slot.
    slots: Vec<Option<T>>,
    /// Released slot indices available for reuse.
    free_list: Vec<u32>,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }
}

impl<T> Pool<T> {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object and return its slot index.
    pub fn acquire(&mut self, item: T) -> u32 {
        if let Some(idx) = self.free_list.pop() {
            debug_assert!(self.slots[idx as usize].is_none());
            self.slots[idx as usize] = Some(item);
            idx
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(Some(item));
            idx
        }
    }

    /// Take an object out of the pool, making its slot reusable.
    pub fn release(&mut self, idx: u32) -> Option<T> {
        let item = self.slots.get_mut(idx as usize)?.take();
        if item.is_some() {
            self.free_list.push(idx);
        }
        item
    }

    pub fn get(&self, idx: u32) -> Option<&T> {
        self.slots.get(idx as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, idx: u32) -> Option<&mut T> {
        self.slots.get_mut(idx as usize).and_then(Option::as_mut)
    }

    pub fn contains(&self, idx: u32) -> bool {
        self.get(idx).is_some()
    }

    /// Number of slots ever handed out, live or released.
    ///
    /// Every valid index is below this bound.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over live objects with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|item| (i as u32, item)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut T)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| s.as_mut().map(|item| (i as u32, item)))
    }

    /// Indices of live objects, collected so the pool can be mutated while
    /// walking them.
    pub fn ids(&self) -> Vec<u32> {
        self.iter().map(|(i, _)| i).collect()
    }
}
