use alloc::vec::Vec;
use core::mem;

use super::handle::Handle;

/// A single arena slot. Vacant slots thread the free list: each holds the
/// handle of the next vacant slot, with the list head stored on the arena.
#[derive(Clone)]
enum Slot<T> {
    Occupied(T),
    Vacant(Option<Handle>),
}

impl<T> Slot<T> {
    fn occupied(&self) -> Option<&T> {
        match self {
            Slot::Occupied(element) => Some(element),
            Slot::Vacant(_) => None,
        }
    }

    fn occupied_mut(&mut self) -> Option<&mut T> {
        match self {
            Slot::Occupied(element) => Some(element),
            Slot::Vacant(_) => None,
        }
    }
}

#[derive(Clone)]
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<Handle>,
    vacant: usize,
}

impl<T> Arena<T> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            vacant: 0,
        }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_head: None,
            vacant: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    // Occupancy is tracked by the tree itself; these exist for the model
    // tests below, which audit the vacant-slot bookkeeping directly.
    #[cfg(test)]
    pub(crate) const fn len(&self) -> usize {
        self.slots.len().saturating_sub(self.vacant)
    }

    #[cfg(test)]
    pub(crate) const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn alloc(&mut self, element: T) -> Handle {
        if let Some(handle) = self.free_head {
            // Reuse the most recently freed slot/handle.
            let slot = mem::replace(&mut self.slots[handle.to_index()], Slot::Occupied(element));
            let Slot::Vacant(next) = slot else {
                panic!("`Arena::alloc()` - free list head is occupied!")
            };
            self.free_head = next;
            self.vacant -= 1;
            handle
        } else {
            // Use strict less-than to ensure total element count doesn't exceed Size::MAX.
            // Size::MAX == Handle::MAX, so we need slots.len() < Handle::MAX before push,
            // which means at most Handle::MAX elements after push.
            assert!(
                self.slots.len() < Handle::MAX,
                "`Arena::alloc()` - arena is at maximum capacity ({})",
                Handle::MAX
            );
            // Allocate a new slot/handle.
            self.slots.push(Slot::Occupied(element));
            Handle::from_index(self.slots.len() - 1)
        }
    }

    #[inline]
    pub(crate) fn get(&self, handle: Handle) -> &T {
        self.slots[handle.to_index()].occupied().expect("`Arena::get()` - `handle` is invalid!")
    }

    /// Returns a reference to an element by handle from a raw pointer.
    ///
    /// # Safety
    /// - `ptr` must point to a valid, allocated `Arena<T>`.
    #[inline]
    pub(crate) unsafe fn get_ptr<'a>(ptr: *const Self, handle: Handle) -> &'a T {
        // SAFETY: Caller guarantees ptr is valid. We only read from the slots field.
        // The explicit reference is intentional to index into the Vec.
        unsafe { (&(*ptr).slots)[handle.to_index()].occupied().expect("`Arena::get_ptr()` - `handle` is invalid!") }
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, handle: Handle) -> &mut T {
        self.slots[handle.to_index()].occupied_mut().expect("`Arena::get_mut()` - `handle` is invalid!")
    }

    /// Returns mutable references to two distinct elements at once.
    pub(crate) fn get2_mut(&mut self, a: Handle, b: Handle) -> (&mut T, &mut T) {
        let (i, j) = (a.to_index(), b.to_index());
        assert!(i != j, "`Arena::get2_mut()` - handles are equal!");

        let (low, high) = if i < j { (i, j) } else { (j, i) };
        let (head, tail) = self.slots.split_at_mut(high);
        let first = head[low].occupied_mut().expect("`Arena::get2_mut()` - `handle` is invalid!");
        let second = tail[0].occupied_mut().expect("`Arena::get2_mut()` - `handle` is invalid!");

        if i < j { (first, second) } else { (second, first) }
    }

    pub(crate) fn take(&mut self, handle: Handle) -> T {
        let slot = mem::replace(&mut self.slots[handle.to_index()], Slot::Vacant(self.free_head));
        let Slot::Occupied(element) = slot else {
            panic!("`Arena::take()` - `handle` is invalid!")
        };
        self.free_head = Some(handle);
        self.vacant += 1;
        element
    }

    #[cfg(test)]
    pub(crate) fn free(&mut self, handle: Handle) {
        drop(self.take(handle));
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free_head = None;
        self.vacant = 0;
    }
}
