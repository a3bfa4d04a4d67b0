//! Fixed-capacity object pool.
//!
//! A slab allocator with a hard capacity, handing out generation-checked
//! handles: a [`PoolHandle`] is an index plus the generation of the slot it
//! was created from, so use of a handle after its slot has been recycled is
//! detected (`get` returns `None`) instead of silently reading another
//! object's data. Freed slots return to a free list and are reused in LIFO
//! order.

use std::marker::PhantomData;

/// Generation-checked handle into a [`Pool`].
pub struct PoolHandle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PoolHandle<T> {
    /// Slot index, stable for the lifetime of the allocation.
    #[inline]
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl<T> Clone for PoolHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PoolHandle<T> {}

impl<T> PartialEq for PoolHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for PoolHandle<T> {}

impl<T> std::hash::Hash for PoolHandle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> std::fmt::Debug for PoolHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PoolHandle({}v{})", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Fixed-capacity pool of `T`.
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
    capacity: usize,
    /// Pool name used in log messages.
    name: &'static str,
}

impl<T> Pool<T> {
    /// Creates a pool that will never hold more than `capacity` objects.
    #[must_use]
    pub fn new(capacity: usize, name: &'static str) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
            capacity,
            name,
        }
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Allocates a slot for `value`.
    ///
    /// Returns `None` when the pool is at capacity; the caller decides
    /// whether that is fatal.
    pub fn insert(&mut self, value: T) -> Option<PoolHandle<T>> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            self.len += 1;
            return Some(PoolHandle {
                index,
                generation: slot.generation,
                _marker: PhantomData,
            });
        }

        if self.slots.len() >= self.capacity {
            log::error!("{} pool exhausted (capacity {})", self.name, self.capacity);
            return None;
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        self.len += 1;
        Some(PoolHandle {
            index,
            generation: 0,
            _marker: PhantomData,
        })
    }

    /// Returns the slot for `handle`, if it is still the same allocation.
    #[must_use]
    pub fn get(&self, handle: PoolHandle<T>) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    #[must_use]
    pub fn get_mut(&mut self, handle: PoolHandle<T>) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, handle: PoolHandle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Frees the slot, bumping its generation so outstanding handles go stale.
    pub fn remove(&mut self, handle: PoolHandle<T>) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    /// Iterates live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    PoolHandle {
                        index: i as u32,
                        generation: slot.generation,
                        _marker: PhantomData,
                    },
                    value,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PoolHandle<T>, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let generation = slot.generation;
            slot.value.as_mut().map(move |value| {
                (
                    PoolHandle {
                        index: i as u32,
                        generation,
                        _marker: PhantomData,
                    },
                    value,
                )
            })
        })
    }
}
