//! The [`SlotVec`] container and its iterators.
use std::fmt;
use std::iter::FusedIterator;
use std::mem;

use handlekit_handle::{Generation, Handle};

use crate::CapacityFull;

/// Sentinel slot index used to terminate the free list.
const NIL: u32 = u32::MAX;

/// Smallest nonzero slot count a growth step produces.
const MIN_CAPACITY: usize = 8;

/// One allocation unit.
///
/// A free slot reuses its payload storage to hold the index of the next free slot, so the free
/// list needs no allocation of its own.
enum Slot<T> {
    Free { next_free: u32 },
    Occupied { generation: Generation, value: T },
}

/// Free-list slot allocator handing out stable, generation-stamped [`Handle`]s.
///
/// Values stay at their slot index for their whole lifetime: growth appends slots without
/// relocating existing ones, so a handle stays valid until its value is removed. Removed slots
/// are recycled most-recently-freed first, and every new occupant is stamped with a fresh
/// generation drawn from a counter private to this instance, which is what turns handles to
/// removed values stale.
///
/// # Examples
///
/// ```
/// use slot_vec::SlotVec;
///
/// let mut values: SlotVec<u32> = SlotVec::new();
/// let first = values.insert(10).unwrap();
/// let second = values.insert(20).unwrap();
/// assert_eq!(values.remove(first), Some(10));
/// assert_eq!(values.get(first), None);
/// assert_eq!(values.get(second), Some(&20));
/// ```
pub struct SlotVec<T> {
    slots: Vec<Slot<T>>,
    free_head: u32,
    len: usize,
    next_generation: u64,
    locked: bool,
}

impl<T> Default for SlotVec<T> {
    fn default() -> Self {
        SlotVec {
            slots: Vec::new(),
            free_head: NIL,
            len: 0,
            next_generation: 1,
            locked: false,
        }
    }
}

impl<T> SlotVec<T> {
    /// Returns an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an empty allocator with the given number of slots preallocated.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Self::new();
        slots.append_free_slots(capacity);
        slots
    }

    /// Returns an empty allocator whose capacity is locked at the given number of slots.
    ///
    /// A capacity-locked allocator never grows; once every slot is occupied, further insertions
    /// report [`CapacityFull`] until a value is removed.
    pub fn with_fixed_capacity(capacity: usize) -> Self {
        let mut slots = Self::with_capacity(capacity);
        slots.locked = true;
        slots
    }

    /// Returns the number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the allocator holds no live values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of slots, occupied or free.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Appends slots up to the given capacity, chaining the new slots onto the free list.
    fn append_free_slots(&mut self, new_capacity: usize) {
        let old_capacity = self.slots.len();
        if new_capacity <= old_capacity {
            return;
        }
        assert!(
            new_capacity <= Handle::MAX_INDEX as usize + 1,
            "slot index space exhausted"
        );
        self.slots.reserve_exact(new_capacity - old_capacity);
        for index in old_capacity..new_capacity {
            let next_free = if index + 1 == new_capacity {
                self.free_head
            } else {
                index as u32 + 1
            };
            self.slots.push(Slot::Free { next_free });
        }
        self.free_head = old_capacity as u32;
    }

    /// Grows the slot storage by half, with a minimum of [`MIN_CAPACITY`] slots.
    fn grow(&mut self) {
        let old_capacity = self.slots.len();
        let new_capacity = (old_capacity + old_capacity / 2)
            .max(MIN_CAPACITY)
            .min(Handle::MAX_INDEX as usize + 1);
        assert!(new_capacity > old_capacity, "slot index space exhausted");
        self.append_free_slots(new_capacity);
    }

    /// Ensures at least `additional` further insertions succeed without slot growth.
    ///
    /// # Panics
    ///
    /// Panics when called on a fixed-capacity allocator, which must never grow.
    pub fn reserve(&mut self, additional: usize) {
        assert!(!self.locked, "reserve on a fixed-capacity SlotVec");
        let free = self.slots.len() - self.len;
        if additional > free {
            let extra = additional - free;
            self.append_free_slots(self.slots.len() + extra);
        }
    }

    /// Stamps and returns the next generation of this instance.
    fn bump_generation(&mut self) -> Generation {
        let Some(generation) = Generation::new(self.next_generation) else {
            panic!("generation space exhausted");
        };
        self.next_generation += 1;
        generation
    }

    /// Inserts a value, returning the handle identifying it.
    ///
    /// The slot index may repeat an earlier removal's index, but the handle's generation is
    /// always fresh. The only failure is a fully occupied fixed-capacity allocator.
    pub fn insert(&mut self, value: T) -> Result<Handle, CapacityFull> {
        if self.free_head == NIL {
            if self.locked {
                return Err(CapacityFull);
            }
            self.grow();
        }
        let index = self.free_head;
        let next_free = match &self.slots[index as usize] {
            Slot::Free { next_free } => *next_free,
            Slot::Occupied { .. } => unreachable!("occupied slot on the free list"),
        };
        self.free_head = next_free;
        let generation = self.bump_generation();
        self.slots[index as usize] = Slot::Occupied { generation, value };
        self.len += 1;
        Ok(Handle::new(index, generation))
    }

    /// Returns a reference to the value identified by a handle.
    ///
    /// Stale handles, i.e. handles whose value has been removed, yield `None` even when the slot
    /// index has been reused since.
    pub fn get(&self, handle: Handle) -> Option<&T> {
        match self.slots.get(handle.index()) {
            Some(Slot::Occupied { generation, value }) if *generation == handle.generation() => {
                Some(value)
            }
            _ => None,
        }
    }

    /// Returns a mutable reference to the value identified by a handle.
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        match self.slots.get_mut(handle.index()) {
            Some(Slot::Occupied { generation, value }) if *generation == handle.generation() => {
                Some(value)
            }
            _ => None,
        }
    }

    /// Returns `true` if the handle currently identifies a live value.
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Removes the value identified by a handle and recycles its slot.
    ///
    /// Returns `None` for stale handles, so removing the same handle twice reports the second
    /// removal as a miss.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let index = handle.index();
        match self.slots.get(index) {
            Some(Slot::Occupied { generation, .. }) if *generation == handle.generation() => {}
            _ => return None,
        }
        let slot = mem::replace(
            &mut self.slots[index],
            Slot::Free { next_free: self.free_head },
        );
        self.free_head = index as u32;
        self.len -= 1;
        let Slot::Occupied { value, .. } = slot else {
            unreachable!("removed a free slot")
        };
        Some(value)
    }

    /// Removes all values and recycles every slot, keeping the allocated memory.
    ///
    /// The generation counter is not reset, so handles issued before the clear stay stale.
    pub fn clear(&mut self) {
        let capacity = self.slots.len();
        self.slots.clear();
        self.free_head = NIL;
        self.len = 0;
        self.append_free_slots(capacity);
    }

    /// Returns an iterator over all live values in ascending slot-index order.
    ///
    /// The order reflects storage positions, not insertion order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            slots: self.slots.iter().enumerate(),
            remaining: self.len,
        }
    }

    /// Returns an iterator over all live values with mutable references, in ascending slot-index
    /// order.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut {
            slots: self.slots.iter_mut().enumerate(),
            remaining: self.len,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SlotVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Iterator over the live values of a [`SlotVec`].
pub struct Iter<'a, T> {
    slots: std::iter::Enumerate<std::slice::Iter<'a, Slot<T>>>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (Handle, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (index, slot) = self.slots.next()?;
            if let Slot::Occupied { generation, value } = slot {
                self.remaining -= 1;
                return Some((Handle::new(index as u32, *generation), value));
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

/// Iterator over the live values of a [`SlotVec`], allowing mutation.
pub struct IterMut<'a, T> {
    slots: std::iter::Enumerate<std::slice::IterMut<'a, Slot<T>>>,
    remaining: usize,
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = (Handle, &'a mut T);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (index, slot) = self.slots.next()?;
            if let Slot::Occupied { generation, value } = slot {
                self.remaining -= 1;
                return Some((Handle::new(index as u32, *generation), value));
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}
impl<T> FusedIterator for IterMut<'_, T> {}

impl<'a, T> IntoIterator for &'a SlotVec<T> {
    type Item = (Handle, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut SlotVec<T> {
    type Item = (Handle, &'a mut T);
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
