//! The [`PackedVec`] container and its iterators.
use std::fmt;
use std::iter::FusedIterator;

use handlekit_handle::{Generation, Handle};

use crate::CapacityFull;

/// Sentinel slot index used to terminate the free list.
const NIL: u32 = u32::MAX;

/// Smallest nonzero slot count a growth step produces.
const MIN_CAPACITY: usize = 8;

/// Indirection entry for one slot id.
///
/// The slot ids handed out through handles are decoupled from storage positions: an occupied
/// mapping entry records where its value currently lives, and is updated whenever compaction
/// moves the value.
enum MapSlot {
    Free { next_free: u32 },
    Occupied { generation: Generation, position: u32 },
}

/// Compacting slot allocator handing out stable, generation-stamped [`Handle`]s.
///
/// `PackedVec` offers the same handle contract as [`SlotVec`][crate::SlotVec] and additionally
/// keeps all live values in the gap-free prefix `[0, len)` of one contiguous buffer, exposed
/// through [`as_slice`][PackedVec::as_slice] for consumers that need raw contiguous data, e.g.
/// bulk transfer. Removal fills the vacated position with the value from the last position, and a
/// slot-id indirection (`mapping`, inverted by `reverse`) absorbs the move so previously issued
/// handles keep resolving.
///
/// # Examples
///
/// ```
/// use slot_vec::PackedVec;
///
/// let mut values: PackedVec<&str> = PackedVec::new();
/// let a = values.insert("a").unwrap();
/// let b = values.insert("b").unwrap();
/// let c = values.insert("c").unwrap();
/// assert_eq!(values.as_slice(), ["a", "b", "c"]);
///
/// // removing "a" moves "c" into the vacated position
/// assert_eq!(values.remove(a), Some("a"));
/// assert_eq!(values.as_slice(), ["c", "b"]);
/// assert_eq!(values.key_at(0), Some(c));
/// assert_eq!(values.get(b), Some(&"b"));
/// ```
pub struct PackedVec<T> {
    mapping: Vec<MapSlot>,
    reverse: Vec<u32>,
    data: Vec<T>,
    free_head: u32,
    next_generation: u64,
    locked: bool,
}

impl<T> Default for PackedVec<T> {
    fn default() -> Self {
        PackedVec {
            mapping: Vec::new(),
            reverse: Vec::new(),
            data: Vec::new(),
            free_head: NIL,
            next_generation: 1,
            locked: false,
        }
    }
}

impl<T> PackedVec<T> {
    /// Returns an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an empty allocator with the given number of slots preallocated.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut values = Self::new();
        values.append_free_slots(capacity);
        values.data.reserve_exact(capacity);
        values.reverse.reserve_exact(capacity);
        values
    }

    /// Returns an empty allocator whose capacity is locked at the given number of slots.
    ///
    /// A capacity-locked allocator never grows; once every slot is occupied, further insertions
    /// report [`CapacityFull`] until a value is removed.
    pub fn with_fixed_capacity(capacity: usize) -> Self {
        let mut values = Self::with_capacity(capacity);
        values.locked = true;
        values
    }

    /// Returns the number of live values.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the allocator holds no live values.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the number of slots, occupied or free.
    pub fn capacity(&self) -> usize {
        self.mapping.len()
    }

    /// Returns the live values as one contiguous slice, in physical position order.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Returns the live values as one contiguous mutable slice, in physical position order.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Appends mapping slots up to the given capacity, chaining them onto the free list.
    fn append_free_slots(&mut self, new_capacity: usize) {
        let old_capacity = self.mapping.len();
        if new_capacity <= old_capacity {
            return;
        }
        assert!(
            new_capacity <= Handle::MAX_INDEX as usize + 1,
            "slot index space exhausted"
        );
        self.mapping.reserve_exact(new_capacity - old_capacity);
        for index in old_capacity..new_capacity {
            let next_free = if index + 1 == new_capacity {
                self.free_head
            } else {
                index as u32 + 1
            };
            self.mapping.push(MapSlot::Free { next_free });
        }
        self.free_head = old_capacity as u32;
    }

    /// Grows the slot storage by half, with a minimum of [`MIN_CAPACITY`] slots.
    fn grow(&mut self) {
        let old_capacity = self.mapping.len();
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
        assert!(!self.locked, "reserve on a fixed-capacity PackedVec");
        let free = self.mapping.len() - self.data.len();
        if additional > free {
            let extra = additional - free;
            self.append_free_slots(self.mapping.len() + extra);
        }
        self.data.reserve(additional);
        self.reverse.reserve(additional);
    }

    /// Stamps and returns the next generation of this instance.
    fn bump_generation(&mut self) -> Generation {
        let Some(generation) = Generation::new(self.next_generation) else {
            panic!("generation space exhausted");
        };
        self.next_generation += 1;
        generation
    }

    /// Inserts a value at the end of the packed storage, returning the handle identifying it.
    ///
    /// The only failure is a fully occupied fixed-capacity allocator.
    pub fn insert(&mut self, value: T) -> Result<Handle, CapacityFull> {
        if self.free_head == NIL {
            if self.locked {
                return Err(CapacityFull);
            }
            self.grow();
        }
        let slot = self.free_head;
        let next_free = match &self.mapping[slot as usize] {
            MapSlot::Free { next_free } => *next_free,
            MapSlot::Occupied { .. } => unreachable!("occupied slot on the free list"),
        };
        self.free_head = next_free;
        let generation = self.bump_generation();
        let position = self.data.len() as u32;
        self.mapping[slot as usize] = MapSlot::Occupied { generation, position };
        self.data.push(value);
        self.reverse.push(slot);
        Ok(Handle::new(slot, generation))
    }

    /// Returns the storage position of the value identified by a handle, if it is live.
    fn position_of(&self, handle: Handle) -> Option<usize> {
        match self.mapping.get(handle.index()) {
            Some(MapSlot::Occupied { generation, position })
                if *generation == handle.generation() =>
            {
                Some(*position as usize)
            }
            _ => None,
        }
    }

    /// Returns a reference to the value identified by a handle.
    ///
    /// Stale handles yield `None` even when the slot id has been reused since.
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.position_of(handle).map(|position| &self.data[position])
    }

    /// Returns a mutable reference to the value identified by a handle.
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let position = self.position_of(handle)?;
        Some(&mut self.data[position])
    }

    /// Returns `true` if the handle currently identifies a live value.
    pub fn contains(&self, handle: Handle) -> bool {
        self.position_of(handle).is_some()
    }

    /// Returns the handle of the value stored at a physical position.
    ///
    /// Together with [`as_slice`][PackedVec::as_slice] this pairs contiguous traversal with
    /// handle-based lookups.
    pub fn key_at(&self, position: usize) -> Option<Handle> {
        let slot = *self.reverse.get(position)?;
        match &self.mapping[slot as usize] {
            MapSlot::Occupied { generation, .. } => Some(Handle::new(slot, *generation)),
            MapSlot::Free { .. } => unreachable!("reverse entry points at a free slot"),
        }
    }

    /// Removes the value identified by a handle, keeping the live values contiguous.
    ///
    /// Unless the value already sat at the last position, the value from the last position is
    /// moved into the vacated position and its indirection entries are fixed up. Returns `None`
    /// for stale handles.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let position = self.position_of(handle)?;
        let value = self.data.swap_remove(position);
        self.reverse.swap_remove(position);
        if position < self.data.len() {
            // the former last value now lives at `position`
            let moved_slot = self.reverse[position] as usize;
            match &mut self.mapping[moved_slot] {
                MapSlot::Occupied { position: slot_position, .. } => {
                    *slot_position = position as u32
                }
                MapSlot::Free { .. } => unreachable!("reverse entry points at a free slot"),
            }
        }
        self.mapping[handle.index()] = MapSlot::Free { next_free: self.free_head };
        self.free_head = handle.index() as u32;
        Some(value)
    }

    /// Removes all values and recycles every slot, keeping the allocated memory.
    ///
    /// The generation counter is not reset, so handles issued before the clear stay stale.
    pub fn clear(&mut self) {
        let capacity = self.mapping.len();
        self.data.clear();
        self.reverse.clear();
        self.mapping.clear();
        self.free_head = NIL;
        self.append_free_slots(capacity);
    }

    /// Returns an iterator over all live values in physical position order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { values: self, position: 0 }
    }

    /// Returns an iterator over all live values with mutable references, in physical position
    /// order.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut {
            mapping: &self.mapping,
            reverse: &self.reverse,
            data: self.data.iter_mut().enumerate(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PackedVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Iterator over the live values of a [`PackedVec`], in physical position order.
pub struct Iter<'a, T> {
    values: &'a PackedVec<T>,
    position: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (Handle, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.values.data.get(self.position)?;
        let handle = self.values.key_at(self.position)?;
        self.position += 1;
        Some((handle, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.values.data.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

/// Iterator over the live values of a [`PackedVec`], allowing mutation.
pub struct IterMut<'a, T> {
    mapping: &'a [MapSlot],
    reverse: &'a [u32],
    data: std::iter::Enumerate<std::slice::IterMut<'a, T>>,
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = (Handle, &'a mut T);

    fn next(&mut self) -> Option<Self::Item> {
        let (position, value) = self.data.next()?;
        let slot = self.reverse[position];
        let generation = match &self.mapping[slot as usize] {
            MapSlot::Occupied { generation, .. } => *generation,
            MapSlot::Free { .. } => unreachable!("reverse entry points at a free slot"),
        };
        Some((Handle::new(slot, generation), value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.data.size_hint()
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}
impl<T> FusedIterator for IterMut<'_, T> {}

impl<'a, T> IntoIterator for &'a PackedVec<T> {
    type Item = (Handle, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut PackedVec<T> {
    type Item = (Handle, &'a mut T);
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    impl<T> PackedVec<T> {
        /// Checks the mapping/reverse bijection, the packed prefix and the free list.
        fn audit(&self) {
            assert_eq!(self.data.len(), self.reverse.len());
            let occupied = self
                .mapping
                .iter()
                .filter(|slot| matches!(slot, MapSlot::Occupied { .. }))
                .count();
            assert_eq!(occupied, self.data.len());

            for (position, &slot) in self.reverse.iter().enumerate() {
                match &self.mapping[slot as usize] {
                    MapSlot::Occupied { position: slot_position, .. } => {
                        assert_eq!(
                            *slot_position as usize, position,
                            "mapping and reverse out of sync"
                        );
                    }
                    MapSlot::Free { .. } => panic!("reverse entry points at a free slot"),
                }
            }

            let mut on_free_list = vec![false; self.mapping.len()];
            let mut free = 0;
            let mut index = self.free_head;
            while index != NIL {
                assert!(!on_free_list[index as usize], "free list cycle");
                on_free_list[index as usize] = true;
                free += 1;
                index = match &self.mapping[index as usize] {
                    MapSlot::Free { next_free } => *next_free,
                    MapSlot::Occupied { .. } => panic!("occupied slot on the free list"),
                };
            }
            assert_eq!(occupied + free, self.mapping.len());
        }
    }

    #[test]
    fn removal_compacts_from_the_back() {
        let mut values: PackedVec<&str> = PackedVec::new();
        let a = values.insert("a").unwrap();
        let b = values.insert("b").unwrap();
        let c = values.insert("c").unwrap();
        assert_eq!(values.as_slice(), ["a", "b", "c"]);
        assert_eq!(values.key_at(0), Some(a));
        assert_eq!(values.key_at(1), Some(b));
        assert_eq!(values.key_at(2), Some(c));
        values.audit();

        assert_eq!(values.remove(a), Some("a"));
        values.audit();
        assert_eq!(values.len(), 2);
        assert_eq!(values.as_slice(), ["c", "b"]);
        assert_eq!(values.key_at(0), Some(c));
        assert_eq!(values.key_at(2), None);
        assert_eq!(values.get(a), None);
        assert_eq!(values.get(b), Some(&"b"));
        assert_eq!(values.get(c), Some(&"c"));

        // removing the last position skips the move
        assert_eq!(values.remove(b), Some("b"));
        values.audit();
        assert_eq!(values.as_slice(), ["c"]);

        // removing the only value empties the storage
        assert_eq!(values.remove(c), Some("c"));
        values.audit();
        assert!(values.is_empty());
        assert_eq!(values.key_at(0), None);
    }

    #[test]
    fn stale_handles_never_resolve() {
        let mut values: PackedVec<u32> = PackedVec::new();
        let first = values.insert(1).unwrap();
        assert_eq!(values.remove(first), Some(1));
        let second = values.insert(2).unwrap();
        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());
        assert_eq!(values.get(first), None);
        assert_eq!(values.remove(first), None);
        assert_eq!(values.get(second), Some(&2));
    }

    #[test]
    fn randomized_prefix_stays_packed() {
        let mut rng = Pcg32::seed_from_u64(99);
        let mut values: PackedVec<u64> = PackedVec::new();
        let mut live = Vec::new();
        for step in 0..2000u64 {
            if live.is_empty() || rng.gen_bool(0.6) {
                let handle = values.insert(step).unwrap();
                live.push((handle, step));
            } else {
                let (handle, expected) = live.swap_remove(rng.gen_range(0..live.len()));
                assert_eq!(values.remove(handle), Some(expected));
            }
            values.audit();
            assert_eq!(values.len(), live.len());
            for position in 0..values.len() {
                let handle = values.key_at(position).unwrap();
                assert_eq!(values.get(handle), Some(&values.as_slice()[position]));
            }
        }
        for (handle, expected) in live {
            assert_eq!(values.get(handle), Some(&expected));
        }
    }
}
