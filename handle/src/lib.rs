//! Stable, generation-stamped handles for the handlekit containers.
//!
//! A [`Handle`] names a logical record owned by one of the handlekit containers. It stays valid
//! while the record is alive, across any growth or reorganization of the container's backing
//! storage, and reliably turns stale once the record is removed: the container stamps every newly
//! occupied slot with a fresh [`Generation`], so a handle whose generation no longer matches the
//! slot's current stamp can never resolve again, even after the slot index has been reused.
//!
//! Internally a handle is an ordinary two-field value. The packed single-`u64` form used to store
//! or transmit handles opaquely exists only at this crate's boundary, via [`Handle::to_bits`] and
//! [`Handle::from_bits`], which split the word into a 24 bit slot index and a 40 bit generation.
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::undocumented_unsafe_blocks)]

use core::fmt;
use core::num::NonZeroU64;

/// Number of low bits holding the slot index in the packed representation.
pub const INDEX_BITS: u32 = 24;

/// Number of high bits holding the generation in the packed representation.
pub const GENERATION_BITS: u32 = 40;

const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;

/// Generation stamp distinguishing successive occupants of the same slot.
///
/// Generations are nonzero. The value zero is reserved by all containers to mean "this slot is
/// empty" and is therefore never part of a live handle, which lets `Option<Generation>` and the
/// packed handle encoding use it as a niche.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(NonZeroU64);

impl Generation {
    /// The generation stamped by a container's very first allocation.
    pub const FIRST: Generation = match NonZeroU64::new(1) {
        Some(value) => Generation(value),
        None => unreachable!(),
    };

    /// The largest generation representable in the packed handle encoding.
    pub const MAX: u64 = (1 << GENERATION_BITS) - 1;

    /// Returns the generation with the given value.
    ///
    /// This returns `None` if and only if the value is zero or does not fit into
    /// [`GENERATION_BITS`] bits.
    #[inline]
    pub fn new(value: u64) -> Option<Generation> {
        if value > Self::MAX {
            return None;
        }
        NonZeroU64::new(value).map(Generation)
    }

    /// Returns the generation's value.
    #[inline]
    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// Returns the generation following this one.
    ///
    /// # Panics
    ///
    /// Panics when the generation space is exhausted, i.e. when `self` is already the largest
    /// representable generation.
    #[inline]
    #[track_caller]
    pub fn next(self) -> Generation {
        match Generation::new(self.get() + 1) {
            Some(generation) => generation,
            None => panic!("generation space exhausted"),
        }
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.get(), f)
    }
}

/// Opaque identity of a logical record: a reusable slot index plus a [`Generation`] stamp.
///
/// Handles are issued by the handlekit containers and are only meaningful to the container
/// instance that issued them. Resolving a handle against a container checks the stored generation
/// of the indexed slot, so a handle to a removed record is detected as stale rather than aliasing
/// the slot's next occupant.
///
/// Handles order by index first and generation second, which makes sorting a batch of handles
/// group them by storage location.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle {
    index: u32,
    generation: Generation,
}

impl Handle {
    /// The largest slot index representable in the packed handle encoding.
    pub const MAX_INDEX: u32 = (1 << INDEX_BITS) - 1;

    /// Creates a handle from a slot index and a generation stamp.
    ///
    /// # Panics
    ///
    /// Panics when `index` exceeds [`Handle::MAX_INDEX`]. Containers never issue such indices;
    /// passing one here is a caller bug.
    #[inline]
    #[track_caller]
    pub fn new(index: u32, generation: Generation) -> Handle {
        assert!(index <= Self::MAX_INDEX);
        Handle { index, generation }
    }

    /// Returns the slot index this handle refers to.
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Returns the generation stamp carried by this handle.
    #[inline]
    pub fn generation(self) -> Generation {
        self.generation
    }

    /// Packs this handle into a single `u64`.
    ///
    /// The generation occupies the high [`GENERATION_BITS`] bits and the index the low
    /// [`INDEX_BITS`] bits. The packed value is never zero, since generations are nonzero.
    #[inline]
    pub fn to_bits(self) -> u64 {
        (self.generation.get() << INDEX_BITS) | self.index as u64
    }

    /// Unpacks a handle previously produced by [`Handle::to_bits`].
    ///
    /// This returns `None` if and only if the generation field of `bits` is zero, which no live
    /// handle ever carries.
    #[inline]
    pub fn from_bits(bits: u64) -> Option<Handle> {
        let generation = Generation::new(bits >> INDEX_BITS)?;
        Some(Handle {
            index: (bits & INDEX_MASK) as u32,
            generation,
        })
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}g{})", self.index, self.generation.get())
    }
}
