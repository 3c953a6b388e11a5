//! Open-addressing hash map whose colliding entries form per-slot circular rings.
//!
//! [`RingMap`] stores all of its entries in one contiguous block of cells. Every occupied cell
//! belongs to exactly one *bucket ring*: the circular, index-linked chain of all entries whose
//! hash selects the same home cell. The ring is rooted at that home cell, so a lookup touches at
//! most the entries that genuinely collide with the key, and an entry parked in a foreign home
//! cell is relocated the moment the cell's native ring needs it.
//!
//! Unoccupied cells are threaded onto a doubly-linked free list through their own storage, which
//! keeps insertion allocation-free until the table grows. Growth is automatic at 75% occupancy
//! unless the map was created with a fixed capacity, in which case exhaustion is reported as
//! [`CapacityFull`] instead.

pub mod hash;
pub mod ring_map;

pub use ring_map::RingMap;

/// `CapacityFull` indicates that a fixed-capacity [`RingMap`] has no cell left for a new entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapacityFull;
