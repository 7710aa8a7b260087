//! Bit storage for route tables.
//!
//! A route table is logically a flat run of bits, one per hash slot. The
//! [`BitStore`] trait abstracts the backing representation so the
//! resampling algorithm exists in exactly one copy, and [`DenseBits`] is
//! the production implementation backed by 64-bit words.
//!
//! ## Resampling
//!
//! [`resample_into`] translates set bits between stores of different
//! sizes using only integer arithmetic. It works on maximal runs of set
//! bits rather than individual bits: a run `[i, j)` in a store of `m`
//! bits becomes the run `[i * m2 / m, (j * m2 - 1) / m + 1)` in a store
//! of `m2` bits. Together with the hash interpolation law in
//! [`crate::hash`] this guarantees that a keyword visible in a table at
//! one size stays visible after scaling to any other size.

mod dense;


pub use dense::DenseBits;

/// Backing storage for one route table's bits.
///
/// `index` arguments must be below [`size`](BitStore::size); the scan
/// methods have linear default implementations that concrete stores can
/// override with word-level ones.
pub trait BitStore {
    /// Number of bit slots.
    fn size(&self) -> usize;

    /// Whether the bit at `index` is set.
    fn get(&self, index: usize) -> bool;

    /// Set the bit at `index`.
    fn set(&mut self, index: usize);

    /// Clear the bit at `index`.
    fn clear(&mut self, index: usize);

    /// Index of the first set bit at or after `from`, if any.
    fn next_set(&self, from: usize) -> Option<usize> {
        (from..self.size()).find(|&i| self.get(i))
    }

    /// Index of the first clear bit at or after `from`, if any.
    fn next_clear(&self, from: usize) -> Option<usize> {
        (from..self.size()).find(|&i| !self.get(i))
    }

    /// Number of set bits.
    fn count_ones(&self) -> usize {
        let mut count = 0;
        let mut pos = 0;
        while let Some(index) = self.next_set(pos) {
            count += 1;
            pos = index + 1;
        }
        count
    }

    /// Release spare storage. Logical contents are unchanged.
    fn compact(&mut self) {}

    /// OR every set bit of `other`, a same-sized store, into `self`.
    ///
    /// This walks `other` via [`next_set`](BitStore::next_set), so it
    /// works across backing representations. [`DenseBits`] callers that
    /// hold both stores concretely should prefer the word-wise
    /// [`DenseBits::union`].
    fn union_from(&mut self, other: &dyn BitStore) {
        debug_assert_eq!(self.size(), other.size());
        let mut pos = 0;
        while let Some(index) = other.next_set(pos) {
            self.set(index);
            pos = index + 1;
        }
    }

    /// Flip every bit of `self` whose position is set in `other`, a
    /// same-sized store.
    ///
    /// Same cross-representation contract as
    /// [`union_from`](BitStore::union_from); the concrete fast path is
    /// [`DenseBits::xor`].
    fn xor_from(&mut self, other: &dyn BitStore) {
        debug_assert_eq!(self.size(), other.size());
        let mut pos = 0;
        while let Some(index) = other.next_set(pos) {
            if self.get(index) {
                self.clear(index);
            } else {
                self.set(index);
            }
            pos = index + 1;
        }
    }
}

/// Project every set bit of `src` onto the scale of `dst`.
///
/// Walks maximal set-bit runs in `src` and sets the interpolated run in
/// `dst`. Bits already set in `dst` stay set, so repeated calls merge
/// sources. Both stores must be non-empty; the arithmetic is exact in
/// `u64` for any sizes a 32-bit hash can address.
pub fn resample_into(src: &dyn BitStore, dst: &mut dyn BitStore) {
    let m = src.size() as u64;
    let m2 = dst.size() as u64;
    debug_assert!(m > 0 && m2 > 0);

    let mut pos = 0;
    while let Some(start) = src.next_set(pos) {
        let end = src.next_clear(start).unwrap_or(src.size());
        let lo = (start as u64 * m2 / m) as usize;
        let hi = ((end as u64 * m2 - 1) / m) as usize;
        for bit in lo..=hi {
            dst.set(bit);
        }
        pos = end;
    }
}
