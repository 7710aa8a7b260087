//! Dense word-backed bit store.

use std::fmt;

use super::BitStore;

const WORD_BITS: usize = 64;

/// Bit store backed by a vector of 64-bit words.
///
/// The logical size is fixed at construction; the word vector may be
/// shorter than the size implies after [`compact`](DenseBits::compact),
/// in which case the missing tail reads as all-clear and grows back on
/// demand.
#[derive(Clone)]
pub struct DenseBits {
    words: Vec<u64>,
    size: usize,
}

impl DenseBits {
    /// Create an all-clear store with `size` bit slots.
    pub fn new(size: usize) -> Self {
        DenseBits {
            words: vec![0; size.div_ceil(WORD_BITS)],
            size,
        }
    }

    /// Number of bit slots.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the bit at `index` is set.
    pub fn get(&self, index: usize) -> bool {
        debug_assert!(index < self.size, "bit index {} out of range", index);
        match self.words.get(index / WORD_BITS) {
            Some(word) => word & (1u64 << (index % WORD_BITS)) != 0,
            None => false,
        }
    }

    /// Set the bit at `index`, regrowing a compacted tail if needed.
    pub fn set(&mut self, index: usize) {
        debug_assert!(index < self.size, "bit index {} out of range", index);
        let word = index / WORD_BITS;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (index % WORD_BITS);
    }

    /// Clear the bit at `index`.
    pub fn clear(&mut self, index: usize) {
        debug_assert!(index < self.size, "bit index {} out of range", index);
        if let Some(word) = self.words.get_mut(index / WORD_BITS) {
            *word &= !(1u64 << (index % WORD_BITS));
        }
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// OR every set bit of `other`, a same-sized store, into `self`.
    pub fn union(&mut self, other: &DenseBits) {
        debug_assert_eq!(self.size, other.size);
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (word, theirs) in self.words.iter_mut().zip(&other.words) {
            *word |= theirs;
        }
    }

    /// Flip every bit of `self` whose position is set in `other`, a
    /// same-sized store.
    pub fn xor(&mut self, other: &DenseBits) {
        debug_assert_eq!(self.size, other.size);
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (word, theirs) in self.words.iter_mut().zip(&other.words) {
            *word ^= theirs;
        }
    }

    /// Fraction of bits set, in `[0, 1]`.
    pub fn fill_ratio(&self) -> f64 {
        if self.size == 0 {
            return 0.0;
        }
        self.count_ones() as f64 / self.size as f64
    }

    /// Drop all-clear trailing words and release spare capacity.
    ///
    /// Purely a storage optimization; the logical contents are unchanged.
    pub fn compact(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
        self.words.shrink_to_fit();
    }

    /// Index of the first set bit at or after `from`, if any.
    pub fn next_set(&self, from: usize) -> Option<usize> {
        if from >= self.size {
            return None;
        }
        let mut wi = from / WORD_BITS;
        if wi >= self.words.len() {
            return None;
        }
        let mut word = self.words[wi] & (!0u64 << (from % WORD_BITS));
        loop {
            if word != 0 {
                let index = wi * WORD_BITS + word.trailing_zeros() as usize;
                return (index < self.size).then_some(index);
            }
            wi += 1;
            if wi >= self.words.len() {
                return None;
            }
            word = self.words[wi];
        }
    }

    /// Index of the first clear bit at or after `from`, if any.
    pub fn next_clear(&self, from: usize) -> Option<usize> {
        if from >= self.size {
            return None;
        }
        let mut wi = from / WORD_BITS;
        if wi >= self.words.len() {
            return Some(from);
        }
        let mut word = !self.words[wi] & (!0u64 << (from % WORD_BITS));
        loop {
            if word != 0 {
                let index = wi * WORD_BITS + word.trailing_zeros() as usize;
                return (index < self.size).then_some(index);
            }
            wi += 1;
            if wi >= self.words.len() {
                let index = wi * WORD_BITS;
                return (index < self.size).then_some(index);
            }
            word = !self.words[wi];
        }
    }
}

impl BitStore for DenseBits {
    fn size(&self) -> usize {
        DenseBits::size(self)
    }

    fn get(&self, index: usize) -> bool {
        DenseBits::get(self, index)
    }

    fn set(&mut self, index: usize) {
        DenseBits::set(self, index)
    }

    fn clear(&mut self, index: usize) {
        DenseBits::clear(self, index)
    }

    fn next_set(&self, from: usize) -> Option<usize> {
        DenseBits::next_set(self, from)
    }

    fn next_clear(&self, from: usize) -> Option<usize> {
        DenseBits::next_clear(self, from)
    }

    fn count_ones(&self) -> usize {
        DenseBits::count_ones(self)
    }

    fn compact(&mut self) {
        DenseBits::compact(self)
    }
}

impl PartialEq for DenseBits {
    fn eq(&self, other: &Self) -> bool {
        if self.size != other.size {
            return false;
        }
        let longest = self.words.len().max(other.words.len());
        (0..longest).all(|i| {
            self.words.get(i).copied().unwrap_or(0) == other.words.get(i).copied().unwrap_or(0)
        })
    }
}

impl Eq for DenseBits {}

impl fmt::Debug for DenseBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DenseBits {{ size: {}, ones: {}, fill: {:.2}% }}",
            self.size,
            self.count_ones(),
            self.fill_ratio() * 100.0
        )
    }
}
