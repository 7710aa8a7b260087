//! Keyword route tables.
//!
//! A [`RouteTable`] is a fixed-size bit vector summarizing the keywords a
//! node (or the subtree behind it) can answer queries for. Keywords map
//! to slots through [`crate::hash`]; a set slot means "something here
//! matches this keyword". Matching is conservative: a clear slot proves
//! absence, a set slot only suggests presence.
//!
//! Tables move between neighbors incrementally. [`RouteTable::encode_updates`]
//! diffs the current table against the last transmitted snapshot and
//! emits reset/patch messages; the patch side in [`patch`] applies them
//! to a mirror table, tracking an in-flight sequence across messages.
//!
//! ## Infinity
//!
//! Patch deltas are signed hop counts inherited from distance-vector
//! routing: a keyword becomes present at `1 - infinity` and absent at
//! `infinity - 1`. Modern peers only distinguish present from absent,
//! but the values keep interoperability with peers that still propagate
//! hops, and they decide whether a patch fits in 4-bit entries.

use crate::bits::{resample_into, DenseBits};
use crate::hash::{hash, keyword_end, keyword_start, keywords, prefixes, DEFAULT_DELIMITERS};
use crate::query::{Query, RichQuery};

use std::fmt;

mod encode;
mod patch;


pub use encode::MAX_PATCH_DATA;
pub use patch::PatchError;

/// Default slot count for locally built tables.
pub const DEFAULT_TABLE_SIZE: usize = 65536;

/// Default infinity for patch deltas.
pub const DEFAULT_INFINITY: u8 = 7;

/// Rich-query fields with fewer keywords than this must match every one.
const RICH_PERFECT_MATCH_LIMIT: usize = 3;

/// Fraction of rich-query keywords that must match otherwise.
const RICH_MATCH_THRESHOLD: f64 = 0.67;

/// Cached result of the most recent [`RouteTable::resized`] call.
struct CachedResize {
    table: RouteTable,
}

/// One node's keyword summary.
pub struct RouteTable {
    bits: DenseBits,
    /// Hash width; `2^hash_bits <= bits.size()`.
    hash_bits: u8,
    infinity: u8,
    /// Patch delta announcing a newly present keyword, `1 - infinity`.
    keyword_present: i8,
    /// Patch delta announcing a newly absent keyword, `infinity - 1`.
    keyword_absent: i8,
    /// Bumped on every observable mutation; keys external resample caches.
    revision: u64,
    cached_resize: Option<Box<CachedResize>>,
    /// In-flight inbound patch sequence, if any.
    patch: Option<patch::PatchProgress>,
}

impl RouteTable {
    /// Create an empty table for local use.
    ///
    /// `size` must be a power of two and `infinity` at least 1; violating
    /// either is a programming error and panics.
    pub fn new(size: usize, infinity: u8) -> Self {
        assert!(size.is_power_of_two(), "table size {} not a power of two", size);
        assert!(infinity >= 1, "infinity must be at least 1");
        Self::from_parts(DenseBits::new(size), infinity)
    }

    /// Create an empty table matching a neighbor's reset announcement.
    ///
    /// Remote sizes need not be powers of two; hashing then uses the
    /// largest power of two that fits, leaving the top slots unused.
    pub(crate) fn from_reset(size: usize, infinity: u8) -> Self {
        debug_assert!(size >= 1 && infinity >= 1);
        Self::from_parts(DenseBits::new(size), infinity)
    }

    fn from_parts(bits: DenseBits, infinity: u8) -> Self {
        let size = bits.size();
        debug_assert!(size >= 1);
        RouteTable {
            bits,
            hash_bits: size.ilog2() as u8,
            infinity,
            keyword_present: 1i8.wrapping_sub(infinity as i8),
            keyword_absent: (infinity as i8).wrapping_sub(1),
            revision: 0,
            cached_resize: None,
            patch: None,
        }
    }

    pub fn size(&self) -> usize {
        self.bits.size()
    }

    pub fn infinity(&self) -> u8 {
        self.infinity
    }

    /// Number of set slots.
    pub fn count_ones(&self) -> usize {
        self.bits.count_ones()
    }

    /// Percentage of slots set, 0 to 100.
    pub fn percent_full(&self) -> f64 {
        self.bits.fill_ratio() * 100.0
    }

    /// Mutation counter; changes whenever the table's contents may have.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn slot(&self, word: &str) -> usize {
        hash(word, self.hash_bits) as usize
    }

    fn has_word(&self, word: &str) -> bool {
        self.bits.get(self.slot(word))
    }

    fn mutated(&mut self) {
        self.revision = self.revision.wrapping_add(1);
        self.cached_resize = None;
    }

    // ===== Building =====

    /// Index every keyword of a file path, with prefix expansion.
    pub fn add(&mut self, path: &str) {
        let words = prefixes(keywords(path));
        let mut changed = false;
        for word in &words {
            let slot = self.slot(word);
            if !self.bits.get(slot) {
                self.bits.set(slot);
                changed = true;
            }
        }
        if changed {
            self.mutated();
        }
    }

    /// Index a single keyword without prefix expansion.
    pub fn add_keyword(&mut self, word: &str) {
        let slot = self.slot(word);
        if !self.bits.get(slot) {
            self.bits.set(slot);
            self.mutated();
        }
    }

    /// Index an identifier hashed whole, never tokenized. Used for URNs.
    pub fn add_indivisible(&mut self, identifier: &str) {
        self.add_keyword(identifier);
    }

    /// Merge another table into this one, rescaling as needed.
    ///
    /// Every keyword visible in `other` stays visible here, whatever the
    /// size ratio. This is how an aggregation point folds the tables of
    /// its whole subtree into the summary it advertises upstream.
    pub fn add_all(&mut self, other: &RouteTable) {
        let before = self.bits.count_ones();
        if other.size() == self.size() {
            self.bits.union(&other.bits);
        } else {
            resample_into(&other.bits, &mut self.bits);
        }
        if self.bits.count_ones() != before {
            self.mutated();
        }
    }

    // ===== Resampling =====

    /// A copy of this table rescaled to `new_size` slots.
    pub fn resampled(&self, new_size: usize) -> RouteTable {
        assert!(new_size >= 1, "cannot resample to an empty table");
        let mut bits = DenseBits::new(new_size);
        resample_into(&self.bits, &mut bits);
        RouteTable::from_parts(bits, self.infinity)
    }

    /// Borrow a view of this table at `new_size` slots, caching the most
    /// recent rescale.
    ///
    /// Repeated calls for the same size after the same mutations reuse
    /// the cached copy; any mutation invalidates it. Asking for the
    /// table's own size returns the table itself.
    pub fn resized(&mut self, new_size: usize) -> &RouteTable {
        if new_size == self.size() {
            return self;
        }
        let cached = self
            .cached_resize
            .take()
            .filter(|c| c.table.size() == new_size)
            .unwrap_or_else(|| {
                Box::new(CachedResize {
                    table: self.resampled(new_size),
                })
            });
        &self.cached_resize.insert(cached).table
    }

    // ===== Matching =====

    /// Could anything behind this table match the query?
    ///
    /// `false` is authoritative; `true` may be a hash collision. URN
    /// queries match if any identifier hits. Keyword queries require
    /// every keyword to hit, then the rich part (if present) must clear
    /// its own threshold.
    pub fn contains(&self, query: &Query) -> bool {
        if !query.urns.is_empty() {
            return query.urns.iter().any(|urn| self.has_word(urn));
        }
        if !self.matches_all_keywords(&query.text) {
            return false;
        }
        match &query.rich {
            None => true,
            Some(rich) => self.matches_rich(rich),
        }
    }

    /// AND-match every keyword in `text`, scanning in place. Text with
    /// no keywords matches vacuously.
    fn matches_all_keywords(&self, text: &str) -> bool {
        let mut pos = 0;
        while pos < text.len() {
            let start = keyword_start(text, pos, DEFAULT_DELIMITERS);
            if start >= text.len() {
                break;
            }
            let end = keyword_end(text, start, DEFAULT_DELIMITERS);
            if !self.has_word(&text[start..end]) {
                return false;
            }
            pos = end;
        }
        true
    }

    fn matches_rich(&self, rich: &RichQuery) -> bool {
        // The schema identifier gates the whole rich part.
        if !self.has_word(&rich.schema_uri) {
            return false;
        }
        let mut word_count = 0usize;
        let mut match_count = 0usize;
        for field in &rich.fields {
            let mut pos = 0;
            while pos < field.len() {
                let start = keyword_start(field, pos, DEFAULT_DELIMITERS);
                if start >= field.len() {
                    break;
                }
                let end = keyword_end(field, start, DEFAULT_DELIMITERS);
                word_count += 1;
                if self.has_word(&field[start..end]) {
                    match_count += 1;
                }
                pos = end;
            }
        }
        // Exact fields count as one keyword each, looked up whole.
        for exact in &rich.exact_fields {
            word_count += 1;
            if self.has_word(exact) {
                match_count += 1;
            }
        }
        if word_count < RICH_PERFECT_MATCH_LIMIT {
            word_count == match_count
        } else {
            match_count as f64 / word_count as f64 > RICH_MATCH_THRESHOLD
        }
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        RouteTable::new(DEFAULT_TABLE_SIZE, DEFAULT_INFINITY)
    }
}

/// Snapshots the logical contents; an in-flight patch sequence and the
/// resize cache do not travel with the copy.
impl Clone for RouteTable {
    fn clone(&self) -> Self {
        RouteTable {
            bits: self.bits.clone(),
            hash_bits: self.hash_bits,
            infinity: self.infinity,
            keyword_present: self.keyword_present,
            keyword_absent: self.keyword_absent,
            revision: self.revision,
            cached_resize: None,
            patch: None,
        }
    }
}

/// Compares logical contents only.
impl PartialEq for RouteTable {
    fn eq(&self, other: &Self) -> bool {
        self.infinity == other.infinity && self.bits == other.bits
    }
}

impl Eq for RouteTable {}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RouteTable {{ size: {}, infinity: {}, ones: {}, fill: {:.2}%, patch: ",
            self.size(),
            self.infinity,
            self.count_ones(),
            self.percent_full()
        )?;
        match &self.patch {
            None => write!(f, "idle }}"),
            Some(p) => write!(f, "{}/{} }}", p.last_number, p.sequence_size),
        }
    }
}
