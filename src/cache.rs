//! Bounded cache of resampled tables.
//!
//! An aggregation point folds its subtree into one composite table and
//! then needs that composite at each neighbor's advertised size. The
//! rescale is linear in the table, so a small least-recently-used cache
//! per source table keeps the recent target sizes around. Entries are
//! invalidated wholesale whenever the source's revision moves.

use std::collections::HashMap;

use crate::table::RouteTable;

/// Default number of target sizes kept per source table.
pub const DEFAULT_RESAMPLE_CAPACITY: usize = 8;

struct CacheEntry {
    table: RouteTable,
    last_used: u64,
}

/// Least-recently-used cache of one table's rescaled copies, keyed by
/// target size.
///
/// One cache serves one logical source table: entries are keyed off the
/// source's revision counter, so feeding tables from different lineages
/// through the same cache would alias. Keep a cache next to each source.
pub struct ResampleCache {
    capacity: usize,
    entries: HashMap<usize, CacheEntry>,
    source_revision: u64,
    source_size: usize,
    /// Logical clock for recency, bumped per lookup.
    tick: u64,
    hits: u64,
    misses: u64,
}

impl ResampleCache {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "resample cache needs room for one entry");
        ResampleCache {
            capacity,
            entries: HashMap::new(),
            source_revision: 0,
            source_size: 0,
            tick: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// The source table at `target_size` slots, cached or computed.
    ///
    /// Asking for the source's own size returns the source itself.
    pub fn resample<'a>(
        &'a mut self,
        source: &'a RouteTable,
        target_size: usize,
    ) -> &'a RouteTable {
        if target_size == source.size() {
            return source;
        }
        if source.revision() != self.source_revision || source.size() != self.source_size {
            self.entries.clear();
            self.source_revision = source.revision();
            self.source_size = source.size();
        }
        self.tick += 1;
        let tick = self.tick;
        if self.entries.contains_key(&target_size) {
            self.hits += 1;
        } else {
            self.misses += 1;
            if self.entries.len() >= self.capacity {
                self.evict_oldest();
            }
        }
        let entry = self.entries.entry(target_size).or_insert_with(|| CacheEntry {
            table: source.resampled(target_size),
            last_used: tick,
        });
        entry.last_used = tick;
        &entry.table
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(&size, _)| size);
        if let Some(size) = oldest {
            self.entries.remove(&size);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl Default for ResampleCache {
    fn default() -> Self {
        ResampleCache::new(DEFAULT_RESAMPLE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;

    fn make_source() -> RouteTable {
        let mut table = RouteTable::default();
        table.add("alpha omega");
        table
    }

    #[test]
    fn test_cache_hits_after_first_resample() {
        let source = make_source();
        let mut cache = ResampleCache::new(4);

        let view = cache.resample(&source, 512);
        assert_eq!(view.size(), 512);
        assert!(view.contains(&Query::new("alpha")));
        assert!(!view.contains(&Query::new("delta")));

        let _ = cache.resample(&source, 512);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_own_size_bypasses_cache() {
        let source = make_source();
        let mut cache = ResampleCache::new(4);
        let view: *const RouteTable = cache.resample(&source, source.size());
        assert!(std::ptr::eq(view, &source));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_revision_change_invalidates_entries() {
        let mut source = make_source();
        let mut cache = ResampleCache::new(4);
        assert!(!cache.resample(&source, 512).contains(&Query::new("jazz")));
        let _ = cache.resample(&source, 256);
        assert_eq!(cache.len(), 2);

        source.add("jazz");
        assert!(cache.resample(&source, 512).contains(&Query::new("jazz")));
        // The stale 256-slot entry went with the invalidation.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_least_recently_used_entry_is_evicted() {
        let source = make_source();
        let mut cache = ResampleCache::new(2);
        assert_eq!(cache.capacity(), 2);
        let _ = cache.resample(&source, 512);
        let _ = cache.resample(&source, 256);
        let _ = cache.resample(&source, 512); // touch 512, making 256 oldest
        let _ = cache.resample(&source, 128); // evicts 256
        assert_eq!(cache.len(), 2);

        let _ = cache.resample(&source, 512); // still cached
        let _ = cache.resample(&source, 256); // gone, recomputed
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 4);
    }
}
