//! Range-keyed LFU cache for reconstructed radix words.
//!
//! Reconstructing a prefix-compressed run walks sibling entries on both
//! sides of the probed child. The cache remembers the finished word
//! against the span of trie indices the run occupies, so any later probe
//! that lands inside the span is answered without touching the trie.
//! Misses are signalled by `None`; the cache never reports errors.

use crate::storage::BlockType;

/// A cached radix-run descriptor: the run's letters and the inclusive
/// span of trie indices it covers. `hi` is the index of the run's owner,
/// the member that holds the run's children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RadixEntry {
    /// First trie index of the run.
    pub lo: u64,
    /// Last trie index of the run (the owner).
    pub hi: u64,
    /// The run's letters, in key order.
    pub word: Vec<u8>,
}

#[derive(Debug)]
struct Slot {
    entry: RadixEntry,
    uses: u64,
}

/// Single-threaded LFU over index ranges, with a cursor hint that lets
/// consecutive probes into the same region skip the search.
#[derive(Debug)]
pub struct RadixCache {
    /// Sorted by `entry.lo`; ranges never overlap.
    slots: Vec<Slot>,
    capacity: usize,
}

impl RadixCache {
    /// Creates a cache holding at most `capacity` runs.
    pub fn new(capacity: usize) -> Self {
        RadixCache {
            slots: Vec::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// The number of cached runs.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the cache is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Finds the run containing trie index `n`. A cursor returned by an
    /// earlier call short-circuits the search while it still matches;
    /// stale cursors simply fall back to the search.
    pub fn find(&mut self, n: u64, cursor: Option<usize>) -> Option<(RadixEntry, usize)> {
        if let Some(c) = cursor {
            if let Some(slot) = self.slots.get_mut(c) {
                if slot.entry.lo <= n && n <= slot.entry.hi {
                    slot.uses += 1;
                    return Some((slot.entry.clone(), c));
                }
            }
        }

        let at = match self.slots.binary_search_by(|slot| slot.entry.lo.cmp(&n)) {
            Ok(i) => i,
            Err(0) => return None,
            Err(i) => i - 1,
        };
        let slot = &mut self.slots[at];
        if slot.entry.lo <= n && n <= slot.entry.hi {
            slot.uses += 1;
            Some((slot.entry.clone(), at))
        } else {
            None
        }
    }

    /// Inserts a run descriptor, evicting the coldest slot when full.
    /// Wider runs start hotter, so they survive longer. Returns the new
    /// cursor, or `None` when the cache holds nothing.
    pub fn put(&mut self, entry: RadixEntry) -> Option<usize> {
        if self.capacity == 0 {
            return None;
        }

        if let Ok(i) = self.slots.binary_search_by(|slot| slot.entry.lo.cmp(&entry.lo)) {
            // already cached; refresh it
            self.slots[i].uses += 1;
            self.slots[i].entry = entry;
            return Some(i);
        }

        if self.slots.len() >= self.capacity {
            let coldest = self
                .slots
                .iter()
                .enumerate()
                .min_by_key(|(_, slot)| slot.uses)
                .map(|(i, _)| i)?;
            self.slots.remove(coldest);
        }

        let at = match self.slots.binary_search_by(|slot| slot.entry.lo.cmp(&entry.lo)) {
            Ok(i) | Err(i) => i,
        };
        let uses = initial_frequency(&entry);
        self.slots.insert(at, Slot { entry, uses });
        Some(at)
    }
}

// Wider runs weigh more: floor(log2((hi - lo)^2)).
fn initial_frequency(entry: &RadixEntry) -> u64 {
    let span = entry.hi.saturating_sub(entry.lo);
    if span <= 1 {
        return 0;
    }
    (span * span).floor_log2() as u64
}
