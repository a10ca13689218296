//! The immutable trie reader.
//!
//! A frozen trie is two bit streams in one blob: the unary child-count
//! region summarized by the rank directory, and the fixed-width letter
//! stream that starts right after it at bit `2·node_count + 1`. Nodes
//! are located arithmetically: the first child of node `i` sits at
//! `select0(i + 1) - i`, so traversal needs no pointers and the blob is
//! shared freely between threads. The radix cache behind a mutex keeps
//! reconstructed multi-letter runs warm across lookups.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::cache::{RadixCache, RadixEntry};
use crate::codec::Codec;
use crate::config::Config;
use crate::directory::RankDirectory;
use crate::errors::{Error, Result};
use crate::flags;
use crate::storage::BlockType;
use crate::stream::BitBuffer;

/// Default capacity of the per-trie radix cache, in runs.
const RADIX_CACHE_RUNS: usize = 256;

/// Ordinal sets keyed by the decoded suffix that carries them.
pub type Matches = BTreeMap<String, Vec<u16>>;

/// An immutable suffix dictionary mounted from its two blobs.
#[derive(Debug)]
pub struct FrozenTrie {
    data: BitBuffer,
    directory: RankDirectory,
    config: Config,
    codec: Codec,
    letter_start: u64,
    cache: Mutex<RadixCache>,
}

impl FrozenTrie {
    /// Mounts the trie and rank-directory blobs.
    ///
    /// `config.node_count` must be the count the build reported; both
    /// blob sizes are validated against it before any traversal.
    pub fn open(td: Vec<u8>, rd: Vec<u8>, config: Config) -> Result<FrozenTrie> {
        FrozenTrie::open_with_cache(td, rd, config, RADIX_CACHE_RUNS)
    }

    /// Mounts the blobs with an explicit radix-cache capacity.
    pub fn open_with_cache(
        td: Vec<u8>,
        rd: Vec<u8>,
        config: Config,
        cache_runs: usize,
    ) -> Result<FrozenTrie> {
        config.validate()?;
        if config.node_count == 0 {
            return Err(Error::Config(
                "node_count is required to open a trie".to_string(),
            ));
        }

        let data = BitBuffer::from_bytes(&td)?;
        let nodes = config.node_count as u64;
        let num_bits = 2 * nodes + 1;
        let total_bits = num_bits + nodes * config.bits_per_entry() as u64;
        let expected_units = total_bits.ceil_div(16) as usize;
        if data.unit_len() != expected_units {
            return Err(Error::Config(format!(
                "trie blob holds {} units but node_count {} implies {}",
                data.unit_len(),
                config.node_count,
                expected_units
            )));
        }

        let directory =
            RankDirectory::from_parts(BitBuffer::from_bytes(&rd)?, &data, num_bits, &config)?;
        // every node terminates its unary run with one zero, plus the
        // super-root's
        if directory.zero_count() != nodes + 1 {
            return Err(Error::Config(format!(
                "child-count stream holds {} zeros but node_count {} implies {}",
                directory.zero_count(),
                config.node_count,
                nodes + 1
            )));
        }
        if config.inspect {
            log::debug!(
                "mounted trie: {} nodes, td {} units, rd {} bytes",
                config.node_count,
                data.unit_len(),
                directory.byte_len()
            );
        }
        let codec = config.codec();
        Ok(FrozenTrie {
            data,
            directory,
            codec,
            letter_start: num_bits,
            cache: Mutex::new(RadixCache::new(cache_runs)),
            config,
        })
    }

    /// The node at level-order index `i`.
    #[inline]
    pub fn node(&self, index: u64) -> FrozenTrieNode<'_> {
        FrozenTrieNode { trie: self, index }
    }

    /// The number of letter-stream entries.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.config.node_count
    }

    /// Runs currently held by the radix cache.
    pub fn radix_cache_len(&self) -> usize {
        self.lock_cache().len()
    }

    /// Size of the mounted trie blob in bytes.
    #[inline]
    pub fn data_bytes(&self) -> usize {
        self.data.unit_len() * 2
    }

    /// Size of the mounted rank-directory blob in bytes.
    #[inline]
    pub fn directory_bytes(&self) -> usize {
        self.directory.byte_len()
    }

    /// Finds every suffix of the encoded reversed host that is a key,
    /// with its ordinal set.
    ///
    /// The input is the host reversed and encoded, label separators
    /// included, with no tag part. Returns `Ok(None)` when no suffix
    /// matches; read errors on corrupt blobs are reported, a missing key
    /// never is.
    pub fn lookup(&self, word: &[u8]) -> Result<Option<Matches>> {
        let period = self.codec.period();
        let mut matches: Option<Matches> = None;
        let mut node = self.node(0);
        let mut at = 0usize;
        let mut cursor: Option<usize> = None;

        while at < word.len() {
            if word[at] == period && node.is_final()? {
                let key = self.decode_suffix(&word[..at])?;
                matches
                    .get_or_insert_with(BTreeMap::new)
                    .insert(key, node.value()?);
            }

            let count = node.child_count()? as i64;
            let first = node.first_child()?;
            let mut low = match node.last_flag_child()? {
                Some(i) => i as i64,
                None => -1,
            };
            if low >= count - 1 {
                // no letter children
                return Ok(matches);
            }

            let mut high = count;
            let mut advanced = false;
            while high - low > 1 {
                let probe = ((high + low) / 2) as u64;
                let run = self.radix_run(first, count as u64, probe, &mut cursor)?;
                let local = (run.lo - first) as i64;
                let head = run.word[0];

                if head > word[at] {
                    high = local;
                    continue;
                }
                if head < word[at] {
                    low = local + run.word.len() as i64 - 1;
                    continue;
                }
                if word.len() - at < run.word.len() {
                    // the key ends inside this run
                    return Ok(matches);
                }
                if run.word[1..] != word[at + 1..at + run.word.len()] {
                    return Ok(matches);
                }
                node = self.node(run.hi);
                at += run.word.len();
                advanced = true;
                break;
            }
            if !advanced {
                return Ok(matches);
            }
        }

        if node.is_final()? {
            let key = self.decode_suffix(word)?;
            matches
                .get_or_insert_with(BTreeMap::new)
                .insert(key, node.value()?);
        }
        Ok(matches)
    }

    // One (width + 2)-bit letter-stream entry.
    fn entry(&self, index: u64) -> Result<u32> {
        let nodes = self.config.node_count as u64;
        if index >= nodes {
            return Err(Error::Index(format!(
                "node {} beyond a letter stream of {} entries",
                index, nodes
            )));
        }
        let bits = self.config.bits_per_entry();
        Ok(self.data.get(self.letter_start + index * bits as u64, bits))
    }

    // The radix descriptor for the probed child, served from the cache
    // when the run was reconstructed before.
    fn radix_run(
        &self,
        first_child: u64,
        child_count: u64,
        probe: u64,
        cursor: &mut Option<usize>,
    ) -> Result<RadixEntry> {
        let index = first_child + probe;
        let node = self.node(index);
        let in_run = |n: &FrozenTrieNode<'_>| -> Result<bool> {
            Ok(n.is_compressed()? && !n.is_flag()?)
        };

        let probed_in_run = in_run(&node)?;
        let left_in_run = if probe > 0 {
            in_run(&self.node(index - 1))?
        } else {
            false
        };
        if !probed_in_run && !left_in_run {
            // single-letter edge; not worth caching
            return Ok(RadixEntry {
                lo: index,
                hi: index,
                word: vec![node.letter()?],
            });
        }

        if let Some((entry, at)) = self.lock_cache().find(index, *cursor) {
            *cursor = Some(at);
            return Ok(entry);
        }

        let entry = self.reconstruct_run(index, first_child, first_child + child_count)?;
        *cursor = self.lock_cache().put(entry.clone());
        Ok(entry)
    }

    // Walks the siblings around `index` to rebuild the full run word.
    fn reconstruct_run(&self, index: u64, first_child: u64, limit: u64) -> Result<RadixEntry> {
        let mut lo = index;
        let mut word = vec![self.node(index).letter()?];
        while lo > first_child {
            let left = self.node(lo - 1);
            if left.is_compressed()? && !left.is_flag()? {
                word.push(left.letter()?);
                lo -= 1;
            } else {
                break;
            }
        }
        word.reverse();

        let mut hi = index;
        let probed = self.node(index);
        if probed.is_compressed()? && !probed.is_flag()? {
            // extend right to the run's owner
            let mut next = index + 1;
            loop {
                if next >= limit {
                    return Err(Error::Domain(format!(
                        "compressed run at node {} has no owner",
                        index
                    )));
                }
                let sibling = self.node(next);
                word.push(sibling.letter()?);
                if sibling.is_compressed()? {
                    next += 1;
                } else {
                    hi = next;
                    break;
                }
            }
        }

        Ok(RadixEntry { lo, hi, word })
    }

    fn decode_suffix(&self, units: &[u8]) -> Result<String> {
        let reversed = self.codec.decode(units)?;
        Ok(reversed.chars().rev().collect())
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, RadixCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An ephemeral accessor over one `(trie, index)` pair. Every field is
/// recomputed on demand from the two bit streams.
#[derive(Clone, Copy)]
pub struct FrozenTrieNode<'a> {
    trie: &'a FrozenTrie,
    index: u64,
}

impl<'a> FrozenTrieNode<'a> {
    /// The node's level-order index.
    #[inline]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// The node's letter code unit.
    pub fn letter(&self) -> Result<u8> {
        let width = self.trie.config.width();
        Ok((self.trie.entry(self.index)? & u32::low_mask(width as usize)) as u8)
    }

    /// Whether the path ending here is a complete key.
    pub fn is_final(&self) -> Result<bool> {
        let width = self.trie.config.width() as usize;
        Ok(self.trie.entry(self.index)?.get_bit(width))
    }

    /// Whether this entry is an internal link of a compressed run.
    pub fn is_compressed(&self) -> Result<bool> {
        let width = self.trie.config.width() as usize;
        Ok(self.trie.entry(self.index)?.get_bit(width + 1))
    }

    /// Whether this entry carries a code unit of its parent's tag set.
    pub fn is_flag(&self) -> Result<bool> {
        let width = self.trie.config.width() as usize;
        Ok(self.trie.entry(self.index)?.get_bits(width, 2) == 0b11)
    }

    /// Level-order index of the node's first child.
    pub fn first_child(&self) -> Result<u64> {
        let zero = self
            .trie
            .directory
            .select0(&self.trie.data, self.index + 1)?;
        Ok(zero - self.index)
    }

    /// How many children the node owns.
    pub fn child_count(&self) -> Result<u64> {
        let next = self
            .trie
            .directory
            .select0(&self.trie.data, self.index + 2)?;
        Ok(next - self.index - 1 - self.first_child()?)
    }

    /// The node's `i`-th child.
    pub fn child(&self, i: u64) -> Result<FrozenTrieNode<'a>> {
        Ok(self.trie.node(self.first_child()? + i))
    }

    /// Child-local index of the last flag child, if any. Flag children
    /// always form a prefix of the child list.
    pub fn last_flag_child(&self) -> Result<Option<u64>> {
        let count = self.child_count()?;
        let mut last = None;
        for i in 0..count {
            if self.child(i)?.is_flag()? {
                last = Some(i);
            } else {
                break;
            }
        }
        Ok(last)
    }

    /// The ordinal set carried by this node's flag children, ascending.
    ///
    /// Small sets are stored inline as raw ordinals; anything larger is
    /// a packed two-level bitmap.
    pub fn value(&self) -> Result<Vec<u16>> {
        let count = self.child_count()?;
        let mut units = Vec::new();
        for i in 0..count {
            let child = self.child(i)?;
            if !child.is_flag()? {
                break;
            }
            units.push(child.letter()?);
        }
        if units.is_empty() {
            return Ok(Vec::new());
        }

        let width = self.trie.config.width();
        if self.trie.config.opt_flags && units.len() <= flags::optflags_limit(width) {
            return Ok(units.into_iter().map(u16::from).collect());
        }
        let words = flags::units_to_words(&units, width)?;
        flags::flags_to_tags(&words)
    }
}
