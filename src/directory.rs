//! Two-level rank/select directory over the trie's child-count stream.
//!
//! Two layouts share one type, chosen at build time:
//!
//! * the popcount layout interleaves, per `l1` bits of data, `l1/l2 - 1`
//!   small entries (cumulative one-counts within the section) with one
//!   large entry (the global cumulative one-count); `rank` sums a large
//!   entry, a small entry, and a partial-block popcount read from the
//!   data, and `select` binary-searches `rank`;
//! * the select-as-rank layout stores the position of every `l2`-th zero
//!   outright, turning `select0` into a directory read plus a short
//!   `pos0` walk. `rank1` and `select1` are unsupported under it.
//!
//! Ranks are inclusive: `rank(which, x)` counts matching bits in
//! `[0, x]`. Selects are 1-based: `select0(y)` is the position of the
//! `y`-th zero.
//!
//! The directory owns only its own bits; the data stream it summarizes
//! is passed into every query.

use crate::config::Config;
use crate::errors::{Error, Result};
use crate::internal::search::binary_search_function;
use crate::storage::BlockType;
use crate::stream::{BitBuffer, BitWriter};

/// Rank/select support for the first `num_bits` bits of a data stream.
#[derive(Clone, Debug)]
pub struct RankDirectory {
    dir: BitBuffer,
    num_bits: u64,
    zero_count: u64,
    select_search: bool,
    l1: u64,
    l2: u64,
    l1_bits: u32,
    l2_bits: u32,
}

impl RankDirectory {
    /// Builds the directory for `data[0, num_bits)` under `config`.
    pub fn build(data: &BitBuffer, num_bits: u64, config: &Config) -> Result<RankDirectory> {
        config.validate()?;
        if num_bits > data.bit_len() {
            return Err(Error::Index(format!(
                "directory covers {} bits but the data stream holds {}",
                num_bits,
                data.bit_len()
            )));
        }

        let l1 = config.l1 as u64;
        let l2 = config.l2 as u64;
        let (l1_bits, l2_bits) = entry_widths(num_bits, l1);
        let mut writer = BitWriter::new();

        if config.select_search {
            // record the position of every l2-th zero
            let mut zeros = 0u64;
            for p in 0..num_bits {
                if !data.get_bit(p) {
                    if zeros % l2 == 0 {
                        writer.write(p as u32, l1_bits);
                    }
                    zeros += 1;
                }
            }
        } else {
            let per_section = l1 / l2;
            let mut total = 0u64;
            let mut in_section = 0u64;
            let mut block = 0u64;
            let mut p = 0u64;
            while p + l2 <= num_bits {
                in_section += data.count(p, l2);
                p += l2;
                block += 1;
                if block == per_section {
                    total += in_section;
                    writer.write(total as u32, l1_bits);
                    in_section = 0;
                    block = 0;
                } else {
                    writer.write(in_section as u32, l2_bits);
                }
            }
        }

        let zero_count = num_bits - data.count(0, num_bits);
        Ok(RankDirectory {
            dir: writer.into_buffer(),
            num_bits,
            zero_count,
            select_search: config.select_search,
            l1,
            l2,
            l1_bits,
            l2_bits,
        })
    }

    /// Mounts a previously built directory blob, validating its size
    /// against `num_bits` and the configuration.
    pub fn from_parts(
        dir: BitBuffer,
        data: &BitBuffer,
        num_bits: u64,
        config: &Config,
    ) -> Result<RankDirectory> {
        config.validate()?;
        if num_bits > data.bit_len() {
            return Err(Error::Config(format!(
                "directory covers {} bits but the data stream holds {}",
                num_bits,
                data.bit_len()
            )));
        }

        let l1 = config.l1 as u64;
        let l2 = config.l2 as u64;
        let (l1_bits, l2_bits) = entry_widths(num_bits, l1);
        let zero_count = num_bits - data.count(0, num_bits);

        let expected_bits = if config.select_search {
            zero_count.ceil_div(l2) * l1_bits as u64
        } else {
            let blocks = num_bits / l2;
            let large = num_bits / l1;
            large * l1_bits as u64 + (blocks - large) * l2_bits as u64
        };
        let expected_units = expected_bits.ceil_div(16) as usize;
        if dir.unit_len() != expected_units {
            return Err(Error::Config(format!(
                "directory blob holds {} units but this layout needs {}",
                dir.unit_len(),
                expected_units
            )));
        }

        Ok(RankDirectory {
            dir,
            num_bits,
            zero_count,
            select_search: config.select_search,
            l1,
            l2,
            l1_bits,
            l2_bits,
        })
    }

    /// Serializes the directory as a little-endian byte blob.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.dir.to_bytes()
    }

    /// Size of the directory blob in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.dir.unit_len() * 2
    }

    /// The number of data bits the directory summarizes.
    #[inline]
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    /// The number of zeros in the summarized region.
    #[inline]
    pub fn zero_count(&self) -> u64 {
        self.zero_count
    }

    /// Counts the `which` bits in `data[0, x]`.
    pub fn rank(&self, data: &BitBuffer, which: u32, x: u64) -> Result<u64> {
        if x >= self.num_bits {
            return Err(Error::Index(format!(
                "rank probe {} beyond {} bits",
                x, self.num_bits
            )));
        }
        if self.select_search {
            if which == 1 {
                return Err(Error::Config(
                    "rank over one bits is unsupported under the select-as-rank layout"
                        .to_string(),
                ));
            }
            return self.rank0_by_select(data, x);
        }
        let ones = self.rank1_raw(data, x);
        Ok(if which == 1 { ones } else { x + 1 - ones })
    }

    /// The position of the `y`-th zero, 1-based.
    pub fn select0(&self, data: &BitBuffer, y: u64) -> Result<u64> {
        if y == 0 || y > self.zero_count {
            return Err(Error::Index(format!(
                "select0 probe {} outside [1, {}]",
                y, self.zero_count
            )));
        }
        if self.select_search {
            let j = (y - 1) / self.l2;
            let rem = (y - 1) % self.l2;
            let base = self.dir.get(j * self.l1_bits as u64, self.l1_bits) as u64;
            if rem == 0 {
                Ok(base)
            } else {
                data.pos0(base + 1, rem)
            }
        } else {
            self.select_by_rank(data, 0, y)
        }
    }

    /// The position of the `y`-th one, 1-based. Unsupported under the
    /// select-as-rank layout.
    pub fn select1(&self, data: &BitBuffer, y: u64) -> Result<u64> {
        if self.select_search {
            return Err(Error::Config(
                "select over one bits is unsupported under the select-as-rank layout".to_string(),
            ));
        }
        let one_count = self.rank1_raw(data, self.num_bits - 1);
        if y == 0 || y > one_count {
            return Err(Error::Index(format!(
                "select1 probe {} outside [1, {}]",
                y, one_count
            )));
        }
        self.select_by_rank(data, 1, y)
    }

    // Popcount-layout rank over ones; `x` must be in bounds.
    fn rank1_raw(&self, data: &BitBuffer, x: u64) -> u64 {
        debug_assert!(!self.select_search && x < self.num_bits);

        let section_bits = self.l1_bits as u64 + (self.l1 / self.l2 - 1) * self.l2_bits as u64;
        let section = x / self.l1;
        let section_pos = section * section_bits;

        let mut rank = 0u64;
        let mut o = x;
        if x >= self.l1 {
            rank = self.dir.get(section_pos - self.l1_bits as u64, self.l1_bits) as u64;
            o = x % self.l1;
        }
        if o >= self.l2 {
            let block = o / self.l2;
            rank += self
                .dir
                .get(section_pos + (block - 1) * self.l2_bits as u64, self.l2_bits)
                as u64;
        }
        rank + data.count(x - x % self.l2, x % self.l2 + 1)
    }

    // Smallest position whose inclusive rank reaches `y`.
    fn select_by_rank(&self, data: &BitBuffer, which: u32, y: u64) -> Result<u64> {
        let f = |x: u64| {
            let ones = self.rank1_raw(data, x);
            if which == 1 {
                ones
            } else {
                x + 1 - ones
            }
        };
        match binary_search_function(0, self.num_bits, y, &f) {
            Some(x) if f(x) == y => Ok(x),
            _ => Err(Error::Index(format!(
                "select({}, {}) has no answer in {} bits",
                which, y, self.num_bits
            ))),
        }
    }

    // Zeros in [0, x] under the select-as-rank layout: the largest y with
    // select0(y) <= x. Directory entries may be corrupt, so the probes
    // propagate read errors instead of asserting.
    fn rank0_by_select(&self, data: &BitBuffer, x: u64) -> Result<u64> {
        let mut low = 1u64;
        let mut high = self.zero_count;
        let mut answer = 0u64;
        while low <= high {
            let mid = low + (high - low) / 2;
            if self.select0(data, mid)? <= x {
                answer = mid;
                low = mid + 1;
            } else {
                high = mid - 1;
            }
        }
        Ok(answer)
    }
}

// Directory entry widths: large entries hold counts or positions up to
// `num_bits`, small entries counts up to `l1`.
fn entry_widths(num_bits: u64, l1: u64) -> (u32, u32) {
    (
        (num_bits + 1).ceil_log2() as u32,
        (l1 + 1).ceil_log2() as u32,
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const SEED: u64 = 88004802264174740;

    fn config(select_search: bool, l1: u32, l2: u32) -> Config {
        Config {
            select_search,
            l1,
            l2,
            ..Config::default()
        }
    }

    fn random_buffer(units: usize) -> BitBuffer {
        let mut rng = StdRng::seed_from_u64(SEED);
        BitBuffer::new((0..units).map(|_| rng.gen()).collect())
    }

    #[test]
    fn rank_small_popcount() {
        // 10 10 10 ... over two units
        let data = BitBuffer::new(vec![0xAAAA, 0xAAAA]);
        let dir = RankDirectory::build(&data, 32, &config(false, 16, 4)).unwrap();

        assert_eq!(1, dir.rank(&data, 1, 0).unwrap());
        assert_eq!(1, dir.rank(&data, 1, 1).unwrap());
        assert_eq!(2, dir.rank(&data, 1, 2).unwrap());
        assert_eq!(16, dir.rank(&data, 1, 31).unwrap());
        assert_eq!(0, dir.rank(&data, 0, 0).unwrap());
        assert_eq!(16, dir.rank(&data, 0, 31).unwrap());
        assert!(dir.rank(&data, 1, 32).is_err());
    }

    #[test]
    fn rank_complement_invariant() {
        let data = random_buffer(4096);
        let num_bits = data.bit_len();
        let dir = RankDirectory::build(&data, num_bits, &config(false, 1024, 32)).unwrap();
        for x in (0..num_bits).step_by(97) {
            let r0 = dir.rank(&data, 0, x).unwrap();
            let r1 = dir.rank(&data, 1, x).unwrap();
            assert_eq!(x + 1, r0 + r1, "at {}", x);
        }
    }

    #[test]
    fn rank_matches_naive_count() {
        let data = random_buffer(512);
        let num_bits = data.bit_len();
        let dir = RankDirectory::build(&data, num_bits, &config(false, 256, 32)).unwrap();
        for x in (0..num_bits).step_by(61) {
            assert_eq!(data.count(0, x + 1), dir.rank(&data, 1, x).unwrap());
        }
    }

    #[test]
    fn select_is_smallest_probe() {
        let data = BitBuffer::new(vec![0b0110_0000_0000_0110, 0xFFFF]);
        let dir = RankDirectory::build(&data, 32, &config(false, 16, 4)).unwrap();

        assert_eq!(1, dir.select1(&data, 1).unwrap());
        assert_eq!(2, dir.select1(&data, 2).unwrap());
        assert_eq!(13, dir.select1(&data, 3).unwrap());
        assert_eq!(16, dir.select1(&data, 5).unwrap());
        assert_eq!(0, dir.select0(&data, 1).unwrap());
        assert_eq!(3, dir.select0(&data, 2).unwrap());
        assert!(dir.select0(&data, 13).is_err());

        // rank1(select1(y)) == y
        for y in 1..=20 {
            let pos = dir.select1(&data, y).unwrap();
            assert_eq!(y, dir.rank(&data, 1, pos).unwrap());
        }
    }

    #[test]
    fn select_as_rank_refuses_ones() {
        let data = BitBuffer::new(vec![0xAAAA]);
        let dir = RankDirectory::build(&data, 16, &config(true, 16, 4)).unwrap();
        assert!(dir.select1(&data, 1).is_err());
        assert!(dir.rank(&data, 1, 3).is_err());
        assert!(dir.rank(&data, 0, 3).is_ok());
    }

    #[test]
    fn layouts_agree_on_select0() {
        // a random 64 Kib stream, default block sizes
        let data = random_buffer(4096);
        let num_bits = data.bit_len();
        let popcount = RankDirectory::build(&data, num_bits, &config(false, 1024, 32)).unwrap();
        let stored = RankDirectory::build(&data, num_bits, &config(true, 1024, 32)).unwrap();

        assert_eq!(popcount.zero_count(), stored.zero_count());
        for y in 1..=popcount.zero_count() {
            assert_eq!(
                popcount.select0(&data, y).unwrap(),
                stored.select0(&data, y).unwrap(),
                "select0({})",
                y
            );
        }
    }

    #[test]
    fn layouts_agree_on_rank0() {
        let data = random_buffer(256);
        let num_bits = data.bit_len();
        let popcount = RankDirectory::build(&data, num_bits, &config(false, 256, 32)).unwrap();
        let stored = RankDirectory::build(&data, num_bits, &config(true, 256, 32)).unwrap();
        for x in (0..num_bits).step_by(53) {
            assert_eq!(
                popcount.rank(&data, 0, x).unwrap(),
                stored.rank(&data, 0, x).unwrap(),
                "rank0({})",
                x
            );
        }
    }

    #[test]
    fn blob_round_trip() {
        let data = random_buffer(1024);
        let num_bits = data.bit_len();
        for select_search in &[false, true] {
            let config = config(*select_search, 1024, 32);
            let built = RankDirectory::build(&data, num_bits, &config).unwrap();
            let blob = built.to_bytes();
            let mounted = RankDirectory::from_parts(
                BitBuffer::from_bytes(&blob).unwrap(),
                &data,
                num_bits,
                &config,
            )
            .unwrap();
            assert_eq!(
                built.select0(&data, 100).unwrap(),
                mounted.select0(&data, 100).unwrap()
            );
        }
    }

    #[test]
    fn from_parts_rejects_wrong_size() {
        let data = random_buffer(1024);
        let num_bits = data.bit_len();
        let config = config(false, 1024, 32);
        let built = RankDirectory::build(&data, num_bits, &config).unwrap();
        let mut blob = built.to_bytes();
        blob.extend_from_slice(&[0, 0]);
        let mounted = RankDirectory::from_parts(
            BitBuffer::from_bytes(&blob).unwrap(),
            &data,
            num_bits,
            &config,
        );
        assert!(mounted.is_err());
    }
}
