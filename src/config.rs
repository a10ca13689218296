//! Build- and read-time options.

use crate::codec::Codec;
use crate::errors::{Error, Result};

/// Options shared by the builder and the frozen reader.
///
/// A trie must be opened with the same `use_codec6`, `select_search`,
/// `opt_flags`, `l1`, and `l2` it was built with, and with the
/// `node_count` the build reported. `inspect` and `debug` only gate
/// diagnostics; they never change the emitted blobs.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Use the 6-bit letter codec instead of raw 8-bit units.
    pub use_codec6: bool,
    /// Lay the rank directory out as stored zero positions instead of
    /// cumulative popcounts.
    pub select_search: bool,
    /// Store small tag sets inline as raw ordinals instead of bitmaps.
    pub opt_flags: bool,
    /// Enable extra inspection surfaces. No effect on outputs.
    pub inspect: bool,
    /// Enable debug diagnostics. No effect on outputs.
    pub debug: bool,
    /// Number of letter-stream entries. Produced by the build; required
    /// to open.
    pub node_count: usize,
    /// Outer rank-directory block size in bits.
    pub l1: u32,
    /// Inner rank-directory block size in bits. Must divide `l1`.
    pub l2: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            use_codec6: true,
            select_search: true,
            opt_flags: true,
            inspect: false,
            debug: false,
            node_count: 0,
            l1: 1024,
            l2: 32,
        }
    }
}

impl Config {
    /// The letter codec this configuration selects.
    #[inline]
    pub fn codec(&self) -> Codec {
        if self.use_codec6 {
            Codec::C6
        } else {
            Codec::C8
        }
    }

    /// Bits per letter code unit.
    #[inline]
    pub fn width(&self) -> u32 {
        self.codec().width()
    }

    /// Bits per letter-stream entry: a 2-bit header plus the letter.
    #[inline]
    pub fn bits_per_entry(&self) -> u32 {
        self.width() + 2
    }

    /// Checks the block sizes for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.l1 == 0 || self.l2 == 0 {
            return Err(Error::Config(format!(
                "rank block sizes must be positive, got l1={} l2={}",
                self.l1, self.l2
            )));
        }
        if self.l1 % self.l2 != 0 {
            return Err(Error::Config(format!(
                "l1 ({}) must be a multiple of l2 ({})",
                self.l1, self.l2
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.use_codec6 && config.select_search && config.opt_flags);
        assert!(!config.inspect && !config.debug);
        assert_eq!((1024, 32), (config.l1, config.l2));
        assert_eq!(8, config.bits_per_entry());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn widths() {
        let mut config = Config::default();
        assert_eq!(6, config.width());
        config.use_codec6 = false;
        assert_eq!(8, config.width());
        assert_eq!(10, config.bits_per_entry());
    }

    #[test]
    fn rejects_misaligned_blocks() {
        let mut config = Config::default();
        config.l2 = 48;
        assert!(config.validate().is_err());
        config.l2 = 0;
        assert!(config.validate().is_err());
    }
}
