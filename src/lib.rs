//! Succinct blocklist trie.
//!
//! A compact, read-optimized dictionary of fully-qualified domain names
//! tagged with blocklist-membership bit-sets. The dictionary is built
//! offline from lex-sorted encoded entries and frozen into two immutable
//! byte blobs — the trie stream and its rank directory — small enough to
//! ship to edge runtimes and query in place. A lookup walks every
//! enclosing suffix of a reversed domain and returns the blocklist
//! ordinals stored for each suffix that is a key.
//!
//! ```
//! use blocktrie::{build, Config, FrozenTrie};
//!
//! let config = Config::default();
//! let codec = config.codec();
//! let mut entries = vec![
//!     codec.encode_entry("example.com", 5).unwrap(),
//!     codec.encode_entry("ads.example.com", 13).unwrap(),
//! ];
//! entries.sort();
//!
//! let out = build(entries, &config).unwrap();
//! let opened = Config { node_count: out.node_count, ..config };
//! let trie = FrozenTrie::open(out.td, out.rd, opened).unwrap();
//!
//! let word = codec.encode_reversed("tracker.ads.example.com").unwrap();
//! let matches = trie.lookup(&word).unwrap().unwrap();
//! assert_eq!(vec![5], matches["example.com"]);
//! assert_eq!(vec![13], matches["ads.example.com"]);
//! ```

#![warn(missing_docs)]

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use]
extern crate quickcheck_macros;

pub mod cache;
pub mod codec;
pub mod config;
pub mod directory;
pub mod errors;
pub mod flags;
mod internal;
pub mod popcount;
pub mod space_usage;
pub mod storage;
pub mod stream;
pub mod trie;

pub use cache::{RadixCache, RadixEntry};
pub use codec::Codec;
pub use config::Config;
pub use directory::RankDirectory;
pub use errors::{Error, Result};
pub use space_usage::SpaceUsage;
pub use stream::{BitBuffer, BitWriter};
pub use trie::{build, BuildOutput, FrozenTrie, FrozenTrieNode, Matches, TrieBuilder};
