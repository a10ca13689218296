//! Error types shared by the builder, the codecs, and the frozen reader.

use thiserror::Error;

/// Everything that can go wrong while building or querying a trie.
///
/// A failed cache probe is not an error; the radix cache signals misses by
/// returning `None`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed input data: unsorted inserts, a missing tag delimiter,
    /// symbols outside the codec alphabet, or a tag bitmap whose header
    /// disagrees with its group words.
    #[error("domain error: {0}")]
    Domain(String),

    /// A bit-level read fell outside the blob it addresses.
    #[error("index error: {0}")]
    Index(String),

    /// The configuration record disagrees with the blobs it describes.
    #[error("config error: {0}")]
    Config(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
