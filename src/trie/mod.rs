//! Building and querying the frozen suffix trie.

mod builder;
mod frozen;

pub use self::builder::{build, BuildOutput, TrieBuilder};
pub use self::frozen::{FrozenTrie, FrozenTrieNode, Matches};
