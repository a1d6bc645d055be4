//! # hattrie
//!
//! A cache-conscious ordered map from byte strings to word-sized values,
//! built as a HAT-trie: a character-branching trie near the root with packed
//! array-hash buckets at the leaves. Buckets burst into finer trie structure
//! as they fill, so trie depth adapts to the key distribution while most
//! operations end in one cache-friendly arena scan.
//!
//! ## Example
//!
//! ```rust
//! use hattrie::HatTrie;
//!
//! let mut trie = HatTrie::new();
//! trie.insert(b"hat", 1);
//! trie.insert(b"hatter", 2);
//! trie.insert(b"trie", 3);
//!
//! assert_eq!(trie.get(b"hat"), Some(1));
//! assert_eq!(trie.len(), 3);
//!
//! let keys: Vec<_> = trie.iter(true).map(|(key, _)| key).collect();
//! assert_eq!(keys, [b"hat".to_vec(), b"hatter".to_vec(), b"trie".to_vec()]);
//! ```
//!
//! Keys are opaque byte strings (zero-length and embedded-NUL keys
//! included); values are [`Value`] words. The structure is single-threaded:
//! share an instance across threads only behind external synchronization.

#![deny(unsafe_op_in_unsafe_fn)]

pub mod ahtable;
pub mod encoding;
pub mod slab;
pub mod trie;

#[cfg(test)]
mod proptests;

pub use ahtable::{AhIter, AhTable};
pub use slab::{slab_base_of, SlabCache, SlabStats};
pub use trie::{HatTrie, Iter};

// =============================================================================
// Configuration
// =============================================================================

/// Initial slot count of a bucket's hash table (a power of two).
pub const AHTABLE_INIT_SIZE: usize = 4096;

/// Keys a bucket may hold before it is burst into finer trie structure.
pub const TRIE_BUCKET_SIZE: usize = 16384;

/// Largest key byte routed by trie nodes: `0xFF` for the full byte alphabet,
/// `0x7F` to restrict to 7-bit ASCII.
pub const TRIE_MAXCHAR: u8 = 0xFF;

/// Slab byte size. A power of two, and slabs are aligned to it, so an item
/// pointer recovers its slab by masking.
pub const SLAB_SIZE: usize = 65536;

/// Offset successive slabs' item regions to spread cache-line pressure.
pub const MEM_COLORING: bool = true;

/// Stored value word: wide enough for a pointer or an identifier.
pub type Value = u64;

// Node tag bits, shared by trie nodes and buckets (the first byte of either
// names its kind).
pub(crate) const FLAG_TRIE: u8 = 0x1;
pub(crate) const FLAG_PURE_BUCKET: u8 = 0x2;
pub(crate) const FLAG_HYBRID_BUCKET: u8 = 0x4;
pub(crate) const FLAG_HAS_VAL: u8 = 0x8;
