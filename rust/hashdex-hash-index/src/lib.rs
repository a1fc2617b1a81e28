//! Content-addressed hash secondary index over a sorted key-value store.
//!
//! Answers "which objects have attribute value V?" (exact match) and "which
//! objects have any value?" (existence), and reports per-value cardinality for
//! query planners. Values and objects are stored once, keyed by the digest of
//! their canonical bytes; associations are composite digest keys, so all
//! objects of one value are a single contiguous key range.

mod entry;
mod hash_index_type;
mod index;
mod read;
mod write;

pub use entry::Entry;
pub use hash_index_type::HashIndexType;
pub use index::{HashIndex, HashIndexOptions, INDEX_RETRIEVAL_COST};
pub use read::result_set::{ExactMatchResultSet, ExistenceResultSet};
pub use write::compaction::CompactionStats;
