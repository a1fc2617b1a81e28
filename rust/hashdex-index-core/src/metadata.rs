//! Index metadata consumed by the host engine's planner.
//!
//! The metadata system follows a capability-based design:
//!
//! 1. `IndexType` implementors declare their [`Capabilities`]: the query shapes
//!    they serve and how cheap a retrieval is.
//! 2. The planner routes each predicate to an index whose capabilities include
//!    the predicate's [`QueryKind`].
//! 3. Per-key [`KeyStatistics`] refine the estimate for a concrete value.

use ahash::AHashSet;

use crate::QueryKind;

/// Describes what an index type can do.
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Set of supported query shapes.
    pub query_kind: AHashSet<QueryKind>,

    /// Fixed retrieval cost hint. Lower is cheaper.
    pub retrieval_cost: u32,

    /// Whether results may include false positives that need re-checking
    /// against the live object.
    pub quantized: bool,
}

impl Capabilities {
    pub fn new(query_kinds: impl IntoIterator<Item = QueryKind>, retrieval_cost: u32) -> Self {
        Capabilities {
            query_kind: query_kinds.into_iter().collect(),
            retrieval_cost,
            quantized: false,
        }
    }

    pub fn supports(&self, kind: QueryKind) -> bool {
        self.query_kind.contains(&kind)
    }
}

/// Number of associations recorded for one distinct attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStatistics<V> {
    pub key: V,
    pub count: u64,
}

impl<V> KeyStatistics<V> {
    pub fn new(key: V, count: u64) -> Self {
        KeyStatistics { key, count }
    }
}
