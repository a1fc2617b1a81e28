use std::sync::Arc;

use hashdex_index_core::{Capabilities, IndexType, QueryKind};

use crate::index::INDEX_RETRIEVAL_COST;

/// Index type descriptor for content-addressed hash indexes.
///
/// Declares exact-match (`Equal`) and existence (`Has`) queries with exact
/// results. Range and set queries are not served; the planner must route them
/// elsewhere.
pub struct HashIndexType {
    capabilities: Capabilities,
}

impl HashIndexType {
    /// The canonical name identifier for this index type
    pub const NAME: &'static str = "hash-index";

    pub fn new() -> Arc<HashIndexType> {
        Arc::new(HashIndexType {
            capabilities: Self::build_capabilities(INDEX_RETRIEVAL_COST),
        })
    }

    pub(crate) fn build_capabilities(retrieval_cost: u32) -> Capabilities {
        Capabilities::new([QueryKind::Equal, QueryKind::Has], retrieval_cost)
    }
}

impl IndexType for HashIndexType {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }
}
