//! Lazily evaluated query results.

use hashdex_common::Result;

use crate::{Query, QueryOptions};

/// Forward iterator over query results. Each step may touch the store, so each
/// item is a `Result`. Dropping the iterator releases its cursor.
pub type ResultIter<'a, T> = Box<dyn Iterator<Item = Result<T>> + Send + 'a>;

/// The answer of an index to one query.
///
/// A result set is a recipe, not a materialized list: every call to
/// [`iter()`](ResultSet::iter) opens a fresh cursor. The cost accessors that
/// need a count are explicit O(n) passes.
pub trait ResultSet<O>: Send + Sync {
    type Value;

    /// Opens a new iterator over the matching objects.
    fn iter(&self) -> Result<ResultIter<'_, O>>;

    /// Whether `object` is a member of this result.
    fn contains(&self, object: &O) -> Result<bool>;

    /// Evaluates the query's own predicate against the live `object`.
    fn matches(&self, object: &O) -> bool;

    fn query(&self) -> &Query<Self::Value>;

    fn query_options(&self) -> &QueryOptions;

    /// Fixed cost hint for producing this result. Lower is cheaper.
    fn retrieval_cost(&self) -> u32;

    /// Number of objects the iterator yields.
    ///
    /// Iterates the whole result once: O(n) store reads and decodes.
    fn size(&self) -> Result<u64> {
        let mut count = 0u64;
        for object in self.iter()? {
            object?;
            count += 1;
        }
        Ok(count)
    }

    /// Cost hint for merging this result with others; equal to [`size()`](ResultSet::size).
    ///
    /// Iterates the whole result once: O(n).
    fn merge_cost(&self) -> Result<u64> {
        self.size()
    }

    /// Whether the result yields no objects. Reads at most one item.
    fn is_empty(&self) -> Result<bool> {
        match self.iter()?.next() {
            Some(item) => item.map(|_| false),
            None => Ok(true),
        }
    }
}
