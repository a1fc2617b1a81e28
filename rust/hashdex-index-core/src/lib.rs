//! Core index contract between attribute indexes and a host query engine.
//!
//! This crate provides the traits and types that an index implements so that a
//! host engine can route predicates to it, estimate its cost, and keep it in
//! sync with a collection.
//!
//! # Architecture
//!
//! - **Attributes**: [`Attribute`] extracts zero or more values from an object
//! - **Queries**: [`Query`] is the closed set of predicate shapes; [`QueryKind`]
//!   names a shape without operands
//! - **Index Types**: [`IndexType`] declares a name and [`Capabilities`], and is
//!   registered with a [`registry::IndexTypeRegistry`]
//! - **Indexes**: [`AttributeIndex`] answers queries with lazy [`ResultSet`]s and
//!   follows the collection through add/remove/clear;
//!   [`KeyStatisticsIndex`] adds per-value cardinality for the planner

use hashdex_common::Result;

pub mod attribute;
pub mod metadata;
pub mod query;
pub mod registry;
pub mod result;

pub use attribute::{Attribute, FnAttribute};
pub use metadata::{Capabilities, KeyStatistics};
pub use query::{Query, QueryKind, QueryOptions};
pub use result::{ResultIter, ResultSet};

/// Defines a type of index that a host engine can use.
///
/// # Thread Safety
///
/// All methods must be thread-safe as index types are shared across threads
/// via `Arc`. The trait requires `Send + Sync + 'static` for this reason.
pub trait IndexType: Send + Sync + 'static {
    /// Returns the unique, stable name of this index type, e.g. `"hash-index"`.
    fn name(&self) -> &str;

    /// Returns the capabilities supported by this index type.
    ///
    /// Capabilities indicate what kinds of queries the index can answer. This
    /// information helps query planners decide when to use the index.
    fn capabilities(&self) -> &Capabilities;
}

/// An index over one attribute of a collection of `O`.
pub trait AttributeIndex<O>: Send + Sync {
    type Value;

    /// Name of the indexed attribute.
    fn attribute_name(&self) -> &str;

    fn capabilities(&self) -> &Capabilities;

    /// Answers `query`.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::UnsupportedQuery` for a query shape outside
    /// [`capabilities()`](AttributeIndex::capabilities).
    fn retrieve(
        &self,
        query: Query<Self::Value>,
        options: QueryOptions,
    ) -> Result<Box<dyn ResultSet<O, Value = Self::Value> + '_>>;

    /// Indexes every non-null value of every object. Returns `true` if the
    /// index changed.
    fn add_all(&self, objects: &[O]) -> Result<bool>;

    /// Removes the associations of every non-null value of every object.
    /// Returns `true` if the index changed.
    fn remove_all(&self, objects: &[O]) -> Result<bool>;

    /// Removes all associations.
    fn clear(&self) -> Result<()>;

    /// Populates the index from an existing collection.
    fn init(&self, objects: &[O]) -> Result<()>;

    /// Whether the index accepts `add_all` / `remove_all` / `clear`.
    fn is_mutable(&self) -> bool;

    /// Whether results may contain false positives.
    fn is_quantized(&self) -> bool {
        self.capabilities().quantized
    }
}

/// An index that can report the cardinality of its attribute values.
pub trait KeyStatisticsIndex<O>: AttributeIndex<O> {
    /// Distinct attribute values in store order. Each call starts a new scan.
    fn distinct_keys(&self, options: &QueryOptions) -> Result<ResultIter<'_, Self::Value>>;

    /// Number of objects associated with `key`.
    fn count_for_key(&self, key: &Self::Value, options: &QueryOptions) -> Result<u64>;

    /// Number of distinct attribute values ever indexed.
    fn count_of_distinct_keys(&self, options: &QueryOptions) -> Result<u64>;

    /// `(key, count)` for every distinct key.
    fn statistics_for_distinct_keys(
        &self,
        options: &QueryOptions,
    ) -> Result<ResultIter<'_, KeyStatistics<Self::Value>>>;

    /// Every `(attribute value, object)` association, in store order.
    fn keys_and_values(&self, options: &QueryOptions) -> Result<ResultIter<'_, (Self::Value, O)>>;
}
