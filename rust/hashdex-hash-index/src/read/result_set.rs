//! Result sets for the query shapes a hash index serves.
//!
//! Both result sets are lazy: nothing is read from the store until
//! [`iter()`](ResultSet::iter) is called, and every call opens a fresh cursor.

use std::{fmt, sync::Arc};

use hashdex_codec::Digest;
use hashdex_common::Result;
use hashdex_index_core::{Attribute, Query, QueryOptions, ResultIter, ResultSet};

use crate::index::{IndexCore, ObjectMarker};

/// Objects that have one exact attribute value.
///
/// Iteration seeks to the first composite key carrying the value's digest and
/// walks forward while the leading digest still matches, resolving each object
/// digest through the object content map.
pub struct ExactMatchResultSet<A, O>
where
    A: Attribute<O>,
{
    attribute: Arc<A>,
    core: Arc<IndexCore<A::Value, O>>,
    query: Query<A::Value>,
    options: QueryOptions,
    attribute_digest: Digest,
    retrieval_cost: u32,
    _p: ObjectMarker<O>,
}

impl<A, O> ExactMatchResultSet<A, O>
where
    A: Attribute<O>,
    O: 'static,
{
    pub(crate) fn new(
        attribute: Arc<A>,
        core: Arc<IndexCore<A::Value, O>>,
        query: Query<A::Value>,
        options: QueryOptions,
        retrieval_cost: u32,
    ) -> Result<Self> {
        let attribute_digest = match &query {
            Query::Equal { value, .. } => core.codec.encode_attribute(value)?,
            _ => {
                return Err(hashdex_common::error::Error::invalid_arg(
                    "query",
                    "exact-match result requires an equal query",
                ));
            }
        };
        Ok(ExactMatchResultSet {
            attribute,
            core,
            query,
            options,
            attribute_digest,
            retrieval_cost,
            _p: Default::default(),
        })
    }

    /// Digest of the queried attribute value.
    pub fn attribute_digest(&self) -> &Digest {
        &self.attribute_digest
    }
}

impl<A, O> ResultSet<O> for ExactMatchResultSet<A, O>
where
    A: Attribute<O>,
    A::Value: PartialOrd + fmt::Debug,
    O: 'static,
{
    type Value = A::Value;

    fn iter(&self) -> Result<ResultIter<'_, O>> {
        let core = Arc::clone(&self.core);
        let scan = self.core.scan_attribute(&self.attribute_digest)?;
        Ok(Box::new(scan.map(move |key| core.object_for_key(&key?))))
    }

    /// Checks the object's digest against the object content map, without a scan.
    ///
    /// The content map keeps blobs after their associations are removed, and
    /// it is shared by all values of the attribute, so this is a candidate test:
    /// confirm with [`matches()`](ResultSet::matches) when exactness matters.
    fn contains(&self, object: &O) -> Result<bool> {
        self.core.has_object(object)
    }

    fn matches(&self, object: &O) -> bool {
        self.query.matches(self.attribute.as_ref(), object)
    }

    fn query(&self) -> &Query<A::Value> {
        &self.query
    }

    fn query_options(&self) -> &QueryOptions {
        &self.options
    }

    fn retrieval_cost(&self) -> u32 {
        self.retrieval_cost
    }
}

/// Objects that have at least one non-null attribute value.
///
/// Iteration is a full forward scan of the association map. An object indexed
/// under several values is yielded once per value.
pub struct ExistenceResultSet<A, O>
where
    A: Attribute<O>,
{
    attribute: Arc<A>,
    core: Arc<IndexCore<A::Value, O>>,
    query: Query<A::Value>,
    options: QueryOptions,
    retrieval_cost: u32,
    _p: ObjectMarker<O>,
}

impl<A, O> ExistenceResultSet<A, O>
where
    A: Attribute<O>,
{
    pub(crate) fn new(
        attribute: Arc<A>,
        core: Arc<IndexCore<A::Value, O>>,
        query: Query<A::Value>,
        options: QueryOptions,
        retrieval_cost: u32,
    ) -> Self {
        ExistenceResultSet {
            attribute,
            core,
            query,
            options,
            retrieval_cost,
            _p: Default::default(),
        }
    }
}

impl<A, O> ResultSet<O> for ExistenceResultSet<A, O>
where
    A: Attribute<O>,
    A::Value: PartialOrd + fmt::Debug,
    O: 'static,
{
    type Value = A::Value;

    fn iter(&self) -> Result<ResultIter<'_, O>> {
        let core = Arc::clone(&self.core);
        let scan = self.core.scan_all()?;
        Ok(Box::new(scan.map(move |key| core.object_for_key(&key?))))
    }

    fn contains(&self, object: &O) -> Result<bool> {
        self.core.has_object(object)
    }

    fn matches(&self, object: &O) -> bool {
        self.query.matches(self.attribute.as_ref(), object)
    }

    fn query(&self) -> &Query<A::Value> {
        &self.query
    }

    fn query_options(&self) -> &QueryOptions {
        &self.options
    }

    fn retrieval_cost(&self) -> u32 {
        self.retrieval_cost
    }
}
