//! Cardinality statistics for query planners.

use std::{fmt, sync::Arc};

use hashdex_common::Result;
use hashdex_index_core::{
    Attribute, KeyStatistics, KeyStatisticsIndex, QueryOptions, ResultIter,
};

use crate::HashIndex;

impl<A, O> KeyStatisticsIndex<O> for HashIndex<A, O>
where
    A: Attribute<O>,
    A::Value: PartialOrd + fmt::Debug,
    O: 'static,
{
    /// Decodes every entry of the attribute content map, in digest order.
    ///
    /// Values whose associations were all removed are still reported, since
    /// their content blobs are retained.
    fn distinct_keys(&self, _options: &QueryOptions) -> Result<ResultIter<'_, A::Value>> {
        let core = Arc::clone(self.core());
        let cursor = core.attributes.cursor(None)?;
        Ok(Box::new(cursor.map(move |kv| {
            let (_, bytes) = kv?;
            core.codec.decode_attribute_bytes(&bytes)
        })))
    }

    /// Counts the contiguous run of composite keys carrying the digest of `key`.
    fn count_for_key(&self, key: &A::Value, _options: &QueryOptions) -> Result<u64> {
        self.core().count_for_key(key)
    }

    /// Size of the attribute content map.
    fn count_of_distinct_keys(&self, _options: &QueryOptions) -> Result<u64> {
        self.core().attributes.len()
    }

    /// Runs [`count_for_key`](KeyStatisticsIndex::count_for_key) for each
    /// distinct key as the iterator advances: O(total associations) overall.
    fn statistics_for_distinct_keys(
        &self,
        options: &QueryOptions,
    ) -> Result<ResultIter<'_, KeyStatistics<A::Value>>> {
        let core = Arc::clone(self.core());
        let keys = self.distinct_keys(options)?;
        Ok(Box::new(keys.map(move |key| {
            let key = key?;
            let count = core.count_for_key(&key)?;
            Ok(KeyStatistics::new(key, count))
        })))
    }

    fn keys_and_values(
        &self,
        _options: &QueryOptions,
    ) -> Result<ResultIter<'_, (A::Value, O)>> {
        let core = Arc::clone(self.core());
        let scan = core.scan_all()?;
        Ok(Box::new(scan.map(move |key| {
            let key = key?;
            let value = core.codec.decode_key(core.attributes.as_ref(), &key)?;
            let object = core.object_for_key(&key)?;
            Ok((value, object))
        })))
    }
}
