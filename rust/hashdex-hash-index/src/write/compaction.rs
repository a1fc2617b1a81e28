//! Removal of content blobs that no association references.
//!
//! `remove_all` and `clear` only drop associations. Attribute and object blobs
//! stay in their content maps, so decoded values remain resolvable and
//! `distinct_keys` keeps reporting them. [`HashIndex::compact`] is the explicit
//! pass that reclaims them; nothing calls it implicitly.

use ahash::AHashMap;

use hashdex_common::Result;
use hashdex_index_core::Attribute;
use hashdex_kv::SortedMap;

use crate::HashIndex;

/// Outcome of one [`HashIndex::compact`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Associations scanned to build the reference counts.
    pub associations: u64,
    /// Attribute blobs still referenced by at least one association.
    pub attributes_retained: u64,
    pub attributes_removed: u64,
    /// Object blobs still referenced by at least one association.
    pub objects_retained: u64,
    pub objects_removed: u64,
}

impl<A, O> HashIndex<A, O>
where
    A: Attribute<O>,
    O: 'static,
{
    /// Counts references to every content blob and removes the unreferenced ones.
    ///
    /// Must not run concurrently with `add_all` on the same index: a blob
    /// written after the association scan and before its association could be
    /// removed.
    pub fn compact(&self) -> Result<CompactionStats> {
        let core = self.core();
        let mut attribute_refs = AHashMap::<Vec<u8>, u64>::new();
        let mut object_refs = AHashMap::<Vec<u8>, u64>::new();
        let mut stats = CompactionStats::default();

        for key in core.scan_all()? {
            let key = key?;
            let (attribute_digest, object_digest) = core.codec.split_key(&key)?;
            *attribute_refs.entry(attribute_digest.to_vec()).or_default() += 1;
            *object_refs.entry(object_digest.to_vec()).or_default() += 1;
            stats.associations += 1;
        }

        let (retained, removed) = sweep(core.attributes.as_ref(), &attribute_refs)?;
        stats.attributes_retained = retained;
        stats.attributes_removed = removed;
        let (retained, removed) = sweep(core.objects.as_ref(), &object_refs)?;
        stats.objects_retained = retained;
        stats.objects_removed = removed;

        log::info!(
            "index '{}': compaction removed {} attribute and {} object blobs ({} associations)",
            self.attribute().name(),
            stats.attributes_removed,
            stats.objects_removed,
            stats.associations
        );
        Ok(stats)
    }
}

/// Removes the keys of `map` that have no entry in `refs`.
fn sweep(map: &dyn SortedMap, refs: &AHashMap<Vec<u8>, u64>) -> Result<(u64, u64)> {
    let mut retained = 0u64;
    let mut unreferenced = Vec::new();
    for kv in map.cursor(None)? {
        let (digest, _) = kv?;
        if refs.contains_key(&digest) {
            retained += 1;
        } else {
            unreferenced.push(digest);
        }
    }
    for digest in &unreferenced {
        map.remove(digest)?;
    }
    Ok((retained, unreferenced.len() as u64))
}
