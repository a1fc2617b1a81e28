//! Canonical encoding of index entries.
//!
//! An association is stored under a *composite key*: the digest of the
//! attribute's canonical bytes followed by the digest of the object's canonical
//! bytes. Both digests have the same width (`hash_size`), so every key is
//! exactly `2 * hash_size` bytes, and all keys of one attribute value form a
//! contiguous run in the association map.

use std::sync::Arc;

use hashdex_codec::{Codec, Digest, HashFunction};
use hashdex_common::{Result, error::Error, verify_data};
use hashdex_kv::SortedMap;

/// The transient product of encoding one `(object, value)` pair.
///
/// Its fields are fanned out into the three maps of an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// `attribute_digest ‖ object_digest`.
    pub key: Vec<u8>,
    /// Canonical object bytes.
    pub object: Vec<u8>,
    pub object_digest: Digest,
    /// Canonical attribute bytes.
    pub attribute: Vec<u8>,
    pub attribute_digest: Digest,
}

/// Codecs and hash function of one index, resolved at construction.
pub(crate) struct EntryCodec<V, O> {
    attribute_codec: Arc<dyn Codec<V>>,
    object_codec: Arc<dyn Codec<O>>,
    hash: Arc<dyn HashFunction>,
    hash_size: usize,
}

impl<V: 'static, O: 'static> EntryCodec<V, O> {
    pub fn new(
        attribute_codec: Arc<dyn Codec<V>>,
        object_codec: Arc<dyn Codec<O>>,
        hash: Arc<dyn HashFunction>,
    ) -> Result<EntryCodec<V, O>> {
        let hash_size = hash.hash_size();
        if hash_size == 0 {
            return Err(Error::invalid_arg(
                "hash",
                format!("hash function '{}' has zero-width output", hash.name()),
            ));
        }
        Ok(EntryCodec {
            attribute_codec,
            object_codec,
            hash,
            hash_size,
        })
    }

    pub fn hash_size(&self) -> usize {
        self.hash_size
    }

    pub fn hash_name(&self) -> &str {
        self.hash.name()
    }

    /// Digest of the canonical bytes of `value`.
    pub fn encode_attribute(&self, value: &V) -> Result<Digest> {
        let bytes = self.attribute_codec.to_bytes(value)?;
        Ok(self.hash.hash(&bytes))
    }

    /// Digest of the canonical bytes of `object`.
    pub fn encode_object(&self, object: &O) -> Result<Digest> {
        let bytes = self.object_codec.to_bytes(object)?;
        Ok(self.hash.hash(&bytes))
    }

    pub fn encode_entry(&self, object: &O, value: &V) -> Result<Entry> {
        let attribute = self.attribute_codec.to_bytes(value)?;
        let object = self.object_codec.to_bytes(object)?;
        let attribute_digest = self.hash.hash(&attribute);
        let object_digest = self.hash.hash(&object);

        let mut key = Vec::with_capacity(self.hash_size * 2);
        key.extend_from_slice(attribute_digest.as_bytes());
        key.extend_from_slice(object_digest.as_bytes());
        verify_data!(composite_key, key.len() == self.hash_size * 2);

        Ok(Entry {
            key,
            object,
            object_digest,
            attribute,
            attribute_digest,
        })
    }

    /// Smallest composite key that can carry `attribute_digest`: the digest
    /// followed by an all-zero object digest.
    pub fn lower_bound(&self, attribute_digest: &Digest) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.hash_size * 2);
        key.extend_from_slice(attribute_digest.as_bytes());
        key.resize(self.hash_size * 2, 0);
        key
    }

    /// Splits a composite key into its attribute and object digests.
    pub fn split_key<'a>(&self, key: &'a [u8]) -> Result<(&'a [u8], &'a [u8])> {
        verify_data!(composite_key, key.len() == self.hash_size * 2);
        Ok(key.split_at(self.hash_size))
    }

    /// Decodes the attribute value of a composite key, through the attribute
    /// content map.
    pub fn decode_key(&self, attributes: &dyn SortedMap, key: &[u8]) -> Result<V> {
        let (attribute_digest, _) = self.split_key(key)?;
        self.decode_attribute(attributes, attribute_digest)
    }

    pub fn decode_attribute(&self, attributes: &dyn SortedMap, digest: &[u8]) -> Result<V> {
        let bytes = attributes
            .get(digest)?
            .ok_or_else(|| Error::missing_content(attributes.name(), digest))?;
        self.attribute_codec.from_bytes(&bytes)
    }

    pub fn decode_attribute_bytes(&self, bytes: &[u8]) -> Result<V> {
        self.attribute_codec.from_bytes(bytes)
    }

    pub fn decode_object(&self, objects: &dyn SortedMap, digest: &[u8]) -> Result<O> {
        let bytes = objects
            .get(digest)?
            .ok_or_else(|| Error::missing_content(objects.name(), digest))?;
        self.object_codec.from_bytes(&bytes)
    }
}
