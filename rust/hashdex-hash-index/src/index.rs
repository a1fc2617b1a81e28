use std::{fmt, marker::PhantomData, sync::Arc};

use hashdex_codec::{Codec, CodecRegistry, Digest, HashAlgorithm, HashFunction};
use hashdex_common::{Result, error::Error};
use hashdex_index_core::{
    Attribute, AttributeIndex, Capabilities, Query, QueryOptions, ResultSet,
};
use hashdex_kv::{KeyValueStore, SortedMap};

use crate::{
    HashIndexType,
    entry::{Entry, EntryCodec},
    read::{
        cursor::AssociationScan,
        result_set::{ExactMatchResultSet, ExistenceResultSet},
    },
};

/// Retrieval cost reported by hash index results when no other cost is configured.
pub const INDEX_RETRIEVAL_COST: u32 = 30;

/// A content-addressed hash index over one attribute of a collection of `O`.
///
/// The index binds to three maps of a [`KeyValueStore`] at construction:
///
/// - `index_<attr>`: composite key (`attribute digest ‖ object digest`) to
///   object digest, one entry per indexed `(object, value)` pair
/// - `index_attrhash_<attr>`: attribute digest to canonical attribute bytes
/// - `index_objhash_<attr>`: object digest to canonical object bytes
///
/// The two content maps are write-once per key and are never pruned by
/// `remove_all` or `clear`; see [`HashIndex::compact`].
///
/// # Usage
///
/// ```rust,ignore
/// let color = attribute::single("color", |car: &Car| car.color.clone());
/// let index = HashIndexOptions::new(store)
///     .hash_algorithm(HashAlgorithm::Sha256)
///     .open_structural(color)?;
/// index.add_all(&cars)?;
///
/// let red = index.retrieve(Query::equal(index.attribute(), "red".into()), QueryOptions::new())?;
/// for car in red.iter()? {
///     println!("{:?}", car?);
/// }
/// ```
pub struct HashIndex<A, O>
where
    A: Attribute<O>,
{
    attribute: Arc<A>,
    core: Arc<IndexCore<A::Value, O>>,
    capabilities: Capabilities,
}

/// Maps and codecs shared by an index and the result sets it hands out.
pub(crate) struct IndexCore<V, O> {
    pub associations: Arc<dyn SortedMap>,
    pub attributes: Arc<dyn SortedMap>,
    pub objects: Arc<dyn SortedMap>,
    pub codec: EntryCodec<V, O>,
}

impl<V: 'static, O: 'static> IndexCore<V, O> {
    /// Forward scan over the composite keys of one attribute digest.
    pub fn scan_attribute(&self, attribute_digest: &Digest) -> Result<AssociationScan> {
        let lower = self.codec.lower_bound(attribute_digest);
        match self.associations.ceiling_key(&lower)? {
            Some(from) if from.starts_with(attribute_digest.as_bytes()) => Ok(
                AssociationScan::new(
                    self.associations.cursor(Some(&from))?,
                    attribute_digest.as_bytes().to_vec(),
                ),
            ),
            _ => Ok(AssociationScan::empty()),
        }
    }

    /// Forward scan over every composite key.
    pub fn scan_all(&self) -> Result<AssociationScan> {
        match self.associations.first_key()? {
            Some(from) => Ok(AssociationScan::new(
                self.associations.cursor(Some(&from))?,
                Vec::new(),
            )),
            None => Ok(AssociationScan::empty()),
        }
    }

    pub fn count_for_key(&self, key: &V) -> Result<u64> {
        let digest = self.codec.encode_attribute(key)?;
        let mut count = 0u64;
        for key in self.scan_attribute(&digest)? {
            key?;
            count += 1;
        }
        Ok(count)
    }

    /// Resolves the object half of a composite key.
    pub fn object_for_key(&self, key: &[u8]) -> Result<O> {
        let (_, object_digest) = self.codec.split_key(key)?;
        self.codec.decode_object(self.objects.as_ref(), object_digest)
    }

    /// Whether the object digest of `object` is present in the object content map.
    pub fn has_object(&self, object: &O) -> Result<bool> {
        let digest = self.codec.encode_object(object)?;
        self.objects.contains_key(digest.as_bytes())
    }
}

impl<A, O> HashIndex<A, O>
where
    A: Attribute<O>,
    O: 'static,
{
    pub fn attribute(&self) -> &A {
        &self.attribute
    }

    /// Digest width in bytes; composite keys are twice as long.
    pub fn hash_size(&self) -> usize {
        self.core.codec.hash_size()
    }

    /// Names of the association, attribute content, and object content maps.
    pub fn map_names(&self) -> [&str; 3] {
        [
            self.core.associations.name(),
            self.core.attributes.name(),
            self.core.objects.name(),
        ]
    }

    /// Digest of the canonical bytes of `value`.
    pub fn encode_attribute(&self, value: &A::Value) -> Result<Digest> {
        self.core.codec.encode_attribute(value)
    }

    pub fn encode_entry(&self, object: &O, value: &A::Value) -> Result<Entry> {
        self.core.codec.encode_entry(object, value)
    }

    /// Decodes the attribute value of a composite key through the attribute
    /// content map.
    pub fn decode_key(&self, key: &[u8]) -> Result<A::Value> {
        self.core
            .codec
            .decode_key(self.core.attributes.as_ref(), key)
    }

    pub(crate) fn core(&self) -> &Arc<IndexCore<A::Value, O>> {
        &self.core
    }

    /// Non-null values of `object`.
    fn present_values(&self, object: &O) -> impl Iterator<Item = A::Value> {
        self.attribute.values(object).into_iter().flatten()
    }
}

impl<A, O> AttributeIndex<O> for HashIndex<A, O>
where
    A: Attribute<O>,
    A::Value: PartialOrd + fmt::Debug,
    O: 'static,
{
    type Value = A::Value;

    fn attribute_name(&self) -> &str {
        self.attribute.name()
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn retrieve(
        &self,
        query: Query<A::Value>,
        options: QueryOptions,
    ) -> Result<Box<dyn ResultSet<O, Value = A::Value> + '_>> {
        if query.attribute_name() != self.attribute.name() {
            return Err(Error::invalid_arg(
                "query",
                format!(
                    "query on '{}' sent to the index on '{}'",
                    query.attribute_name(),
                    self.attribute.name()
                ),
            ));
        }
        let cost = self.capabilities.retrieval_cost;
        match query {
            Query::Equal { .. } => Ok(Box::new(ExactMatchResultSet::new(
                Arc::clone(&self.attribute),
                Arc::clone(&self.core),
                query,
                options,
                cost,
            )?)),
            Query::Has { .. } => Ok(Box::new(ExistenceResultSet::new(
                Arc::clone(&self.attribute),
                Arc::clone(&self.core),
                query,
                options,
                cost,
            ))),
            other => Err(Error::unsupported_query(other.to_string())),
        }
    }

    fn add_all(&self, objects: &[O]) -> Result<bool> {
        let core = &self.core;
        let mut added = 0usize;
        let mut existing = 0usize;
        for object in objects {
            for value in self.present_values(object) {
                let entry = core.codec.encode_entry(object, &value)?;
                core.attributes
                    .put_if_absent(entry.attribute_digest.as_bytes(), &entry.attribute)?;
                core.objects
                    .put_if_absent(entry.object_digest.as_bytes(), &entry.object)?;
                let previous = core
                    .associations
                    .put(&entry.key, entry.object_digest.as_bytes())?;
                if previous.is_none() {
                    added += 1;
                } else {
                    existing += 1;
                }
                log::trace!(
                    "index '{}': put {} -> {}",
                    self.attribute.name(),
                    entry.attribute_digest,
                    entry.object_digest
                );
            }
        }
        log::debug!(
            "index '{}': add_all of {} objects, {added} associations added, {existing} already present",
            self.attribute.name(),
            objects.len()
        );
        Ok(added > 0)
    }

    fn remove_all(&self, objects: &[O]) -> Result<bool> {
        let core = &self.core;
        let mut removed = 0usize;
        for object in objects {
            for value in self.present_values(object) {
                let entry = core.codec.encode_entry(object, &value)?;
                if core.associations.remove(&entry.key)?.is_some() {
                    removed += 1;
                    log::trace!(
                        "index '{}': removed {} -> {}",
                        self.attribute.name(),
                        entry.attribute_digest,
                        entry.object_digest
                    );
                }
            }
        }
        log::debug!(
            "index '{}': remove_all of {} objects, {removed} associations removed",
            self.attribute.name(),
            objects.len()
        );
        Ok(removed > 0)
    }

    fn clear(&self) -> Result<()> {
        log::debug!("index '{}': clearing associations", self.attribute.name());
        self.core.associations.clear()
    }

    fn init(&self, objects: &[O]) -> Result<()> {
        self.add_all(objects).map(|_| ())
    }

    fn is_mutable(&self) -> bool {
        !self.core.associations.is_read_only()
    }

    fn is_quantized(&self) -> bool {
        false
    }
}

/// Options for opening a [`HashIndex`].
pub struct HashIndexOptions {
    store: Arc<dyn KeyValueStore>,
    hash: Arc<dyn HashFunction>,
    codecs: Arc<CodecRegistry>,
    retrieval_cost: u32,
}

impl HashIndexOptions {
    /// Creates new options over `store`, with SHA-256 digests, a registry of
    /// the built-in codecs, and the default retrieval cost.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            hash: Arc::new(HashAlgorithm::default()),
            codecs: Arc::new(CodecRegistry::new()),
            retrieval_cost: INDEX_RETRIEVAL_COST,
        }
    }

    pub fn hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash = Arc::new(algorithm);
        self
    }

    /// Uses a custom hash function. Its output width becomes the digest width.
    pub fn hash_function(mut self, hash: Arc<dyn HashFunction>) -> Self {
        self.hash = hash;
        self
    }

    /// Sets the registry codecs are resolved from.
    pub fn codecs(mut self, codecs: Arc<CodecRegistry>) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn retrieval_cost(mut self, retrieval_cost: u32) -> Self {
        self.retrieval_cost = retrieval_cost;
        self
    }

    /// Opens the index on `attribute`, resolving both the attribute value codec
    /// and the object codec from the registry.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::UnsupportedType` if either codec is not registered.
    pub fn open<A, O>(self, attribute: A) -> Result<HashIndex<A, O>>
    where
        A: Attribute<O>,
        O: 'static,
    {
        let attribute_codec = self.codecs.resolve::<A::Value>()?;
        let object_codec = self.codecs.resolve::<O>()?;
        self.open_with_codecs(attribute, attribute_codec, object_codec)
    }

    /// Like [`open()`](Self::open), but falls back to the `bincode` structural
    /// codec for an object type with no registered codec.
    pub fn open_structural<A, O>(self, attribute: A) -> Result<HashIndex<A, O>>
    where
        A: Attribute<O>,
        O: bincode::Encode + bincode::Decode<()> + 'static,
    {
        let attribute_codec = self.codecs.resolve::<A::Value>()?;
        let object_codec = self.codecs.resolve_or_structural::<O>()?;
        self.open_with_codecs(attribute, attribute_codec, object_codec)
    }

    /// Opens the index with explicitly supplied codecs.
    pub fn open_with_codecs<A, O>(
        self,
        attribute: A,
        attribute_codec: Arc<dyn Codec<A::Value>>,
        object_codec: Arc<dyn Codec<O>>,
    ) -> Result<HashIndex<A, O>>
    where
        A: Attribute<O>,
        O: 'static,
    {
        let name = attribute.name();
        let associations = self.store.open_map(&format!("index_{name}"))?;
        let attributes = self.store.open_map(&format!("index_attrhash_{name}"))?;
        let objects = self.store.open_map(&format!("index_objhash_{name}"))?;
        let codec = EntryCodec::new(attribute_codec, object_codec, self.hash)?;

        log::debug!(
            "opened hash index on '{name}': maps {}, {}, {}; {} digests of {} bytes",
            associations.name(),
            attributes.name(),
            objects.name(),
            codec.hash_name(),
            codec.hash_size()
        );

        Ok(HashIndex {
            attribute: Arc::new(attribute),
            core: Arc::new(IndexCore {
                associations,
                attributes,
                objects,
                codec,
            }),
            capabilities: HashIndexType::build_capabilities(self.retrieval_cost),
        })
    }
}

/// Marker for result sets that need the object type without storing one.
pub(crate) type ObjectMarker<O> = PhantomData<fn() -> O>;
