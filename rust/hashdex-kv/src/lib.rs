//! *Sorted key-value store* abstraction: a durable store of named, ordered,
//! byte-keyed maps with point lookups, idempotent inserts and forward cursors.
//!
//! Indexes never interpret keys or values; all type knowledge lives in the
//! codec layer. This crate only promises two things to its consumers:
//!
//! - a [`Cursor`] observes a stable snapshot of its map for its whole lifetime,
//!   regardless of concurrent writers;
//! - single-key `put` / `put_if_absent` / `remove` are atomic.
//!
//! Two implementations are provided: [`memory_store::MemoryKeyValueStore`] and
//! [`local_store::LocalFsKeyValueStore`], which persists maps under a local
//! container directory.

pub mod local_store;
pub mod memory_store;

use std::sync::Arc;

use hashdex_common::Result;

/// A single stored `(key, value)` pair, as yielded by a [`Cursor`].
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Forward, ordered cursor over a map snapshot.
///
/// Dropping the cursor releases the snapshot; there is nothing else to close.
pub type Cursor = Box<dyn Iterator<Item = Result<KeyValue>> + Send>;

/// The `KeyValueStore` trait represents a "storage service" holding any number
/// of independently named [`SortedMap`]s.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Opens the map with the given name, creating an empty one if it does not
    /// exist yet. Opening the same name twice yields handles to the same map.
    fn open_map(&self, name: &str) -> Result<Arc<dyn SortedMap>>;

    /// Returns the names of all maps opened or persisted in this store, sorted.
    fn map_names(&self) -> Result<Vec<String>>;
}

/// An ordered map from byte strings to byte strings.
///
/// Keys are ordered lexicographically by unsigned byte value, so all keys that
/// share a prefix form one contiguous run.
pub trait SortedMap: Send + Sync + 'static {
    /// The name this map was opened under.
    fn name(&self) -> &str;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn contains_key(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Stores `value` under `key`, returning the previous value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Stores `value` under `key` only if the key is absent.
    ///
    /// Returns the value already present, or `None` if the insert took place.
    /// The existing value is never compared to or replaced by `value`.
    fn put_if_absent(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>>;

    fn remove(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn clear(&self) -> Result<()>;

    /// Number of keys in the map.
    fn len(&self) -> Result<u64>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The smallest key in the map.
    fn first_key(&self) -> Result<Option<Vec<u8>>>;

    /// The smallest key greater than or equal to `key`.
    fn ceiling_key(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Opens a forward cursor positioned at `from` (inclusive), or at the first
    /// key when `from` is `None`.
    fn cursor(&self, from: Option<&[u8]>) -> Result<Cursor>;

    /// Whether writes are rejected by this map.
    fn is_read_only(&self) -> bool {
        false
    }
}

/// Checks that a map name is usable: any non-empty string. Stores that map
/// names onto other namespaces (such as file names) escape them themselves.
pub fn validate_map_name(name: &str) -> Result<()> {
    hashdex_common::verify_arg!(name, !name.is_empty());
    Ok(())
}
