//! In-memory implementation of the `KeyValueStore` trait.

use std::{
    collections::BTreeMap,
    ops::Bound,
    sync::{
        Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use hashdex_common::{Result, error::Error};

use crate::{Cursor, KeyValue, KeyValueStore, SortedMap, validate_map_name};

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

/// A `KeyValueStore` keeping every map in process memory.
///
/// Maps are copy-on-write: a cursor pins the tree that was current when it was
/// opened, and the first write after that clones the tree instead of mutating
/// the pinned one. Cursors therefore never observe concurrent modifications.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    maps: RwLock<ahash::HashMap<String, Arc<MemorySortedMap>>>,
    read_only: AtomicBool,
}

impl MemoryKeyValueStore {
    pub fn new() -> MemoryKeyValueStore {
        Default::default()
    }

    /// Marks every current and future map of this store as read-only (or writable again).
    pub fn set_read_only(&self, read_only: bool) -> Result<()> {
        self.read_only.store(read_only, Ordering::Release);
        for map in self.read_maps()?.values() {
            map.set_read_only(read_only);
        }
        Ok(())
    }

    /// Returns handles to all maps currently held by the store.
    pub fn maps(&self) -> Result<Vec<Arc<MemorySortedMap>>> {
        let mut maps = self.read_maps()?.values().cloned().collect::<Vec<_>>();
        maps.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(maps)
    }

    /// Returns the concrete map registered under `name`, if any.
    pub fn get_map(&self, name: &str) -> Result<Option<Arc<MemorySortedMap>>> {
        Ok(self.read_maps()?.get(name).cloned())
    }

    /// Registers `map` unless a map with the same name already exists, and
    /// returns whichever map ends up registered.
    pub fn insert_map(&self, map: MemorySortedMap) -> Result<Arc<MemorySortedMap>> {
        let mut maps = self
            .maps
            .write()
            .map_err(|_| Error::invalid_operation("memory store: lock poisoned"))?;
        let map = maps
            .entry(map.name.clone())
            .or_insert_with(|| Arc::new(map))
            .clone();
        if self.read_only.load(Ordering::Acquire) {
            map.set_read_only(true);
        }
        Ok(map)
    }

    /// Opens (or creates) the map with the given name, returning the concrete type.
    pub fn open_memory_map(&self, name: &str) -> Result<Arc<MemorySortedMap>> {
        validate_map_name(name)?;
        if let Some(map) = self.get_map(name)? {
            return Ok(map);
        }
        self.insert_map(MemorySortedMap::new(name))
    }

    fn read_maps(
        &self,
    ) -> Result<RwLockReadGuard<'_, ahash::HashMap<String, Arc<MemorySortedMap>>>> {
        self.maps
            .read()
            .map_err(|_| Error::invalid_operation("memory store: lock poisoned"))
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn open_map(&self, name: &str) -> Result<Arc<dyn SortedMap>> {
        let map: Arc<dyn SortedMap> = self.open_memory_map(name)?;
        Ok(map)
    }

    fn map_names(&self) -> Result<Vec<String>> {
        let mut names = self.read_maps()?.keys().cloned().collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }
}

/// A single copy-on-write ordered map.
pub struct MemorySortedMap {
    name: String,
    tree: RwLock<Arc<Tree>>,
    read_only: AtomicBool,
}

impl MemorySortedMap {
    pub fn new(name: impl Into<String>) -> MemorySortedMap {
        Self::from_entries(name, std::iter::empty())
    }

    pub fn from_entries(
        name: impl Into<String>,
        entries: impl IntoIterator<Item = KeyValue>,
    ) -> MemorySortedMap {
        MemorySortedMap {
            name: name.into(),
            tree: RwLock::new(Arc::new(entries.into_iter().collect())),
            read_only: AtomicBool::new(false),
        }
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Release);
    }

    /// Returns a point-in-time copy of all entries, in key order.
    pub fn entries(&self) -> Result<Vec<KeyValue>> {
        Ok(self
            .snapshot()?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn snapshot(&self) -> Result<Arc<Tree>> {
        let tree = self
            .tree
            .read()
            .map_err(|_| Error::invalid_operation(format!("map '{}': lock poisoned", self.name)))?;
        Ok(Arc::clone(&tree))
    }

    fn write_tree(&self) -> Result<RwLockWriteGuard<'_, Arc<Tree>>> {
        if self.is_read_only() {
            return Err(Error::invalid_operation(format!(
                "map '{}' is read-only",
                self.name
            )));
        }
        self.tree
            .write()
            .map_err(|_| Error::invalid_operation(format!("map '{}': lock poisoned", self.name)))
    }
}

impl SortedMap for MemorySortedMap {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.snapshot()?.get(key).cloned())
    }

    fn contains_key(&self, key: &[u8]) -> Result<bool> {
        Ok(self.snapshot()?.contains_key(key))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut tree = self.write_tree()?;
        Ok(Arc::make_mut(&mut tree).insert(key.to_vec(), value.to_vec()))
    }

    fn put_if_absent(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut tree = self.write_tree()?;
        if let Some(existing) = tree.get(key) {
            return Ok(Some(existing.clone()));
        }
        Arc::make_mut(&mut tree).insert(key.to_vec(), value.to_vec());
        Ok(None)
    }

    fn remove(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut tree = self.write_tree()?;
        if !tree.contains_key(key) {
            return Ok(None);
        }
        Ok(Arc::make_mut(&mut tree).remove(key))
    }

    fn clear(&self) -> Result<()> {
        let mut tree = self.write_tree()?;
        *tree = Arc::new(Tree::new());
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.snapshot()?.len() as u64)
    }

    fn first_key(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.snapshot()?.keys().next().cloned())
    }

    fn ceiling_key(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .snapshot()?
            .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
            .next()
            .map(|(k, _)| k.clone()))
    }

    fn cursor(&self, from: Option<&[u8]>) -> Result<Cursor> {
        let lower = match from {
            Some(key) => Bound::Included(key.to_vec()),
            None => Bound::Unbounded,
        };
        Ok(Box::new(SnapshotCursor {
            snapshot: self.snapshot()?,
            lower,
        }))
    }

    fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }
}

/// Cursor over a pinned tree. Each step re-seeks past the last returned key,
/// so the cursor owns nothing but the snapshot and its position.
struct SnapshotCursor {
    snapshot: Arc<Tree>,
    lower: Bound<Vec<u8>>,
}

impl Iterator for SnapshotCursor {
    type Item = Result<KeyValue>;

    fn next(&mut self) -> Option<Self::Item> {
        let lower = match &self.lower {
            Bound::Included(key) => Bound::Included(key.as_slice()),
            Bound::Excluded(key) => Bound::Excluded(key.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
        };
        let (key, value) = self
            .snapshot
            .range::<[u8], _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()))?;
        self.lower = Bound::Excluded(key.clone());
        Some(Ok((key, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(cursor: Cursor) -> Vec<Vec<u8>> {
        cursor.map(|kv| kv.unwrap().0).collect()
    }

    #[test]
    fn test_open_map_returns_same_map() {
        let store = MemoryKeyValueStore::new();
        let a = store.open_map("m").unwrap();
        a.put(b"k", b"v").unwrap();
        let b = store.open_map("m").unwrap();
        assert_eq!(b.get(b"k").unwrap().as_deref(), Some(&b"v"[..]));
        assert_eq!(store.map_names().unwrap(), vec!["m".to_string()]);
        assert!(store.open_map("").is_err());
        let odd = store.open_map("index_order:total / $x").unwrap();
        assert_eq!(odd.name(), "index_order:total / $x");
    }

    #[test]
    fn test_put_if_absent_keeps_first_value() {
        let map = MemorySortedMap::new("m");
        assert_eq!(map.put_if_absent(b"k", b"first").unwrap(), None);
        assert_eq!(
            map.put_if_absent(b"k", b"second").unwrap().as_deref(),
            Some(&b"first"[..])
        );
        assert_eq!(map.get(b"k").unwrap().as_deref(), Some(&b"first"[..]));
        assert_eq!(map.len().unwrap(), 1);
    }

    #[test]
    fn test_ceiling_and_first_key() {
        let map = MemorySortedMap::new("m");
        assert_eq!(map.first_key().unwrap(), None);
        let ks: [&[u8]; 4] = [b"b1", b"a2", b"c0", b"b0"];
        for k in ks {
            map.put(k, b"").unwrap();
        }
        assert_eq!(map.first_key().unwrap().unwrap(), b"a2");
        assert_eq!(map.ceiling_key(b"b").unwrap().unwrap(), b"b0");
        assert_eq!(map.ceiling_key(b"b0").unwrap().unwrap(), b"b0");
        assert_eq!(map.ceiling_key(b"b2").unwrap().unwrap(), b"c0");
        assert_eq!(map.ceiling_key(b"d").unwrap(), None);
    }

    #[test]
    fn test_cursor_order_and_start() {
        let map = MemorySortedMap::new("m");
        for i in [5u8, 1, 3, 2, 4] {
            map.put(&[i], &[i * 10]).unwrap();
        }
        assert_eq!(
            keys(map.cursor(None).unwrap()),
            vec![vec![1], vec![2], vec![3], vec![4], vec![5]]
        );
        assert_eq!(
            keys(map.cursor(Some(&[3u8][..])).unwrap()),
            vec![vec![3], vec![4], vec![5]]
        );
        let values = map
            .cursor(Some(&[4u8][..]))
            .unwrap()
            .map(|kv| kv.unwrap().1)
            .collect::<Vec<_>>();
        assert_eq!(values, vec![vec![40], vec![50]]);
    }

    #[test]
    fn test_cursor_is_snapshot_stable() {
        let map = MemorySortedMap::new("m");
        for i in 0u8..10 {
            map.put(&[i], b"").unwrap();
        }
        let mut cursor = map.cursor(None).unwrap();
        assert_eq!(cursor.next().unwrap().unwrap().0, vec![0]);

        map.remove(&[5]).unwrap();
        map.put(&[100], b"").unwrap();
        map.clear().unwrap();

        let rest = cursor.map(|kv| kv.unwrap().0[0]).collect::<Vec<_>>();
        assert_eq!(rest, (1u8..10).collect::<Vec<_>>());
        assert!(map.is_empty().unwrap());
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let store = MemoryKeyValueStore::new();
        let map = store.open_map("m").unwrap();
        map.put(b"k", b"v").unwrap();
        store.set_read_only(true).unwrap();
        assert!(map.is_read_only());
        assert!(map.put(b"k2", b"v").is_err());
        assert!(map.remove(b"k").is_err());
        assert!(map.clear().is_err());
        assert_eq!(map.get(b"k").unwrap().as_deref(), Some(&b"v"[..]));

        let late = store.open_map("late").unwrap();
        assert!(late.is_read_only());

        store.set_read_only(false).unwrap();
        assert!(map.put(b"k2", b"v").is_ok());
    }

    #[test]
    fn test_random_workload_matches_btreemap() {
        fastrand::seed(7741);
        let map = MemorySortedMap::new("m");
        let mut model = BTreeMap::new();
        for _ in 0..2000 {
            let key = vec![fastrand::u8(..16), fastrand::u8(..4)];
            match fastrand::u8(..3) {
                0 => {
                    let value = vec![fastrand::u8(..)];
                    assert_eq!(map.put(&key, &value).unwrap(), model.insert(key, value));
                }
                1 => {
                    assert_eq!(map.remove(&key).unwrap(), model.remove(&key));
                }
                _ => {
                    let expected = model.range(key.clone()..).next().map(|(k, _)| k.clone());
                    assert_eq!(map.ceiling_key(&key).unwrap(), expected);
                }
            }
        }
        let all = map
            .cursor(None)
            .unwrap()
            .map(|kv| kv.unwrap())
            .collect::<Vec<_>>();
        assert_eq!(all, model.into_iter().collect::<Vec<_>>());
    }
}
