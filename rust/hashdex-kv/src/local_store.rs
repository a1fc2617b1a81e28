use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use hashdex_common::{Result, error::Error, verify_data};

use crate::{
    KeyValue, KeyValueStore, SortedMap,
    memory_store::{MemoryKeyValueStore, MemorySortedMap},
    validate_map_name,
};

/// Upper bound on the size of one map file, and on the bytes a decode may claim.
pub const MAX_MAP_FILE_SIZE: usize = 1 << 30;

/// A `LocalFsKeyValueStore` keeps maps in memory and persists them as files
/// confined to a local container directory.
///
/// Each map is stored as `<container>/<stem>.kvmap`, where the stem is the map
/// name with every byte other than ASCII alphanumerics, `_` and `-` written as
/// `%XX`. A map file is loaded the
/// first time the map is opened; [`flush`](Self::flush) writes every open map
/// back. Files are replaced atomically (write to a temporary file, then rename),
/// so a crash during flush leaves either the old or the new image of a map.
///
/// File layout:
///
/// ```text
/// [MAGIC: 8 bytes] [bincode(Vec<(key, value)>)]
/// ```
///
/// Map files larger than [`MAX_MAP_FILE_SIZE`] are rejected.
pub struct LocalFsKeyValueStore {
    /// The top-level directory for this store.
    container_path: PathBuf,
    maps: MemoryKeyValueStore,
    read_only: bool,
}

impl LocalFsKeyValueStore {
    const MAGIC: &'static [u8; 8] = b"HDXKVM01";
    const EXTENSION: &'static str = "kvmap";

    /// Creates a new `LocalFsKeyValueStore` with the given container directory.
    ///
    /// The container directory will be created if it does not exist.
    pub fn new(container_path: &Path) -> Result<LocalFsKeyValueStore> {
        std::fs::create_dir_all(container_path).map_err(|e| {
            Error::io(
                format!("create container {}", container_path.display()),
                e,
            )
        })?;
        log::debug!("local kv store opened at {}", container_path.display());
        Ok(LocalFsKeyValueStore {
            container_path: container_path.to_path_buf(),
            maps: MemoryKeyValueStore::new(),
            read_only: false,
        })
    }

    /// Opens an existing container without write access. All maps reject writes
    /// and [`flush`](Self::flush) is a no-op.
    pub fn open_read_only(container_path: &Path) -> Result<LocalFsKeyValueStore> {
        if !container_path.is_dir() {
            return Err(Error::invalid_arg(
                "container",
                format!("{} is not a directory", container_path.display()),
            ));
        }
        let maps = MemoryKeyValueStore::new();
        maps.set_read_only(true)?;
        Ok(LocalFsKeyValueStore {
            container_path: container_path.to_path_buf(),
            maps,
            read_only: true,
        })
    }

    /// Returns the file system path of the store's top-level container.
    pub fn container_path(&self) -> &Path {
        &self.container_path
    }

    /// Returns the path of the file backing the map `name`.
    pub fn map_path(&self, name: &str) -> Result<PathBuf> {
        validate_map_name(name)?;
        Ok(self
            .container_path
            .join(format!("{}.{}", file_stem(name), Self::EXTENSION)))
    }

    /// Writes every open map to its file.
    pub fn flush(&self) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        for map in self.maps.maps()? {
            let entries = map.entries()?;
            let path = self.map_path(map.name())?;
            Self::write_map_file(&path, &entries)?;
            log::debug!(
                "flushed map '{}' ({} entries) to {}",
                map.name(),
                entries.len(),
                path.display()
            );
        }
        Ok(())
    }

    fn write_map_file(path: &Path, entries: &[KeyValue]) -> Result<()> {
        let mut buf = Self::MAGIC.to_vec();
        let encoded = bincode::encode_to_vec(entries, bincode::config::standard())
            .map_err(|e| Error::codec(format!("encode map file {}", path.display()), e))?;
        buf.extend_from_slice(&encoded);

        let tmp_path = path.with_extension("kvmap.tmp");
        std::fs::write(&tmp_path, &buf)
            .map_err(|e| Error::io(format!("write {}", tmp_path.display()), e))?;
        std::fs::rename(&tmp_path, path)
            .map_err(|e| Error::io(format!("rename {}", tmp_path.display()), e))?;
        Ok(())
    }

    fn read_map_file(path: &Path) -> Result<Vec<KeyValue>> {
        let bytes =
            std::fs::read(path).map_err(|e| Error::io(format!("read {}", path.display()), e))?;
        verify_data!(map_file, bytes.len() <= MAX_MAP_FILE_SIZE);
        verify_data!(map_file, bytes.starts_with(Self::MAGIC));
        let body = &bytes[Self::MAGIC.len()..];

        // Each entry carries two length prefixes of at least one byte.
        let (count, _): (u64, usize) = bincode::decode_from_slice(body, bincode::config::standard())
            .map_err(|e| Error::codec(format!("decode map file {}", path.display()), e))?;
        verify_data!(map_file, count <= (body.len() / 2) as u64);

        let config = bincode::config::standard().with_limit::<MAX_MAP_FILE_SIZE>();
        let (entries, consumed): (Vec<KeyValue>, usize) = bincode::decode_from_slice(body, config)
            .map_err(|e| Error::codec(format!("decode map file {}", path.display()), e))?;
        verify_data!(map_file, consumed == body.len());
        Ok(entries)
    }

    fn persisted_map_names(&self) -> Result<Vec<String>> {
        let dir = std::fs::read_dir(&self.container_path).map_err(|e| {
            Error::io(format!("list {}", self.container_path.display()), e)
        })?;
        let mut names = Vec::new();
        for entry in dir {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(Self::EXTENSION) {
                continue;
            }
            if let Some(name) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(map_name_from_stem)
            {
                names.push(name);
            }
        }
        Ok(names)
    }
}

/// Escapes a map name into a file stem.
fn file_stem(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    for b in name.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' {
            stem.push(char::from(b));
        } else {
            stem.push_str(&format!("%{b:02X}"));
        }
    }
    stem
}

/// Reverses [`file_stem`]. Returns `None` for stems it could not have produced.
fn map_name_from_stem(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut name = Vec::with_capacity(bytes.len());
    let mut pos = 0;
    while pos < bytes.len() {
        if bytes[pos] == b'%' {
            let hex = stem.get(pos + 1..pos + 3)?;
            name.push(u8::from_str_radix(hex, 16).ok()?);
            pos += 3;
        } else {
            name.push(bytes[pos]);
            pos += 1;
        }
    }
    String::from_utf8(name).ok()
}

impl KeyValueStore for LocalFsKeyValueStore {
    fn open_map(&self, name: &str) -> Result<Arc<dyn SortedMap>> {
        if let Some(map) = self.maps.get_map(name)? {
            let map: Arc<dyn SortedMap> = map;
            return Ok(map);
        }
        let path = self.map_path(name)?;
        let map = if path.is_file() {
            let entries = Self::read_map_file(&path)?;
            log::debug!(
                "loaded map '{name}' ({} entries) from {}",
                entries.len(),
                path.display()
            );
            MemorySortedMap::from_entries(name, entries)
        } else {
            MemorySortedMap::new(name)
        };
        let map: Arc<dyn SortedMap> = self.maps.insert_map(map)?;
        Ok(map)
    }

    fn map_names(&self) -> Result<Vec<String>> {
        let mut names = self.maps.map_names()?;
        names.extend(self.persisted_map_names()?);
        names.sort();
        names.dedup();
        Ok(names)
    }
}
