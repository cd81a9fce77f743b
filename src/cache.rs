#![forbid(unsafe_code)]

//! Local response cache. Every payload fetched from YouTube is stored under a
//! namespace and key so later runs can skip the API entirely. Entries never
//! expire; staleness is the caller's problem and `clear` is the only way out.

use std::{
    collections::BTreeMap,
    fmt, fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::CacheError;

/// Entity kind a cache entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Videos,
    Channels,
    Related,
    Search,
}

impl Namespace {
    pub const ALL: [Namespace; 4] = [
        Namespace::Videos,
        Namespace::Channels,
        Namespace::Related,
        Namespace::Search,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Videos => "videos",
            Namespace::Channels => "channels",
            Namespace::Related => "related",
            Namespace::Search => "search",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Injectable key-value store consulted by the data provider.
pub trait CacheStore {
    fn get(&self, namespace: Namespace, key: &str) -> Option<&Value>;

    fn put(&mut self, namespace: Namespace, key: &str, payload: Value);

    /// Drops every entry of `namespace`, or the whole cache when `None`.
    /// Returns the number of removed entries.
    fn clear(&mut self, namespace: Option<Namespace>) -> usize;

    fn len(&self, namespace: Namespace) -> usize;

    /// Persists pending mutations. A no-op for stores without backing storage.
    fn flush(&mut self) -> Result<(), CacheError>;

    fn is_empty(&self) -> bool {
        Namespace::ALL.iter().all(|ns| self.len(*ns) == 0)
    }
}

/// On-disk layout: one JSON object per namespace, keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheData {
    #[serde(default)]
    videos: BTreeMap<String, Value>,
    #[serde(default)]
    channels: BTreeMap<String, Value>,
    #[serde(default)]
    related: BTreeMap<String, Value>,
    #[serde(default)]
    search: BTreeMap<String, Value>,
}

impl CacheData {
    fn section(&self, namespace: Namespace) -> &BTreeMap<String, Value> {
        match namespace {
            Namespace::Videos => &self.videos,
            Namespace::Channels => &self.channels,
            Namespace::Related => &self.related,
            Namespace::Search => &self.search,
        }
    }

    fn section_mut(&mut self, namespace: Namespace) -> &mut BTreeMap<String, Value> {
        match namespace {
            Namespace::Videos => &mut self.videos,
            Namespace::Channels => &mut self.channels,
            Namespace::Related => &mut self.related,
            Namespace::Search => &mut self.search,
        }
    }

    fn clear(&mut self, namespace: Option<Namespace>) -> usize {
        match namespace {
            Some(ns) => {
                let section = self.section_mut(ns);
                let removed = section.len();
                section.clear();
                removed
            }
            None => Namespace::ALL.iter().map(|ns| self.clear(Some(*ns))).sum(),
        }
    }
}

/// Cache that lives only as long as the process. Used for tests and for runs
/// that must not touch the cache file.
#[derive(Debug, Default)]
pub struct MemoryCache {
    data: CacheData,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, namespace: Namespace, key: &str) -> Option<&Value> {
        self.data.section(namespace).get(key)
    }

    fn put(&mut self, namespace: Namespace, key: &str, payload: Value) {
        self.data
            .section_mut(namespace)
            .insert(key.to_owned(), payload);
    }

    fn clear(&mut self, namespace: Option<Namespace>) -> usize {
        self.data.clear(namespace)
    }

    fn len(&self, namespace: Namespace) -> usize {
        self.data.section(namespace).len()
    }

    fn flush(&mut self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// JSON file cache. The whole document is loaded once by [`JsonFileCache::open`]
/// and written back by [`CacheStore::flush`] when something changed.
#[derive(Debug)]
pub struct JsonFileCache {
    path: PathBuf,
    data: CacheData,
    dirty: bool,
}

impl JsonFileCache {
    /// Loads the cache file, starting empty when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => CacheData::default(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| CacheError::Decode {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => CacheData::default(),
            Err(source) => return Err(CacheError::Read { path, source }),
        };
        debug!("opened cache {}", path.display());
        Ok(Self {
            path,
            data,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Writes into a temp file next to the target and renames it over the old
    /// file, so a crash mid-write never leaves a truncated cache behind.
    fn write_atomically(&self) -> io::Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&mut tmp, &self.data).map_err(io::Error::other)?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }
}

impl CacheStore for JsonFileCache {
    fn get(&self, namespace: Namespace, key: &str) -> Option<&Value> {
        self.data.section(namespace).get(key)
    }

    fn put(&mut self, namespace: Namespace, key: &str, payload: Value) {
        self.data
            .section_mut(namespace)
            .insert(key.to_owned(), payload);
        self.dirty = true;
    }

    fn clear(&mut self, namespace: Option<Namespace>) -> usize {
        let removed = self.data.clear(namespace);
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    fn len(&self, namespace: Namespace) -> usize {
        self.data.section(namespace).len()
    }

    fn flush(&mut self) -> Result<(), CacheError> {
        if !self.dirty {
            return Ok(());
        }
        self.write_atomically().map_err(|source| CacheError::Write {
            path: self.path.clone(),
            source,
        })?;
        self.dirty = false;
        debug!("flushed cache {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn open_missing_file_starts_empty() -> Result<()> {
        let dir = tempdir()?;
        let cache = JsonFileCache::open(dir.path().join("cache.json"))?;
        assert!(cache.is_empty());
        assert!(!cache.is_dirty());
        Ok(())
    }

    #[test]
    fn flush_roundtrips_namespaced_entries() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("cache.json");

        let mut cache = JsonFileCache::open(&path)?;
        cache.put(Namespace::Videos, "abc", json!({"title": "A"}));
        cache.put(Namespace::Channels, "abc", json!({"subscriber_count": 5}));
        cache.flush()?;
        assert!(!cache.is_dirty());

        let reopened = JsonFileCache::open(&path)?;
        assert_eq!(
            reopened.get(Namespace::Videos, "abc"),
            Some(&json!({"title": "A"}))
        );
        assert_eq!(
            reopened.get(Namespace::Channels, "abc"),
            Some(&json!({"subscriber_count": 5}))
        );
        assert!(reopened.get(Namespace::Related, "abc").is_none());
        Ok(())
    }

    #[test]
    fn file_layout_uses_namespace_sections() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cache.json");
        let mut cache = JsonFileCache::open(&path)?;
        cache.put(Namespace::Search, "search_rust_any_25", json!(["a", "b"]));
        cache.flush()?;

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(raw["search"]["search_rust_any_25"], json!(["a", "b"]));
        assert_eq!(raw["videos"], json!({}));
        Ok(())
    }

    #[test]
    fn reads_partial_documents() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cache.json");
        fs::write(&path, r#"{"videos": {"x": {"views": 1}}}"#)?;
        let cache = JsonFileCache::open(&path)?;
        assert_eq!(cache.len(Namespace::Videos), 1);
        assert_eq!(cache.len(Namespace::Channels), 0);
        Ok(())
    }

    #[test]
    fn corrupt_file_is_reported() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cache.json");
        fs::write(&path, "{not json")?;
        let err = JsonFileCache::open(&path).unwrap_err();
        assert!(matches!(err, CacheError::Decode { .. }));
        Ok(())
    }

    #[test]
    fn flush_without_changes_does_not_create_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cache.json");
        let mut cache = JsonFileCache::open(&path)?;
        cache.flush()?;
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn clear_single_namespace_and_everything() {
        let mut cache = MemoryCache::new();
        cache.put(Namespace::Videos, "a", json!(1));
        cache.put(Namespace::Videos, "b", json!(2));
        cache.put(Namespace::Related, "related_a_5", json!([]));

        assert_eq!(cache.clear(Some(Namespace::Videos)), 2);
        assert_eq!(cache.len(Namespace::Videos), 0);
        assert_eq!(cache.len(Namespace::Related), 1);

        assert_eq!(cache.clear(None), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_marks_file_cache_dirty_only_when_removing() -> Result<()> {
        let dir = tempdir()?;
        let mut cache = JsonFileCache::open(dir.path().join("cache.json"))?;
        assert_eq!(cache.clear(None), 0);
        assert!(!cache.is_dirty());
        cache.put(Namespace::Channels, "c", json!({}));
        cache.flush()?;
        assert_eq!(cache.clear(Some(Namespace::Channels)), 1);
        assert!(cache.is_dirty());
        Ok(())
    }
}
