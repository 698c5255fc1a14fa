//! SM-041: File-backed JSON cache with atomic saves.
//!
//! I/O and decode failures are logged and degrade to a miss (get) or a
//! no-op (set); the cache contract has no error channel.

use super::Cache;
use crate::core::types::CacheKey;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One JSON file per key under `dir`, named `<digest>.<kind>.json`.
#[derive(Debug)]
pub struct FileCache<V> {
    dir: PathBuf,
    kind: String,
    _value: PhantomData<fn() -> V>,
}

impl<V> FileCache<V> {
    pub fn new(dir: impl Into<PathBuf>, kind: &str) -> Self {
        Self {
            dir: dir.into(),
            kind: kind.to_string(),
            _value: PhantomData,
        }
    }

    /// Derive the entry path for a key.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{}.json", key.as_str(), self.kind))
    }
}

impl<V: Serialize + DeserializeOwned> FileCache<V> {
    /// Load an entry. `Ok(None)` if the file doesn't exist.
    pub fn load(&self, key: &CacheKey) -> Result<Option<V>, String> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        let value = serde_json::from_str(&content)
            .map_err(|e| format!("invalid cache entry {}: {}", path.display(), e))?;
        Ok(Some(value))
    }

    /// Save an entry atomically (write to temp, then rename).
    pub fn save(&self, key: &CacheKey, value: &V) -> Result<(), String> {
        let path = self.entry_path(key);
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| format!("cannot create dir {}: {}", self.dir.display(), e))?;
        let json = serde_json::to_string(value).map_err(|e| format!("serialize error: {}", e))?;
        let tmp_path = tmp_path_for(&path);
        std::fs::write(&tmp_path, &json)
            .map_err(|e| format!("cannot write {}: {}", tmp_path.display(), e))?;
        std::fs::rename(&tmp_path, &path).map_err(|e| {
            format!(
                "cannot rename {} → {}: {}",
                tmp_path.display(),
                path.display(),
                e
            )
        })?;
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

impl<V> Cache<V> for FileCache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync,
{
    fn get(&self, key: &CacheKey) -> Option<V> {
        match self.load(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "cache entry unreadable, treating as miss");
                None
            }
        }
    }

    fn set(&self, key: &CacheKey, value: V) {
        if let Err(e) = self.save(key, &value) {
            warn!(key = %key, error = %e, "cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CanonicalSolver, SolverArg, Solvers};
    use serde_json::json;

    fn key(digest: &str) -> CacheKey {
        CacheKey {
            digest: digest.to_string(),
            source_path: PathBuf::from("/unused"),
        }
    }

    fn solvers() -> Solvers {
        Solvers {
            sig: CanonicalSolver {
                source_function: "F".to_string(),
                callee: json!({ "type": "Identifier", "name": "Xy" }),
                args: vec![SolverArg::Param],
            },
        }
    }

    #[test]
    fn test_sm041_entry_path() {
        let cache: FileCache<Solvers> = FileCache::new("/cache", "solvers");
        assert_eq!(
            cache.entry_path(&key("abc")),
            PathBuf::from("/cache/abc.solvers.json")
        );
    }

    #[test]
    fn test_sm041_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("nested"), "solvers");
        cache.set(&key("k1"), solvers());
        assert_eq!(cache.get(&key("k1")), Some(solvers()));
        assert_eq!(cache.get(&key("k2")), None);
    }

    #[test]
    fn test_sm041_atomic_write_cleans_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), "solvers");
        cache.save(&key("k"), &solvers()).unwrap();
        assert!(!dir.path().join("k.solvers.json.tmp").exists());
        assert!(dir.path().join("k.solvers.json").exists());
    }

    #[test]
    fn test_sm041_corrupt_entry_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache: FileCache<Solvers> = FileCache::new(dir.path(), "solvers");
        std::fs::write(cache.entry_path(&key("bad")), "{ not json").unwrap();
        assert!(cache.load(&key("bad")).is_err());
        assert_eq!(cache.get(&key("bad")), None);
    }

    #[test]
    fn test_sm041_string_values() {
        let dir = tempfile::tempdir().unwrap();
        let cache: FileCache<String> = FileCache::new(dir.path(), "pre");
        cache.set(&key("p"), "{\"type\":\"Program\"}".to_string());
        assert_eq!(cache.get(&key("p")).as_deref(), Some("{\"type\":\"Program\"}"));
    }
}
