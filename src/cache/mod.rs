//! SM-040: Cache contracts, key resolution and raw-source loading.

pub mod file;
pub mod key;
pub mod loader;

pub use file::FileCache;
pub use key::{HashedPathResolver, KeyResolver};
pub use loader::{FsLoader, SourceLoader};

use crate::core::types::CacheKey;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Key-value store contract. Eviction is the store's business.
pub trait Cache<V>: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<V>;
    fn set(&self, key: &CacheKey, value: V);
}

/// Unbounded in-process cache keyed by digest.
#[derive(Debug)]
pub struct MemoryCache<V> {
    entries: RwLock<FxHashMap<String, V>>,
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
        }
    }
}

impl<V> MemoryCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<V: Clone + Send + Sync> Cache<V> for MemoryCache<V> {
    fn get(&self, key: &CacheKey) -> Option<V> {
        self.entries.read().get(key.as_str()).cloned()
    }

    fn set(&self, key: &CacheKey, value: V) {
        self.entries.write().insert(key.as_str().to_string(), value);
    }
}
