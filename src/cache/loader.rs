//! SM-043: Raw-source loading.

use crate::core::error::LoadError;
use crate::core::types::CacheKey;

/// Reads the raw script stored for a key.
pub trait SourceLoader: Send + Sync {
    fn load(&self, key: &CacheKey) -> Result<String, LoadError>;
}

/// Loads `key.source_path` from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn load(&self, key: &CacheKey) -> Result<String, LoadError> {
        std::fs::read_to_string(&key.source_path).map_err(|source| LoadError {
            path: key.source_path.clone(),
            source,
        })
    }
}
