//! SM-042: Resource identity → cache key, via BLAKE3.

use crate::core::error::ResolutionError;
use crate::core::types::CacheKey;
use std::path::PathBuf;

/// Maps a resource identity (e.g. a player script URL) to a stable key.
pub trait KeyResolver: Send + Sync {
    fn resolve(&self, identity: &str) -> Result<CacheKey, ResolutionError>;
}

/// Hash a string. Returns the bare hex digest.
pub fn hash_identity(identity: &str) -> String {
    blake3::hash(identity.trim().as_bytes()).to_hex().to_string()
}

/// Keys raw scripts as `<dir>/<blake3(identity)>.js`.
#[derive(Debug, Clone)]
pub struct HashedPathResolver {
    dir: PathBuf,
}

impl HashedPathResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl KeyResolver for HashedPathResolver {
    fn resolve(&self, identity: &str) -> Result<CacheKey, ResolutionError> {
        if identity.trim().is_empty() {
            return Err(ResolutionError {
                identity: identity.to_string(),
                reason: "empty identity".to_string(),
            });
        }
        let digest = hash_identity(identity);
        let source_path = self.dir.join(format!("{}.js", digest));
        Ok(CacheKey {
            digest,
            source_path,
        })
    }
}
