//! SM-011: Error taxonomy for the solve path.
//!
//! Extraction misses are not errors; `get_solvers` returns `Ok(None)` for them.

use crate::pool::PoolError;
use std::path::PathBuf;

/// The resource identity could not be mapped to a cache key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot resolve '{identity}': {reason}")]
pub struct ResolutionError {
    pub identity: String,
    pub reason: String,
}

/// The raw script could not be read.
#[derive(Debug, thiserror::Error)]
#[error("cannot read {}: {source}", path.display())]
pub struct LoadError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// The preprocessed output is not a usable syntax tree.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("preprocessed tree is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("preprocessed tree has no top-level body")]
    NoBody,
}

/// Any failure of `Orchestrator::get_solvers`.
#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("preprocessing failed: {0}")]
    Preprocess(#[from] PoolError),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl SolveError {
    /// True when preprocessing hit the pool timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SolveError::Preprocess(e) if e.is_timeout())
    }

    /// True when the pool could not hand the payload to a slot.
    pub fn is_submission(&self) -> bool {
        matches!(self, SolveError::Preprocess(e) if e.is_submission())
    }
}
