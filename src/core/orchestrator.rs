//! SM-012: Orchestrator (cache lookups, preprocessing and extraction per request).
//!
//! identity → key → solver cache → preprocessed cache → (raw cache | loader)
//! → pool → extractor → solver cache. Extraction misses are never cached.

use super::error::{SolveError, TreeError};
use super::types::{CacheKey, Solvers};
use crate::cache::{Cache, KeyResolver, MemoryCache, SourceLoader};
use crate::extract;
use crate::pool::WorkerPool;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Composes caches, the worker pool and the extractor.
pub struct Orchestrator {
    resolver: Arc<dyn KeyResolver>,
    loader: Arc<dyn SourceLoader>,
    pool: WorkerPool,
    raw_cache: Arc<dyn Cache<String>>,
    preprocessed_cache: Arc<dyn Cache<String>>,
    solver_cache: Arc<dyn Cache<Solvers>>,
}

impl Orchestrator {
    /// Build with in-memory caches for all three layers.
    pub fn new(
        resolver: Arc<dyn KeyResolver>,
        loader: Arc<dyn SourceLoader>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            resolver,
            loader,
            pool,
            raw_cache: Arc::new(MemoryCache::new()),
            preprocessed_cache: Arc::new(MemoryCache::new()),
            solver_cache: Arc::new(MemoryCache::new()),
        }
    }

    pub fn with_raw_cache(mut self, cache: Arc<dyn Cache<String>>) -> Self {
        self.raw_cache = cache;
        self
    }

    pub fn with_preprocessed_cache(mut self, cache: Arc<dyn Cache<String>>) -> Self {
        self.preprocessed_cache = cache;
        self
    }

    pub fn with_solver_cache(mut self, cache: Arc<dyn Cache<Solvers>>) -> Self {
        self.solver_cache = cache;
        self
    }

    /// Return the solver set for a script, or `None` if no recognized
    /// decipher shape exists in it. Errors propagate unmodified.
    pub async fn get_solvers(&self, player_url: &str) -> Result<Option<Solvers>, SolveError> {
        let key = self.resolver.resolve(player_url)?;

        if let Some(solvers) = self.solver_cache.get(&key) {
            debug!(player_url, "solvers found in cache");
            return Ok(Some(solvers));
        }

        let preprocessed = match self.preprocessed_cache.get(&key) {
            Some(text) => text,
            None => {
                debug!(player_url, "preprocessing player script");
                let text = self.preprocess(player_url, &key).await.inspect_err(|e| {
                    error!(player_url, error = %e, "failed to preprocess player script");
                })?;
                self.preprocessed_cache.set(&key, text.clone());
                text
            }
        };

        let solvers = solvers_from_tree(&preprocessed).inspect_err(|e| {
            error!(player_url, error = %e, "failed to generate solvers from preprocessed player");
        })?;

        match solvers {
            Some(solvers) => {
                self.solver_cache.set(&key, solvers.clone());
                debug!(
                    player_url,
                    function = %solvers.sig.source_function,
                    "solvers generated successfully"
                );
                Ok(Some(solvers))
            }
            None => {
                warn!(player_url, "no solvers generated from player script");
                Ok(None)
            }
        }
    }

    async fn preprocess(&self, player_url: &str, key: &CacheKey) -> Result<String, SolveError> {
        let raw = match self.raw_cache.get(key) {
            Some(raw) => raw,
            None => {
                let raw = self.loader.load(key)?;
                self.raw_cache.set(key, raw.clone());
                raw
            }
        };
        debug!(
            player_url,
            size = raw.len(),
            slots = self.pool.concurrency(),
            timeout_ms = u64::try_from(self.pool.timeout().as_millis()).unwrap_or(u64::MAX),
            "player script loaded"
        );
        let output = self.pool.execute(raw).await?;
        debug!(player_url, "player script preprocessed");
        Ok(output)
    }
}

/// Parse a preprocessed tree and extract from its top-level declarations.
pub fn solvers_from_tree(preprocessed: &str) -> Result<Option<Solvers>, TreeError> {
    let tree: Value = serde_json::from_str(preprocessed)?;
    if !tree["body"].is_array() {
        return Err(TreeError::NoBody);
    }
    Ok(extract::extract_from_program(&tree).map(|sig| Solvers { sig }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FsLoader, HashedPathResolver};
    use crate::core::error::LoadError;
    use crate::pool::preprocess::{CancelFlag, EstreePreprocessor, PreprocessError, Preprocessor};
    use crate::test_helpers::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Loader serving one fixed script and counting calls.
    struct FixedLoader {
        source: String,
        calls: AtomicUsize,
    }

    impl SourceLoader for FixedLoader {
        fn load(&self, _key: &CacheKey) -> Result<String, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.source.clone())
        }
    }

    /// Wraps the default preprocessor and counts runs.
    struct CountingPreprocessor {
        inner: EstreePreprocessor,
        runs: Arc<AtomicUsize>,
    }

    impl Preprocessor for CountingPreprocessor {
        fn preprocess(&self, source: &str, cancel: &CancelFlag) -> Result<String, PreprocessError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.inner.preprocess(source, cancel)
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        loader: Arc<FixedLoader>,
        runs: Arc<AtomicUsize>,
        solver_cache: Arc<MemoryCache<Solvers>>,
    }

    fn harness(program: Value) -> Harness {
        let loader = Arc::new(FixedLoader {
            source: program.to_string(),
            calls: AtomicUsize::new(0),
        });
        let runs = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::start(
            1,
            Duration::from_secs(5),
            Arc::new(CountingPreprocessor {
                inner: EstreePreprocessor::new(10_000_000),
                runs: Arc::clone(&runs),
            }),
        )
        .unwrap();
        let solver_cache = Arc::new(MemoryCache::new());
        let orchestrator = Orchestrator::new(
            Arc::new(HashedPathResolver::new("/players")),
            loader.clone(),
            pool,
        )
        .with_solver_cache(solver_cache.clone());
        Harness {
            orchestrator,
            loader,
            runs,
            solver_cache,
        }
    }

    #[tokio::test]
    async fn test_sm012_end_to_end_wrapped_player() {
        let h = harness(wrapped_program(vec![
            function_decl("noise", &["x"], vec![return_join()]),
            sample_decipher_function(),
        ]));
        let solvers = h
            .orchestrator
            .get_solvers("https://example.com/s/player/abc/base.js")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(solvers.sig.source_function, "F");
        assert_eq!(solvers.sig.callee, member("c", "Y"));
        assert_eq!(solvers.sig.to_js().as_deref(), Some("sig => c.Y(3, sig)"));
        assert_eq!(h.solver_cache.len(), 1);
    }

    #[tokio::test]
    async fn test_sm012_solver_cache_hit_skips_loader_and_pool() {
        let h = harness(wrapped_program(vec![sample_decipher_function()]));
        let url = "https://example.com/s/player/abc/base.js";
        let first = h.orchestrator.get_solvers(url).await.unwrap();
        let second = h.orchestrator.get_solvers(url).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(h.loader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sm012_miss_is_not_cached() {
        let h = harness(wrapped_program(vec![function_decl("noise", &["x"], vec![return_join()])]));
        let url = "https://example.com/s/player/def/base.js";
        assert_eq!(h.orchestrator.get_solvers(url).await.unwrap(), None);
        assert_eq!(h.orchestrator.get_solvers(url).await.unwrap(), None);
        assert!(h.solver_cache.is_empty());
        // Preprocessed output is reused; only extraction reruns.
        assert_eq!(h.runs.load(Ordering::SeqCst), 1);
        assert_eq!(h.loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sm012_load_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let echo = |s: &str, _: &CancelFlag| -> Result<String, PreprocessError> { Ok(s.to_string()) };
        let pool = WorkerPool::start(1, Duration::from_secs(5), Arc::new(echo)).unwrap();
        let orchestrator = Orchestrator::new(
            Arc::new(HashedPathResolver::new(dir.path())),
            Arc::new(FsLoader),
            pool,
        );
        let err = orchestrator.get_solvers("missing-player").await.unwrap_err();
        assert!(matches!(err, SolveError::Load(_)));
    }

    #[tokio::test]
    async fn test_sm012_resolution_error_propagates() {
        let h = harness(json!({ "type": "Program", "body": [] }));
        let err = h.orchestrator.get_solvers("   ").await.unwrap_err();
        assert!(matches!(err, SolveError::Resolution(_)));
        assert_eq!(h.loader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sm012_preprocess_timeout_propagates() {
        let slow = |_: &str, _: &CancelFlag| -> Result<String, PreprocessError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(String::new())
        };
        let pool = WorkerPool::start(1, Duration::from_millis(20), Arc::new(slow)).unwrap();
        let loader = Arc::new(FixedLoader {
            source: "{}".to_string(),
            calls: AtomicUsize::new(0),
        });
        let preprocessed = Arc::new(MemoryCache::<String>::new());
        let orchestrator =
            Orchestrator::new(Arc::new(HashedPathResolver::new("/p")), loader, pool)
                .with_preprocessed_cache(preprocessed.clone());
        let err = orchestrator.get_solvers("u").await.unwrap_err();
        assert!(err.is_timeout());
        assert!(preprocessed.is_empty());
    }

    #[tokio::test]
    async fn test_sm012_preprocess_failure_propagates() {
        let h = harness(json!({ "type": "BlockStatement" }));
        let err = h.orchestrator.get_solvers("u").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "preprocessing failed: worker task failed: syntax tree root is not a Program"
        );
    }

    #[test]
    fn test_sm012_solvers_from_tree() {
        let program = json!({ "type": "Program", "body": [sample_decipher_function()] });
        let solvers = solvers_from_tree(&program.to_string()).unwrap().unwrap();
        assert_eq!(solvers.sig.source_function, "F");
        assert!(matches!(solvers_from_tree("nope"), Err(TreeError::Json(_))));
        assert!(matches!(solvers_from_tree("{\"type\":\"Program\"}"), Err(TreeError::NoBody)));
    }
}
