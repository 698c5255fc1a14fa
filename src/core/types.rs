//! SM-010: Shared types (configuration, cache keys, canonical solvers).
//!
//! All persisted types derive Serialize/Deserialize so solver sets can be
//! stored by the file cache and configuration can be read from YAML.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Configuration (sigsmith.yaml)
// ============================================================================

/// Runtime configuration for the solver service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Number of parallel preprocessing slots
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-task preprocessing timeout in milliseconds
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,

    /// Largest raw script accepted by the preprocessor, in bytes
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    /// Directory holding raw scripts and persisted solver sets
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

fn default_concurrency() -> usize {
    1
}

fn default_task_timeout_ms() -> u64 {
    60_000
}

fn default_max_payload_bytes() -> usize {
    10_000_000
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            task_timeout_ms: default_task_timeout_ms(),
            max_payload_bytes: default_max_payload_bytes(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl SolverConfig {
    pub fn task_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.task_timeout_ms)
    }
}

// ============================================================================
// Cache keys
// ============================================================================

/// Stable key for a remote script: BLAKE3 digest of its identity plus the
/// path its raw source is stored at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub digest: String,
    pub source_path: PathBuf,
}

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.digest)
    }
}

// ============================================================================
// Canonical solvers
// ============================================================================

/// Name of the single parameter of every synthesized solver.
pub const SOLVER_PARAM: &str = "sig";

/// One argument of the synthesized call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "node", rename_all = "snake_case")]
pub enum SolverArg {
    /// The solver's own parameter (the ciphertext).
    Param,
    /// An argument copied unchanged from the original call.
    Preserved(Value),
}

/// A synthesized one-parameter function delegating to the decipher transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSolver {
    /// Name of the three-parameter function the transform was found in
    pub source_function: String,

    /// Callee expression of the transform (Identifier or MemberExpression)
    pub callee: Value,

    /// Argument list of the synthesized call
    pub args: Vec<SolverArg>,
}

impl CanonicalSolver {
    /// Dotted path of the callee, e.g. `Xy` or `c.Y`.
    pub fn callee_path(&self) -> Option<String> {
        crate::extract::render::render_expr(&self.callee)
    }

    /// Number of arguments the synthesized call passes.
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// ESTree `ArrowFunctionExpression` for `sig => callee(...)`.
    pub fn to_estree(&self) -> Value {
        let arguments: Vec<Value> = self
            .args
            .iter()
            .map(|arg| match arg {
                SolverArg::Param => json!({ "type": "Identifier", "name": SOLVER_PARAM }),
                SolverArg::Preserved(node) => node.clone(),
            })
            .collect();
        json!({
            "type": "ArrowFunctionExpression",
            "params": [{ "type": "Identifier", "name": SOLVER_PARAM }],
            "body": {
                "type": "CallExpression",
                "callee": self.callee,
                "arguments": arguments,
                "optional": false
            },
            "async": false,
            "expression": true,
            "generator": false
        })
    }

    /// JavaScript source for the solver. `None` when an argument or the
    /// callee is outside the small expression subset the renderer knows.
    pub fn to_js(&self) -> Option<String> {
        let callee = self.callee_path()?;
        let args = self
            .args
            .iter()
            .map(|arg| match arg {
                SolverArg::Param => Some(SOLVER_PARAM.to_string()),
                SolverArg::Preserved(node) => crate::extract::render::render_expr(node),
            })
            .collect::<Option<Vec<_>>>()?;
        Some(format!("{} => {}({})", SOLVER_PARAM, callee, args.join(", ")))
    }
}

/// Solver set produced for one script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solvers {
    /// Signature decipher solver
    pub sig: CanonicalSolver,
}
