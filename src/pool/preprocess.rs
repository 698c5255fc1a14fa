//! SM-032: Preprocessing transform run inside pool slots.
//!
//! The default transform takes a script's ESTree JSON, applies the size
//! guard, hoists the body of a top-level IIFE wrapper, and keeps only
//! function-shaped top-level statements.

use crate::extract::templates;
use crate::matcher::matches;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Statements between cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 256;

/// Cooperative cancellation flag shared between the pool and one dispatch.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Why a preprocessing run failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreprocessError {
    #[error("empty player script")]
    Empty,

    #[error("player script too large: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },

    #[error("invalid syntax tree: {0}")]
    InvalidTree(String),

    #[error("syntax tree root is not a Program")]
    NotAProgram,

    #[error("preprocessing cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// A CPU-bound source transform executed in a pool slot.
pub trait Preprocessor: Send + Sync + 'static {
    fn preprocess(&self, source: &str, cancel: &CancelFlag) -> Result<String, PreprocessError>;
}

impl<F> Preprocessor for F
where
    F: Fn(&str, &CancelFlag) -> Result<String, PreprocessError> + Send + Sync + 'static,
{
    fn preprocess(&self, source: &str, cancel: &CancelFlag) -> Result<String, PreprocessError> {
        self(source, cancel)
    }
}

/// Reject empty and oversized payloads before doing any work.
pub fn check_size(source: &str, limit: usize) -> Result<(), PreprocessError> {
    if source.is_empty() {
        return Err(PreprocessError::Empty);
    }
    if source.len() > limit {
        return Err(PreprocessError::TooLarge {
            size: source.len(),
            limit,
        });
    }
    Ok(())
}

/// Default transform over ESTree JSON input.
#[derive(Debug, Clone)]
pub struct EstreePreprocessor {
    pub max_payload_bytes: usize,
}

impl EstreePreprocessor {
    pub fn new(max_payload_bytes: usize) -> Self {
        Self { max_payload_bytes }
    }
}

impl Preprocessor for EstreePreprocessor {
    fn preprocess(&self, source: &str, cancel: &CancelFlag) -> Result<String, PreprocessError> {
        check_size(source, self.max_payload_bytes)?;

        let tree: Value =
            serde_json::from_str(source).map_err(|e| PreprocessError::InvalidTree(e.to_string()))?;
        if tree["type"] != "Program" {
            return Err(PreprocessError::NotAProgram);
        }
        let body = tree["body"].as_array().ok_or(PreprocessError::NotAProgram)?;

        let mut kept = Vec::new();
        for (i, statement) in hoist_wrappers(body).into_iter().enumerate() {
            if i % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(PreprocessError::Cancelled);
            }
            if matches(statement, &templates::FUNCTION_SHAPED) {
                kept.push(statement.clone());
            }
        }

        let pruned = json!({
            "type": "Program",
            "sourceType": tree.get("sourceType").cloned().unwrap_or(Value::Null),
            "body": kept,
        });
        serde_json::to_string(&pruned)
            .map_err(|e| PreprocessError::Other(format!("serialize error: {}", e)))
    }
}

/// Replace each top-level IIFE statement by its function body's statements.
fn hoist_wrappers(body: &[Value]) -> Vec<&Value> {
    let mut out = Vec::with_capacity(body.len());
    for statement in body {
        if !matches(statement, &templates::IIFE_WRAPPER) {
            out.push(statement);
            continue;
        }
        let callee = &statement["expression"]["callee"];
        let function = match callee["type"].as_str() {
            Some("MemberExpression") => &callee["object"],
            _ => callee,
        };
        match function["body"]["body"].as_array() {
            Some(inner) => out.extend(inner.iter()),
            None => out.push(statement),
        }
    }
    out
}
