//! SM-013: Configuration loading and validation.
//!
//! Reads sigsmith.yaml, overlays environment variables and validates:
//! - concurrency must be at least 1
//! - task timeout must be non-zero
//! - payload limit must be non-zero

use super::types::SolverConfig;
use std::path::Path;

/// Environment override for the slot count.
pub const ENV_MAX_THREADS: &str = "MAX_THREADS";

/// Environment override for the per-task timeout (milliseconds).
pub const ENV_TASK_TIMEOUT: &str = "WORKER_TASK_TIMEOUT";

/// Validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

/// Parse a sigsmith.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<SolverConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_config(&content)
}

/// Parse a sigsmith.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<SolverConfig, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Apply environment overrides through `lookup` (injectable for tests).
/// Unparsable values are ignored, keeping the configured value.
pub fn apply_env<F>(config: &mut SolverConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(n) = lookup(ENV_MAX_THREADS).and_then(|v| v.trim().parse::<usize>().ok()) {
        if n > 0 {
            config.concurrency = n;
        }
    }
    if let Some(ms) = lookup(ENV_TASK_TIMEOUT).and_then(|v| v.trim().parse::<u64>().ok()) {
        config.task_timeout_ms = ms;
    }
}

/// Load configuration: the file if given, else defaults, then the process environment.
pub fn load(path: Option<&Path>) -> Result<SolverConfig, String> {
    let mut config = match path {
        Some(p) => parse_config_file(p)?,
        None => SolverConfig::default(),
    };
    apply_env(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &SolverConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.concurrency == 0 {
        errors.push(ValidationError {
            message: "concurrency must be at least 1".to_string(),
        });
    }

    if config.task_timeout_ms == 0 {
        errors.push(ValidationError {
            message: "task_timeout_ms must be greater than 0".to_string(),
        });
    }

    if config.max_payload_bytes == 0 {
        errors.push(ValidationError {
            message: "max_payload_bytes must be greater than 0".to_string(),
        });
    }

    if config.cache_dir.as_os_str().is_empty() {
        errors.push(ValidationError {
            message: "cache_dir must not be empty".to_string(),
        });
    }

    errors
}
