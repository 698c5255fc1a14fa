//! SM-002: Pattern templates (JSON template compilation and validation).
//!
//! Templates are written as plain JSON mirroring the ESTree node they describe.
//! Three object shapes are reserved as markers:
//! - `{}` is the wildcard
//! - `{"or": [P1, .., Pn]}` is an ordered alternation
//! - `{"anykey": P}` matches a mapping (or array) if any of its values matches P
//!
//! A marker object must carry exactly one key. Everything else compiles to
//! field, element or scalar constraints.

use serde_json::Value;
use std::fmt;

/// Marker key for ordered alternation.
pub const OR_KEY: &str = "or";

/// Marker key for any-value matching over mappings.
pub const ANYKEY_KEY: &str = "anykey";

/// A compiled, immutable structural pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Matches any node, including `null`.
    Wildcard,
    /// Exact equality with a string, number, bool or null.
    Scalar(Value),
    /// Every listed field must be present on the node and match.
    Fields(Vec<(String, Pattern)>),
    /// Positional prefix match against an array node.
    Elements(Vec<Pattern>),
    /// First alternative that matches wins.
    Or(Vec<Pattern>),
    /// At least one value of the mapping must match; keys are ignored.
    AnyKey(Box<Pattern>),
}

/// A template that cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("{path}: `or` expects an array of alternatives")]
    OrNotArray { path: String },

    #[error("{path}: `or` has no alternatives")]
    EmptyAlternation { path: String },

    #[error("{path}: marker `{marker}` cannot be mixed with other fields")]
    MixedMarker { path: String, marker: String },
}

impl Pattern {
    /// Compile a JSON template into a pattern.
    pub fn compile(template: &Value) -> Result<Pattern, PatternError> {
        compile_at(template, "$")
    }

    /// Number of pattern nodes in this tree (used for diagnostics and benches).
    pub fn size(&self) -> usize {
        match self {
            Pattern::Wildcard | Pattern::Scalar(_) => 1,
            Pattern::Fields(fields) => 1 + fields.iter().map(|(_, p)| p.size()).sum::<usize>(),
            Pattern::Elements(items) | Pattern::Or(items) => {
                1 + items.iter().map(Pattern::size).sum::<usize>()
            }
            Pattern::AnyKey(inner) => 1 + inner.size(),
        }
    }
}

fn compile_at(template: &Value, path: &str) -> Result<Pattern, PatternError> {
    match template {
        Value::Object(map) if map.is_empty() => Ok(Pattern::Wildcard),
        Value::Object(map) => {
            for marker in [OR_KEY, ANYKEY_KEY] {
                if map.contains_key(marker) && map.len() > 1 {
                    return Err(PatternError::MixedMarker {
                        path: path.to_string(),
                        marker: marker.to_string(),
                    });
                }
            }
            if let Some(alternatives) = map.get(OR_KEY) {
                let Value::Array(items) = alternatives else {
                    return Err(PatternError::OrNotArray {
                        path: path.to_string(),
                    });
                };
                if items.is_empty() {
                    return Err(PatternError::EmptyAlternation {
                        path: path.to_string(),
                    });
                }
                let compiled = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| compile_at(item, &format!("{}.or[{}]", path, i)))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(Pattern::Or(compiled));
            }
            if let Some(inner) = map.get(ANYKEY_KEY) {
                let inner = compile_at(inner, &format!("{}.anykey", path))?;
                return Ok(Pattern::AnyKey(Box::new(inner)));
            }
            let fields = map
                .iter()
                .map(|(key, value)| {
                    compile_at(value, &format!("{}.{}", path, key)).map(|p| (key.clone(), p))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Pattern::Fields(fields))
        }
        Value::Array(items) => {
            let compiled = items
                .iter()
                .enumerate()
                .map(|(i, item)| compile_at(item, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Pattern::Elements(compiled))
        }
        scalar => Ok(Pattern::Scalar(scalar.clone())),
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Wildcard => write!(f, "_"),
            Pattern::Scalar(v) => write!(f, "{}", v),
            Pattern::Fields(fields) => {
                write!(f, "{{")?;
                for (i, (key, p)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, p)?;
                }
                write!(f, "}}")
            }
            Pattern::Elements(items) => {
                write!(f, "[")?;
                for (i, p) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ", ..]")
            }
            Pattern::Or(items) => {
                for (i, p) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", p)?;
                }
                Ok(())
            }
            Pattern::AnyKey(inner) => write!(f, "any({})", inner),
        }
    }
}
