//! SM-020: Decipher function extraction and canonicalization.
//!
//! Finds a named three-parameter function whose second-to-last body
//! statement holds the decipher call, in one of two shapes:
//! - logical guard: `a.X && (b = T(3, decodeURIComponent(b)), ...)`
//! - conditional declaration: `if (..) { ...; var c = T(3, decodeURIComponent(b)); ... }`
//!
//! The call is rewritten into `sig => T(sig)` or `sig => T(first, sig)`.

pub mod render;
pub mod templates;

use crate::core::types::{CanonicalSolver, SolverArg};
use crate::matcher::{matches, which};
use serde_json::Value;
use tracing::{debug, trace};

/// Which body shape yielded the decipher call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    LogicalGuard,
    ConditionalDeclaration,
}

impl Shape {
    fn as_str(self) -> &'static str {
        match self {
            Shape::LogicalGuard => "logical_guard",
            Shape::ConditionalDeclaration => "conditional_declaration",
        }
    }
}

/// Extract a canonical solver from one top-level declaration.
/// Returns `None` when no candidate function carries a recognized shape.
pub fn extract(declaration: &Value) -> Option<CanonicalSolver> {
    match which(declaration, &templates::CANDIDATE)? {
        0 => {
            let assignment = &declaration["expression"];
            let name = assignment["left"]["name"].as_str()?;
            from_function(name, &assignment["right"])
        }
        1 => {
            let name = declaration["id"]["name"].as_str()?;
            from_function(name, declaration)
        }
        // Unrelated bindings may share the statement; try every one.
        _ => declaration["declarations"]
            .as_array()?
            .iter()
            .find_map(|declarator| {
                let name = declarator["id"]["name"].as_str()?;
                let init = &declarator["init"];
                if init["type"] != "FunctionExpression" {
                    return None;
                }
                from_function(name, init)
            }),
    }
}

/// Run `extract` over every top-level statement of a `Program` tree.
pub fn extract_from_program(program: &Value) -> Option<CanonicalSolver> {
    let body = program["body"].as_array()?;
    body.iter().find_map(extract)
}

fn from_function(name: &str, function: &Value) -> Option<CanonicalSolver> {
    if function["params"].as_array().map(Vec::len) != Some(3) {
        return None;
    }
    let body = function["body"]["body"].as_array()?;
    let statement = body.len().checked_sub(2).and_then(|i| body.get(i))?;

    let (shape, call) = logical_guard_call(statement)
        .map(|call| (Shape::LogicalGuard, call))
        .or_else(|| {
            conditional_declaration_call(statement).map(|call| (Shape::ConditionalDeclaration, call))
        })?;

    let solver = canonicalize(name, call)?;
    debug!(
        function = name,
        shape = shape.as_str(),
        arity = solver.arity(),
        "decipher transform located"
    );
    Some(solver)
}

fn logical_guard_call(statement: &Value) -> Option<&Value> {
    if !matches(statement, &templates::LOGICAL_GUARD) {
        return None;
    }
    Some(&statement["expression"]["right"]["expressions"][0]["right"])
}

fn conditional_declaration_call(statement: &Value) -> Option<&Value> {
    if !matches(statement, &templates::IF_BLOCK) {
        return None;
    }
    let block = statement["consequent"]["body"].as_array()?;
    let declaration = block
        .iter()
        .find(|s| matches(s, &templates::DECIPHER_DECLARATION))?;
    trace!("decipher declaration found in conditional block");
    Some(&declaration["declarations"][0]["init"])
}

/// Build the one-parameter solver for a decipher call.
/// Beyond the first, original arguments are table selectors and are dropped.
pub fn canonicalize(source_function: &str, call: &Value) -> Option<CanonicalSolver> {
    let arguments = call["arguments"].as_array()?;
    let args = match arguments.as_slice() {
        [] => return None,
        [_] => vec![SolverArg::Param],
        [first, ..] => vec![SolverArg::Preserved(first.clone()), SolverArg::Param],
    };
    Some(CanonicalSolver {
        source_function: source_function.to_string(),
        callee: call["callee"].clone(),
        args,
    })
}
