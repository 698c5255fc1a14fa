//! SM-021: Built-in ESTree templates for locating the decipher transform.
//!
//! Every template is authored as JSON and compiled once on first use.
//! `validate_builtin` compiles all of them eagerly so a malformed template
//! fails at startup rather than on the first request.

use crate::matcher::{Pattern, PatternError};
use once_cell::sync::Lazy;
use serde_json::{json, Value};

/// Text-decoding primitive the decipher transform wraps its input in.
pub const TEXT_DECODER: &str = "decodeURIComponent";

/// `decodeURIComponent(x)`
fn decode_call() -> Value {
    json!({
        "type": "CallExpression",
        "callee": { "type": "Identifier", "name": TEXT_DECODER },
        "arguments": [{ "type": "Identifier" }]
    })
}

/// `T(literal, decodeURIComponent(x))` or `T(decodeURIComponent(x))`,
/// where `T` is an identifier or a member expression.
fn decipher_call() -> Value {
    json!({
        "type": "CallExpression",
        "callee": { "or": [{ "type": "Identifier" }, { "type": "MemberExpression" }] },
        "arguments": { "or": [
            [{ "type": "Literal" }, decode_call()],
            [decode_call()]
        ] }
    })
}

/// A named function with (at least) three parameters, in one of the three
/// declaration shapes. Alternative order is relied on by the extractor.
pub fn candidate_template() -> Value {
    let three = json!([{}, {}, {}]);
    json!({ "or": [
        {
            "type": "ExpressionStatement",
            "expression": {
                "type": "AssignmentExpression",
                "operator": "=",
                "left": { "type": "Identifier" },
                "right": { "type": "FunctionExpression", "params": three }
            }
        },
        {
            "type": "FunctionDeclaration",
            "id": { "type": "Identifier" },
            "params": three
        },
        {
            "type": "VariableDeclaration",
            "declarations": { "anykey": {
                "type": "VariableDeclarator",
                "id": { "type": "Identifier" },
                "init": { "type": "FunctionExpression", "params": three }
            } }
        }
    ] })
}

/// `guard && (x = T(..), ...)`
pub fn logical_guard_template() -> Value {
    json!({
        "type": "ExpressionStatement",
        "expression": {
            "type": "LogicalExpression",
            "operator": "&&",
            "right": {
                "type": "SequenceExpression",
                "expressions": [{
                    "type": "AssignmentExpression",
                    "operator": "=",
                    "left": { "type": "Identifier" },
                    "right": decipher_call()
                }]
            }
        }
    })
}

/// `if (..) { ... }`
pub fn if_block_template() -> Value {
    json!({
        "type": "IfStatement",
        "consequent": { "type": "BlockStatement", "body": {} }
    })
}

/// `var x = T(..)` inside the taken branch.
pub fn decipher_declaration_template() -> Value {
    json!({
        "type": "VariableDeclaration",
        "declarations": [{
            "type": "VariableDeclarator",
            "init": decipher_call()
        }]
    })
}

/// Any top-level statement that defines a function, regardless of arity.
pub fn function_shaped_template() -> Value {
    json!({ "or": [
        { "type": "FunctionDeclaration" },
        {
            "type": "ExpressionStatement",
            "expression": {
                "type": "AssignmentExpression",
                "right": { "type": "FunctionExpression" }
            }
        },
        {
            "type": "VariableDeclaration",
            "declarations": { "anykey": {
                "type": "VariableDeclarator",
                "init": { "type": "FunctionExpression" }
            } }
        }
    ] })
}

/// `(function(..){ ... })(..)` or `(function(..){ ... }).call(..)`
pub fn iife_wrapper_template() -> Value {
    let function = json!({
        "type": "FunctionExpression",
        "body": { "type": "BlockStatement", "body": {} }
    });
    json!({
        "type": "ExpressionStatement",
        "expression": {
            "type": "CallExpression",
            "callee": { "or": [
                function,
                {
                    "type": "MemberExpression",
                    "object": function,
                    "property": { "type": "Identifier", "name": "call" }
                }
            ] }
        }
    })
}

fn builtin() -> [(&'static str, Value); 6] {
    [
        ("candidate", candidate_template()),
        ("logical_guard", logical_guard_template()),
        ("if_block", if_block_template()),
        ("decipher_declaration", decipher_declaration_template()),
        ("function_shaped", function_shaped_template()),
        ("iife_wrapper", iife_wrapper_template()),
    ]
}

/// Compile every built-in template, reporting the first defect.
pub fn validate_builtin() -> Result<usize, (String, PatternError)> {
    let mut total = 0;
    for (name, template) in builtin() {
        let pattern = Pattern::compile(&template).map_err(|e| (name.to_string(), e))?;
        total += pattern.size();
    }
    Ok(total)
}

fn compiled(template: Value) -> Pattern {
    Pattern::compile(&template).expect("built-in template is well-formed")
}

pub static CANDIDATE: Lazy<Pattern> = Lazy::new(|| compiled(candidate_template()));
pub static LOGICAL_GUARD: Lazy<Pattern> = Lazy::new(|| compiled(logical_guard_template()));
pub static IF_BLOCK: Lazy<Pattern> = Lazy::new(|| compiled(if_block_template()));
pub static DECIPHER_DECLARATION: Lazy<Pattern> =
    Lazy::new(|| compiled(decipher_declaration_template()));
pub static FUNCTION_SHAPED: Lazy<Pattern> = Lazy::new(|| compiled(function_shaped_template()));
pub static IIFE_WRAPPER: Lazy<Pattern> = Lazy::new(|| compiled(iife_wrapper_template()));
