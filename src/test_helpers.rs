//! ESTree node builders shared by unit tests.

use serde_json::{json, Value};

pub fn ident(name: &str) -> Value {
    json!({ "type": "Identifier", "name": name })
}

pub fn lit(value: i64) -> Value {
    json!({ "type": "Literal", "value": value, "raw": value.to_string() })
}

pub fn member(object: &str, property: &str) -> Value {
    json!({
        "type": "MemberExpression",
        "object": ident(object),
        "property": ident(property),
        "computed": false
    })
}

pub fn call(callee: Value, arguments: Vec<Value>) -> Value {
    json!({ "type": "CallExpression", "callee": callee, "arguments": arguments, "optional": false })
}

/// `decodeURIComponent(arg)`
pub fn decode(arg: &str) -> Value {
    call(ident("decodeURIComponent"), vec![ident(arg)])
}

/// `a.X && (b = <decipher>, b = b.split(""))`
pub fn logical_guard(decipher: Value) -> Value {
    let empty = json!({ "type": "Literal", "value": "", "raw": "\"\"" });
    json!({
        "type": "ExpressionStatement",
        "expression": {
            "type": "LogicalExpression",
            "operator": "&&",
            "left": member("a", "X"),
            "right": {
                "type": "SequenceExpression",
                "expressions": [
                    { "type": "AssignmentExpression", "operator": "=", "left": ident("b"), "right": decipher },
                    {
                        "type": "AssignmentExpression",
                        "operator": "=",
                        "left": ident("b"),
                        "right": call(member("b", "split"), vec![empty])
                    }
                ]
            }
        }
    })
}

/// `return b.join("")`
pub fn return_join() -> Value {
    json!({
        "type": "ReturnStatement",
        "argument": call(member("b", "join"), vec![json!({ "type": "Literal", "value": "", "raw": "\"\"" })])
    })
}

pub fn block(statements: Vec<Value>) -> Value {
    json!({ "type": "BlockStatement", "body": statements })
}

pub fn function_decl(name: &str, params: &[&str], statements: Vec<Value>) -> Value {
    json!({
        "type": "FunctionDeclaration",
        "id": ident(name),
        "params": params.iter().map(|p| ident(p)).collect::<Vec<_>>(),
        "body": block(statements)
    })
}

pub fn function_expr(params: &[&str], statements: Vec<Value>) -> Value {
    json!({
        "type": "FunctionExpression",
        "id": null,
        "params": params.iter().map(|p| ident(p)).collect::<Vec<_>>(),
        "body": block(statements)
    })
}

/// `function F(a, b, c) { a.X && (b = c.Y(3, decodeURIComponent(b)), b = b.split("")); return b.join(""); }`
pub fn sample_decipher_function() -> Value {
    function_decl(
        "F",
        &["a", "b", "c"],
        vec![
            logical_guard(call(member("c", "Y"), vec![lit(3), decode("b")])),
            return_join(),
        ],
    )
}

/// A player-like program: statements wrapped in `(function(g){ ... }).call(this)`.
pub fn wrapped_program(statements: Vec<Value>) -> Value {
    json!({
        "type": "Program",
        "sourceType": "script",
        "body": [
            {
                "type": "VariableDeclaration",
                "kind": "var",
                "declarations": [{
                    "type": "VariableDeclarator",
                    "id": ident("_yt_player"),
                    "init": { "type": "ObjectExpression", "properties": [] }
                }]
            },
            {
                "type": "ExpressionStatement",
                "expression": call(
                    json!({
                        "type": "MemberExpression",
                        "object": function_expr(&["g"], statements),
                        "property": ident("call"),
                        "computed": false
                    }),
                    vec![json!({ "type": "ThisExpression" }), ident("_yt_player")]
                )
            }
        ]
    })
}
