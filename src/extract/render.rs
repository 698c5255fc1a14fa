//! SM-023: Render a small subset of ESTree expressions back to JavaScript.

use serde_json::Value;

/// Render identifiers, literals, member chains and unary operators. Anything
/// else yields `None`.
pub fn render_expr(node: &Value) -> Option<String> {
    match node.get("type")?.as_str()? {
        "Identifier" => node.get("name")?.as_str().map(str::to_string),
        "Literal" => {
            if let Some(raw) = node.get("raw").and_then(Value::as_str) {
                return Some(raw.to_string());
            }
            match node.get("value")? {
                v @ (Value::Number(_) | Value::String(_) | Value::Bool(_) | Value::Null) => {
                    Some(v.to_string())
                }
                _ => None,
            }
        }
        "MemberExpression" => {
            let object = render_expr(node.get("object")?)?;
            let property = render_expr(node.get("property")?)?;
            if node.get("computed").and_then(Value::as_bool).unwrap_or(false) {
                Some(format!("{}[{}]", object, property))
            } else {
                Some(format!("{}.{}", object, property))
            }
        }
        "UnaryExpression" => {
            let operator = node.get("operator")?.as_str()?;
            let argument = render_expr(node.get("argument")?)?;
            // Keyword operators (`typeof`, `void`, `delete`) need a separator.
            if operator.starts_with(|c: char| c.is_ascii_alphabetic()) {
                Some(format!("{} {}", operator, argument))
            } else {
                Some(format!("{}{}", operator, argument))
            }
        }
        _ => None,
    }
}
