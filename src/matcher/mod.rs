//! SM-001: Structural pattern matcher over ESTree-shaped JSON trees.
//!
//! `matches(node, pattern)` is directional: every field the pattern declares
//! must be present on the node and match; extra node fields are ignored.
//! Array patterns are prefix matches; trailing node elements are
//! unconstrained. Exact arity, where it matters, is checked by the caller.

pub mod pattern;

pub use pattern::{Pattern, PatternError};

use serde_json::Value;

/// Test whether `node` satisfies `pattern`. Pure; never mutates the node.
pub fn matches(node: &Value, pattern: &Pattern) -> bool {
    match pattern {
        Pattern::Wildcard => true,
        Pattern::Scalar(expected) => node == expected,
        Pattern::Fields(fields) => match node {
            Value::Object(map) => fields.iter().all(|(key, sub)| match map.get(key) {
                Some(value) => matches(value, sub),
                None => false,
            }),
            _ => false,
        },
        Pattern::Elements(items) => match node {
            Value::Array(values) => {
                values.len() >= items.len()
                    && items.iter().zip(values).all(|(sub, value)| matches(value, sub))
            }
            _ => false,
        },
        Pattern::Or(alternatives) => alternatives.iter().any(|alt| matches(node, alt)),
        Pattern::AnyKey(inner) => match node {
            Value::Object(map) => map.values().any(|value| matches(value, inner)),
            Value::Array(values) => values.iter().any(|value| matches(value, inner)),
            _ => false,
        },
    }
}

/// Return the index of the first alternative matching `node`.
/// Non-alternation patterns behave as a single alternative at index 0.
pub fn which(node: &Value, pattern: &Pattern) -> Option<usize> {
    match pattern {
        Pattern::Or(alternatives) => alternatives.iter().position(|alt| matches(node, alt)),
        other => matches(node, other).then_some(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn compile(template: Value) -> Pattern {
        Pattern::compile(&template).unwrap()
    }

    #[test]
    fn test_sm001_wildcard_matches_everything() {
        for node in [json!(null), json!(1), json!("x"), json!([1, 2]), json!({"type": "A"})] {
            assert!(matches(&node, &Pattern::Wildcard));
        }
    }

    #[test]
    fn test_sm001_type_tag_mandatory() {
        let p = compile(json!({ "type": "Identifier" }));
        assert!(matches(&json!({ "type": "Identifier", "name": "a" }), &p));
        assert!(!matches(&json!({ "type": "Literal", "value": 1 }), &p));
        assert!(!matches(&json!({ "name": "a" }), &p));
    }

    #[test]
    fn test_sm001_literal_mismatch_is_false() {
        let p = compile(json!({ "type": "Literal", "value": 3 }));
        assert!(matches(&json!({ "type": "Literal", "value": 3, "raw": "3" }), &p));
        assert!(!matches(&json!({ "type": "Literal", "value": 4 }), &p));
        assert!(!matches(&json!({ "type": "Literal", "value": "3" }), &p));
    }

    #[test]
    fn test_sm001_declared_field_must_be_present() {
        // Even a wildcard field requires presence.
        let p = compile(json!({ "init": {} }));
        assert!(matches(&json!({ "init": null }), &p));
        assert!(!matches(&json!({ "id": "x" }), &p));
    }

    #[test]
    fn test_sm001_array_prefix_semantics() {
        let p = compile(json!([{ "type": "A" }]));
        assert!(matches(&json!([{ "type": "A" }, { "type": "B" }, { "type": "C" }]), &p));
        assert!(!matches(&json!([{ "type": "B" }, { "type": "A" }]), &p));
        assert!(!matches(&json!([]), &p));
        assert!(!matches(&json!({ "0": { "type": "A" } }), &p));
    }

    #[test]
    fn test_sm001_alternation_in_order() {
        let p = compile(json!({ "or": [{ "type": "A" }, { "type": "B" }, {}] }));
        assert_eq!(which(&json!({ "type": "B" }), &p), Some(1));
        assert_eq!(which(&json!({ "type": "A" }), &p), Some(0));
        assert_eq!(which(&json!({ "type": "Z" }), &p), Some(2));
        let strict = compile(json!({ "or": [{ "type": "A" }] }));
        assert_eq!(which(&json!({ "type": "Z" }), &strict), None);
    }

    #[test]
    fn test_sm001_anykey_over_mapping_and_array() {
        let p = compile(json!({ "anykey": { "type": "Hit" } }));
        assert!(matches(&json!({ "x": { "type": "Miss" }, "y": { "type": "Hit" } }), &p));
        assert!(matches(&json!([{ "type": "Miss" }, { "type": "Hit" }]), &p));
        assert!(!matches(&json!({ "x": { "type": "Miss" } }), &p));
        assert!(!matches(&json!({}), &p));
        assert!(!matches(&json!("Hit"), &p));
    }

    #[test]
    fn test_sm001_nested_recursion() {
        let p = compile(json!({
            "type": "CallExpression",
            "callee": { "type": "Identifier", "name": "decodeURIComponent" },
            "arguments": [{ "type": "Identifier" }]
        }));
        let node = json!({
            "type": "CallExpression",
            "callee": { "type": "Identifier", "name": "decodeURIComponent" },
            "arguments": [{ "type": "Identifier", "name": "b" }],
            "optional": false
        });
        assert!(matches(&node, &p));
        let wrong_callee = json!({
            "type": "CallExpression",
            "callee": { "type": "Identifier", "name": "escape" },
            "arguments": [{ "type": "Identifier", "name": "b" }]
        });
        assert!(!matches(&wrong_callee, &p));
    }

    fn arb_node() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(|n| json!(n)),
            "[a-z]{0,6}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    fn collides_with_marker(node: &Value) -> bool {
        let text = node.to_string();
        text.contains("\"or\"") || text.contains("\"anykey\"")
    }

    proptest! {
        #[test]
        fn prop_empty_template_matches_any_node(node in arb_node()) {
            let wildcard = compile(json!({}));
            prop_assert!(matches(&node, &wildcard));
        }

        #[test]
        fn prop_alternation_keeps_first_match(node in arb_node(), other in arb_node()) {
            // A template compiled from the node itself always satisfies the premise.
            prop_assume!(!collides_with_marker(&node));
            let p1 = Pattern::compile(&node).unwrap_or(Pattern::Wildcard);
            let p2 = Pattern::compile(&other).unwrap_or(Pattern::Wildcard);
            prop_assume!(matches(&node, &p1));
            let either = Pattern::Or(vec![p1, p2]);
            prop_assert!(matches(&node, &either));
            prop_assert_eq!(which(&node, &either), Some(0));
        }

        #[test]
        fn prop_node_matches_itself(node in arb_node()) {
            // Templates built from a node never constrain it beyond its own shape,
            // except for objects that collide with marker keys.
            if let Ok(p) = Pattern::compile(&node) {
                if !collides_with_marker(&node) {
                    prop_assert!(matches(&node, &p));
                }
            }
        }

        #[test]
        fn prop_array_prefix_ignores_tail(head in arb_node(), tail in prop::collection::vec(arb_node(), 0..4)) {
            let mut items = vec![json!({ "type": "Head", "v": head })];
            items.extend(tail);
            let p = compile(json!([{ "type": "Head" }]));
            prop_assert!(matches(&Value::Array(items), &p));
        }
    }
}
