//! Generic metadata filtering.
//!
//! A filter is an AND of `key → value` constraints. A constraint admits a
//! chunk when the chunk's metadata field equals the value, or is a sequence
//! containing it. Missing keys and mismatched types never match and never
//! error, so filtering stays total over arbitrary metadata shapes.

use serde_json::Value;

use crate::models::{Filter, Metadata};

/// Whether `metadata` satisfies every constraint in `filter`.
pub fn matches(metadata: &Metadata, filter: &Filter) -> bool {
    filter.iter().all(|(key, expected)| {
        metadata
            .get(key)
            .is_some_and(|actual| value_matches(actual, expected))
    })
}

fn value_matches(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match actual {
        Value::Array(items) => items.iter().any(|item| item == expected),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(pairs: &[(&str, Value)]) -> Metadata {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn filter(pairs: &[(&str, Value)]) -> Filter {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(matches(&Metadata::new(), &Filter::new()));
        assert!(matches(&meta(&[("user_id", json!("u1"))]), &Filter::new()));
    }

    #[test]
    fn test_scalar_equality() {
        let m = meta(&[("user_id", json!("u1")), ("count", json!(3))]);
        assert!(matches(&m, &filter(&[("user_id", json!("u1"))])));
        assert!(matches(&m, &filter(&[("count", json!(3))])));
        assert!(!matches(&m, &filter(&[("user_id", json!("u2"))])));
    }

    #[test]
    fn test_conjunction() {
        let m = meta(&[("user_id", json!("u1")), ("resource_type", json!("message"))]);
        assert!(matches(
            &m,
            &filter(&[("user_id", json!("u1")), ("resource_type", json!("message"))])
        ));
        assert!(!matches(
            &m,
            &filter(&[("user_id", json!("u1")), ("resource_type", json!("draft"))])
        ));
    }

    #[test]
    fn test_sequence_containment() {
        let m = meta(&[("labels", json!(["INBOX", "STARRED"]))]);
        assert!(matches(&m, &filter(&[("labels", json!("STARRED"))])));
        assert!(!matches(&m, &filter(&[("labels", json!("SPAM"))])));
        assert!(matches(&m, &filter(&[("labels", json!(["INBOX", "STARRED"]))])));
    }

    #[test]
    fn test_missing_key_and_type_mismatch_do_not_match() {
        let m = meta(&[("count", json!(3)), ("flag", json!(true))]);
        assert!(!matches(&m, &filter(&[("absent", json!("x"))])));
        assert!(!matches(&m, &filter(&[("count", json!("3"))])));
        assert!(!matches(&m, &filter(&[("flag", json!({"nested": true}))])));
    }
}
