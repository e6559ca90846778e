//! # Schema Extraction
//!
//! Reduces a raw API response to a flat [`Signature`]. Extraction is a pure
//! function of its input: the same response always yields the same signature,
//! which matters because signatures are both diffed and persisted.
//!
//! ## REST
//!
//! Each top-level key of an object response is tagged with its
//! [`ValueKind`]. Nested objects are tagged `object` and not recursed into.
//! A response that is not an object yields an empty signature.
//!
//! ## GraphQL
//!
//! The response of the introspection query is filtered to user-defined
//! `OBJECT` types. Meta types (`__Schema`, `__Type`, ...) and the root
//! operation types are entry points rather than data shapes and are skipped.
//! Each field becomes a `"name:Type"` token; deprecated fields get a
//! `" [DEPRECATED]"` suffix.

use crate::models::{
    Protocol, Result, SchemaError, Signature, SignatureEntry, ValueKind, DEPRECATED_SUFFIX,
};
use serde_json::Value;

/// Standard introspection query sent to GraphQL targets in place of their
/// configured body.
pub const INTROSPECTION_QUERY: &str = "query IntrospectionQuery { __schema { types { kind name fields(includeDeprecated: true) { name isDeprecated type { kind name ofType { kind name } } } } } }";

/// Root operation types excluded from GraphQL signatures.
const ROOT_OPERATION_TYPES: [&str; 3] = ["Query", "Mutation", "Subscription"];

/// Name prefix reserved for introspection meta types.
const META_TYPE_PREFIX: &str = "__";

/// Decides whether a target speaks GraphQL.
///
/// A target is GraphQL when its URL mentions `graphql` (any case) or its
/// request body is an object carrying a `query` field.
///
/// ```rust
/// use driftwatch_schema::extract::detect_protocol;
/// use driftwatch_schema::Protocol;
/// use serde_json::json;
///
/// assert_eq!(detect_protocol("https://api.example.com/GraphQL", None), Protocol::GraphQl);
/// assert_eq!(
///     detect_protocol("https://api.example.com/q", Some(&json!({"query": "{ me { id } }"}))),
///     Protocol::GraphQl
/// );
/// assert_eq!(detect_protocol("https://api.example.com/users", None), Protocol::Rest);
/// ```
pub fn detect_protocol(url: &str, body: Option<&Value>) -> Protocol {
    let url_marker = url.to_ascii_lowercase().contains("graphql");
    let query_body = body
        .and_then(Value::as_object)
        .map(|obj| obj.contains_key("query"))
        .unwrap_or(false);

    if url_marker || query_body {
        Protocol::GraphQl
    } else {
        Protocol::Rest
    }
}

/// Extracts the structural signature of a response.
///
/// # Errors
///
/// Returns [`SchemaError::MalformedIntrospection`] when a GraphQL response
/// does not contain a `__schema.types` array. REST extraction never fails.
///
/// # Example
///
/// ```rust
/// use driftwatch_schema::extract::extract;
/// use driftwatch_schema::{Protocol, SignatureEntry, ValueKind};
/// use serde_json::json;
///
/// let sig = extract(&json!({"id": 7, "tags": [], "owner": {"id": 1}}), Protocol::Rest).unwrap();
/// assert_eq!(sig["id"], SignatureEntry::Kind(ValueKind::Number));
/// assert_eq!(sig["tags"], SignatureEntry::Kind(ValueKind::Array));
/// assert_eq!(sig["owner"], SignatureEntry::Kind(ValueKind::Object));
/// ```
pub fn extract(raw: &Value, protocol: Protocol) -> Result<Signature> {
    match protocol {
        Protocol::Rest => Ok(extract_rest(raw)),
        Protocol::GraphQl => extract_graphql(raw),
    }
}

fn extract_rest(raw: &Value) -> Signature {
    match raw.as_object() {
        Some(obj) => obj
            .iter()
            .map(|(key, value)| (key.clone(), SignatureEntry::Kind(ValueKind::of(value))))
            .collect(),
        None => Signature::new(),
    }
}

fn extract_graphql(raw: &Value) -> Result<Signature> {
    // Servers answer with {"data": {"__schema": ...}}; saved dumps often omit "data".
    let schema = raw
        .pointer("/data/__schema")
        .or_else(|| raw.get("__schema"))
        .ok_or_else(|| SchemaError::MalformedIntrospection("missing __schema".to_string()))?;

    let types = schema
        .get("types")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            SchemaError::MalformedIntrospection("__schema.types is not an array".to_string())
        })?;

    let mut signature = Signature::new();
    for ty in types {
        if ty.get("kind").and_then(Value::as_str) != Some("OBJECT") {
            continue;
        }
        let name = match ty.get("name").and_then(Value::as_str) {
            Some(name) => name,
            None => continue,
        };
        if name.starts_with(META_TYPE_PREFIX) || ROOT_OPERATION_TYPES.contains(&name) {
            continue;
        }

        let mut tokens: Vec<String> = ty
            .get("fields")
            .and_then(Value::as_array)
            .map(|fields| fields.iter().filter_map(field_token).collect())
            .unwrap_or_default();
        tokens.sort();

        signature.insert(name.to_string(), SignatureEntry::Fields(tokens));
    }

    Ok(signature)
}

/// Builds the `"name:Type[ [DEPRECATED]]"` token for one introspected field.
fn field_token(field: &Value) -> Option<String> {
    let name = field.get("name").and_then(Value::as_str)?;
    let type_name = field
        .get("type")
        .map(resolve_type_name)
        .unwrap_or_else(|| "Unknown".to_string());

    let mut token = format!("{}:{}", name, type_name);
    if field.get("isDeprecated").and_then(Value::as_bool) == Some(true) {
        token.push_str(DEPRECATED_SUFFIX);
    }
    Some(token)
}

/// Resolves a type reference to a display name, unwrapping one wrapper level.
///
/// `String` stays `String`, `String!` becomes `String`, and `[String!]!`
/// (two wrappers deep) falls back to the outer kind `NON_NULL`.
fn resolve_type_name(ty: &Value) -> String {
    let named = |v: &Value| v.get("name").and_then(Value::as_str).map(str::to_string);

    named(ty)
        .or_else(|| ty.get("ofType").and_then(named))
        .or_else(|| ty.get("kind").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "Unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn introspection(types: Value) -> Value {
        json!({"data": {"__schema": {"types": types}}})
    }

    #[test]
    fn test_rest_top_level_kinds() {
        let sig = extract(
            &json!({"a": "x", "b": 1, "c": true, "d": null, "e": [1], "f": {"deep": 1}}),
            Protocol::Rest,
        )
        .unwrap();

        assert_eq!(sig.len(), 6);
        assert_eq!(sig["a"], SignatureEntry::Kind(ValueKind::String));
        assert_eq!(sig["c"], SignatureEntry::Kind(ValueKind::Boolean));
        assert_eq!(sig["d"], SignatureEntry::Kind(ValueKind::Null));
        assert_eq!(sig["e"], SignatureEntry::Kind(ValueKind::Array));
        assert_eq!(sig["f"], SignatureEntry::Kind(ValueKind::Object));
        assert!(!sig.contains_key("deep"));
    }

    #[test]
    fn test_rest_non_object_is_empty() {
        assert!(extract(&json!([{"a": 1}]), Protocol::Rest).unwrap().is_empty());
        assert!(extract(&json!("ok"), Protocol::Rest).unwrap().is_empty());
        assert!(extract(&json!(null), Protocol::Rest).unwrap().is_empty());
    }

    #[test]
    fn test_graphql_filters_meta_and_root_types() {
        let raw = introspection(json!([
            {"kind": "OBJECT", "name": "Query", "fields": [{"name": "me", "type": {"kind": "OBJECT", "name": "User"}}]},
            {"kind": "OBJECT", "name": "Mutation", "fields": []},
            {"kind": "OBJECT", "name": "Subscription", "fields": []},
            {"kind": "OBJECT", "name": "__Schema", "fields": []},
            {"kind": "OBJECT", "name": "__Type", "fields": []},
            {"kind": "SCALAR", "name": "String", "fields": null},
            {"kind": "ENUM", "name": "Role", "fields": null},
            {"kind": "OBJECT", "name": "User", "fields": [
                {"name": "id", "isDeprecated": false, "type": {"kind": "NON_NULL", "name": null, "ofType": {"kind": "SCALAR", "name": "ID"}}}
            ]}
        ]));

        let sig = extract(&raw, Protocol::GraphQl).unwrap();
        let names: Vec<&String> = sig.keys().collect();
        assert_eq!(names, vec!["User"]);
        assert_eq!(sig["User"], SignatureEntry::Fields(vec!["id:ID".to_string()]));
    }

    #[test]
    fn test_graphql_tokens_sorted_and_deprecated() {
        let raw = introspection(json!([
            {"kind": "OBJECT", "name": "Character", "fields": [
                {"name": "name", "isDeprecated": false, "type": {"kind": "SCALAR", "name": "String"}},
                {"name": "age", "isDeprecated": true, "type": {"kind": "SCALAR", "name": "Int"}},
                {"name": "friends", "isDeprecated": false, "type": {"kind": "NON_NULL", "name": null, "ofType": {"kind": "LIST", "name": null}}}
            ]}
        ]));

        let sig = extract(&raw, Protocol::GraphQl).unwrap();
        assert_eq!(
            sig["Character"],
            SignatureEntry::Fields(vec![
                "age:Int [DEPRECATED]".to_string(),
                "friends:NON_NULL".to_string(),
                "name:String".to_string(),
            ])
        );
    }

    #[test]
    fn test_graphql_accepts_bare_schema() {
        let raw = json!({"__schema": {"types": [
            {"kind": "OBJECT", "name": "Droid", "fields": []}
        ]}});
        let sig = extract(&raw, Protocol::GraphQl).unwrap();
        assert_eq!(sig["Droid"], SignatureEntry::Fields(Vec::new()));
    }

    #[test]
    fn test_graphql_malformed() {
        let err = extract(&json!({"data": {"hero": {}}}), Protocol::GraphQl).unwrap_err();
        assert!(matches!(err, SchemaError::MalformedIntrospection(_)));

        let err = extract(&json!({"__schema": {"types": "nope"}}), Protocol::GraphQl).unwrap_err();
        assert!(matches!(err, SchemaError::MalformedIntrospection(_)));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let a = extract(&json!({"z": 1, "a": "x"}), Protocol::Rest).unwrap();
        let b = extract(&json!({"a": "y", "z": 2}), Protocol::Rest).unwrap();
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }

    #[test]
    fn test_detect_protocol_body_without_query() {
        assert_eq!(
            detect_protocol("https://api.example.com/items", Some(&json!({"name": "x"}))),
            Protocol::Rest
        );
    }
}
