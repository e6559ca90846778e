//! # Canonical Fingerprints
//!
//! Signatures and diffs are fingerprinted from their RFC 8785 canonical JSON
//! form, so two structurally equal values always hash to the same digest
//! regardless of how they were built. Fingerprints appear in change reports
//! and key the alert dedup cache.
//!
//! Only the subset of RFC 8785 that signature and diff documents exercise
//! needs care here: object keys sorted by UTF-16 code units, minimal string
//! escaping, and no insignificant whitespace.
//!
//! ## References
//!
//! - **RFC 8785** - "JSON Canonicalization Scheme (JCS)"
//!   <https://www.rfc-editor.org/rfc/rfc8785>

use crate::models::{DiffSet, Fingerprint, Result, Signature};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Canonical JSON text of a value.
///
/// ```rust
/// use driftwatch_schema::canonicalize::canonicalize;
/// use serde_json::json;
///
/// assert_eq!(canonicalize(&json!({"b": [1, "x"], "a": null})), r#"{"a":null,"b":[1,"x"]}"#);
/// ```
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

/// SHA-256 of the canonical form of any serializable value.
///
/// # Errors
///
/// Returns `SchemaError::Serialization` if `value` has no JSON form, such
/// as a map with non-string keys. Distinct values never share a digest.
pub fn fingerprint_of<T: Serialize>(value: &T) -> Result<Fingerprint> {
    let json = serde_json::to_value(value)?;
    Ok(Sha256::digest(canonicalize(&json).as_bytes()).into())
}

/// Fingerprint of one target's signature.
pub fn signature_fingerprint(signature: &Signature) -> Result<Fingerprint> {
    fingerprint_of(signature)
}

/// Fingerprint of a run's diffs; identical drift yields identical digests.
pub fn diff_fingerprint(diffs: &DiffSet) -> Result<Fingerprint> {
    fingerprint_of(diffs)
}

/// Lowercase hex rendering of a fingerprint.
pub fn to_hex(fingerprint: &Fingerprint) -> String {
    hex::encode(fingerprint)
}

/// First twelve hex digits, enough to tell fingerprints apart in a report.
pub fn short_hex(fingerprint: &Fingerprint) -> String {
    let mut full = to_hex(fingerprint);
    full.truncate(12);
    full
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(obj) => write_object(obj, out),
    }
}

fn write_object(obj: &Map<String, Value>, out: &mut String) {
    let mut entries: Vec<(&String, &Value)> = obj.iter().collect();
    // RFC 8785 section 3.2.3: order by UTF-16 code units, not bytes.
    entries.sort_by(|(a, _), (b, _)| a.encode_utf16().cmp(b.encode_utf16()));

    out.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(key, out);
        out.push(':');
        write_value(value, out);
    }
    out.push('}');
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\x08' => out.push_str("\\b"),
            '\x0C' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c < '\x20' => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}
