//! # Signature Diffing
//!
//! Computes what was added to and removed from a target's signature between
//! two runs. The comparison is set-based over the union of keys, so it does
//! not depend on the order fields appeared in the response.
//!
//! ## Rules
//!
//! | Previous | Current | Emitted |
//! |----------|---------|---------|
//! | absent | present | `added`: key |
//! | present | absent | `removed`: key |
//! | token list | token list | per token, `Type.token` in `added` / `removed` |
//! | kind A | kind B | `added`: `key (type changed)` |
//! | equal | equal | nothing |
//!
//! A kind change is a single entry in `added` and never a removal; the
//! classifier recognises it by its [`ChangeKind`](crate::ChangeKind).
//!
//! ## Detection Philosophy
//!
//! Comparison is one level deep for REST and one type deep for GraphQL.
//! Nested objects only ever register as an `object` kind tag.

use crate::models::{Baseline, Change, DiffSet, Signature, SignatureDiff, SignatureEntry};
use std::collections::{BTreeMap, BTreeSet};

/// Diffs two signatures of the same target.
///
/// Output order is deterministic: keys in sort order, GraphQL tokens in sort
/// order within each type.
///
/// # Example
///
/// ```rust
/// use driftwatch_schema::diff::diff;
/// use driftwatch_schema::{Signature, SignatureEntry, ValueKind};
///
/// let mut previous = Signature::new();
/// previous.insert("a".into(), SignatureEntry::Kind(ValueKind::String));
///
/// let mut current = previous.clone();
/// current.insert("b".into(), SignatureEntry::Kind(ValueKind::Number));
///
/// let d = diff(&previous, &current);
/// assert_eq!(d.added.len(), 1);
/// assert_eq!(d.added[0].to_string(), "b");
/// assert!(d.removed.is_empty());
/// ```
pub fn diff(previous: &Signature, current: &Signature) -> SignatureDiff {
    let mut out = SignatureDiff::default();
    let keys: BTreeSet<&String> = previous.keys().chain(current.keys()).collect();

    for key in keys {
        match (previous.get(key), current.get(key)) {
            (None, Some(_)) => out.added.push(Change::field_added(key.as_str())),
            (Some(_), None) => out.removed.push(Change::field_removed(key.as_str())),
            (Some(SignatureEntry::Fields(old)), Some(SignatureEntry::Fields(new))) => {
                compare_fields(key, old, new, &mut out);
            }
            (Some(old), Some(new)) if old != new => {
                out.added.push(Change::type_changed(key.as_str()));
            }
            _ => {}
        }
    }

    out
}

/// Set-compares the field tokens of one GraphQL type.
fn compare_fields(type_name: &str, old: &[String], new: &[String], out: &mut SignatureDiff) {
    let old_set: BTreeSet<&str> = old.iter().map(String::as_str).collect();
    let new_set: BTreeSet<&str> = new.iter().map(String::as_str).collect();

    for token in new_set.difference(&old_set) {
        out.added.push(Change::graphql_added(type_name, token));
    }
    for token in old_set.difference(&new_set) {
        out.removed.push(Change::graphql_removed(type_name, token));
    }
}

/// Per-run comparison of observed signatures against the baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaselineDiff {
    /// Non-empty diffs of targets that already had a baseline entry.
    pub diffs: DiffSet,
    /// Targets observed for the first time. Not drift.
    pub new_targets: Vec<String>,
}

/// Diffs every observed target against its baseline entry.
///
/// A target with no baseline entry is diffed against an empty signature,
/// which would report every key as added. That first observation is not
/// drift, so such targets are listed in `new_targets` instead of `diffs`.
pub fn diff_baseline(baseline: &Baseline, observed: &BTreeMap<String, Signature>) -> BaselineDiff {
    let mut result = BaselineDiff::default();

    for (target, current) in observed {
        match baseline.get(target) {
            Some(previous) => {
                let d = diff(previous, current);
                if !d.is_empty() {
                    result.diffs.insert(target.clone(), d);
                }
            }
            None => result.new_targets.push(target.clone()),
        }
    }

    result
}
