//! # Core Data Models for Drift Detection
//!
//! This module defines the types shared by the extractor, differ, classifier
//! and baseline store. Signatures are plain sorted maps so that equal
//! structural content always serializes to identical bytes.
//!
//! ## Failure Modes Addressed
//!
//! - **Ambiguous Tokens**: Diff entries are a tagged [`Change`] rather than
//!   encoded strings, so the classifier never parses text to decide severity.
//! - **Unstable Ordering**: Every map is a `BTreeMap`; iteration order is the
//!   sort order of the keys.
//! - **Silent Verdicts**: [`Classification`] always carries at least one reason.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// SHA-256 output size in bytes.
pub const FINGERPRINT_SIZE: usize = 32;

/// A 32-byte SHA-256 digest of a canonicalized signature or diff.
pub type Fingerprint = [u8; FINGERPRINT_SIZE];

/// Suffix appended to GraphQL field tokens the API marks as deprecated.
pub const DEPRECATED_SUFFIX: &str = " [DEPRECATED]";

/// Value-kind tag recorded for each top-level field of a REST response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// JSON string.
    String,
    /// JSON number (integer or float).
    Number,
    /// JSON `true` / `false`.
    Boolean,
    /// JSON object. Never recursed into.
    Object,
    /// JSON array, regardless of element kinds.
    Array,
    /// JSON `null`.
    Null,
}

impl ValueKind {
    /// Returns the kind tag for a JSON value.
    pub fn of(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    /// Lowercase tag as persisted in the baseline.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a [`Signature`].
///
/// REST fields carry a [`ValueKind`]. GraphQL object types carry the sorted
/// list of their `"field:Type"` tokens. The untagged representation keeps the
/// persisted baseline readable: `"id": "number"` or `"Character": ["id:ID"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignatureEntry {
    /// Kind tag of a REST top-level field.
    Kind(ValueKind),
    /// Sorted field tokens of a GraphQL object type.
    Fields(Vec<String>),
}

/// Flattened structural fingerprint of one target's response shape.
///
/// Keys are REST field names or GraphQL type names.
pub type Signature = BTreeMap<String, SignatureEntry>;

/// Wire protocol of a monitored target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plain JSON over HTTP.
    Rest,
    /// GraphQL endpoint observed through introspection.
    GraphQl,
}

/// Last-accepted signature per target id.
///
/// Serializes as a plain JSON object keyed by target id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Baseline {
    targets: BTreeMap<String, Signature>,
}

impl Baseline {
    /// Creates an empty baseline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored signature for a target.
    pub fn get(&self, target: &str) -> Option<&Signature> {
        self.targets.get(target)
    }

    /// Inserts or replaces the signature for a target.
    pub fn insert(&mut self, target: impl Into<String>, signature: Signature) {
        self.targets.insert(target.into(), signature);
    }

    /// Returns true when the target has an entry.
    pub fn contains(&self, target: &str) -> bool {
        self.targets.contains_key(target)
    }

    /// Builds the next baseline candidate.
    ///
    /// Observed signatures replace their entries; targets missing from
    /// `observed` (unreachable this run) keep their previous entry.
    pub fn merge_observed(&self, observed: &BTreeMap<String, Signature>) -> Baseline {
        let mut merged = self.clone();
        for (target, signature) in observed {
            merged.insert(target.clone(), signature.clone());
        }
        merged
    }

    /// Iterates `(target id, signature)` pairs in target order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Signature)> {
        self.targets.iter()
    }

    /// Sorted target ids.
    pub fn target_ids(&self) -> Vec<String> {
        self.targets.keys().cloned().collect()
    }

    /// Number of targets with an entry.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns true if no target has an entry.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl FromIterator<(String, Signature)> for Baseline {
    fn from_iter<I: IntoIterator<Item = (String, Signature)>>(iter: I) -> Self {
        Self {
            targets: iter.into_iter().collect(),
        }
    }
}

/// What a single [`Change`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Top-level key (REST field or GraphQL type) appeared.
    FieldAdded,
    /// Top-level key disappeared.
    FieldRemoved,
    /// Key present on both sides with a different kind.
    TypeChanged,
    /// Field token appeared inside a GraphQL type.
    GraphQlFieldAdded,
    /// Field token disappeared from a GraphQL type.
    GraphQlFieldRemoved,
}

/// A decoded diff entry.
///
/// `detail` is the key for top-level changes and `"<Type>.<field>:<Type>"` for
/// GraphQL field changes. The deprecation suffix never appears in `detail`;
/// it is carried by `deprecated` and re-attached by `Display`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Variant of the change.
    pub kind: ChangeKind,
    /// Field, type or `Type.token` the change refers to.
    pub detail: String,
    /// Whether the source marked the entry deprecated.
    #[serde(default)]
    pub deprecated: bool,
}

impl Change {
    /// A key present only in the current signature.
    pub fn field_added(key: impl Into<String>) -> Self {
        Self::plain(ChangeKind::FieldAdded, key.into())
    }

    /// A key present only in the previous signature.
    pub fn field_removed(key: impl Into<String>) -> Self {
        Self::plain(ChangeKind::FieldRemoved, key.into())
    }

    /// A key whose kind differs between signatures.
    pub fn type_changed(key: impl Into<String>) -> Self {
        Self::plain(ChangeKind::TypeChanged, key.into())
    }

    /// A GraphQL field token new in `type_name`.
    pub fn graphql_added(type_name: &str, token: &str) -> Self {
        Self::graphql(ChangeKind::GraphQlFieldAdded, type_name, token)
    }

    /// A GraphQL field token no longer present in `type_name`.
    pub fn graphql_removed(type_name: &str, token: &str) -> Self {
        Self::graphql(ChangeKind::GraphQlFieldRemoved, type_name, token)
    }

    fn plain(kind: ChangeKind, detail: String) -> Self {
        Self {
            kind,
            detail,
            deprecated: false,
        }
    }

    fn graphql(kind: ChangeKind, type_name: &str, token: &str) -> Self {
        let (token, deprecated) = match token.strip_suffix(DEPRECATED_SUFFIX) {
            Some(stripped) => (stripped, true),
            None => (token, false),
        };
        Self {
            kind,
            detail: format!("{}.{}", type_name, token),
            deprecated,
        }
    }

    /// Returns true for removals of any flavour.
    pub fn is_removal(&self) -> bool {
        matches!(
            self.kind,
            ChangeKind::FieldRemoved | ChangeKind::GraphQlFieldRemoved
        )
    }

    /// Returns true when the change breaks existing consumers.
    pub fn is_breaking(&self) -> bool {
        self.is_removal() || self.kind == ChangeKind::TypeChanged
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ChangeKind::TypeChanged => write!(f, "{} (type changed)", self.detail)?,
            _ => f.write_str(&self.detail)?,
        }
        if self.deprecated {
            f.write_str(DEPRECATED_SUFFIX)?;
        }
        Ok(())
    }
}

/// Differences between two signatures of the same target.
///
/// Type changes only ever appear in `added`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureDiff {
    /// New keys, new GraphQL tokens and kind changes.
    pub added: Vec<Change>,
    /// Keys and GraphQL tokens no longer present.
    pub removed: Vec<Change>,
}

impl SignatureDiff {
    /// Returns true when nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

/// Non-empty diffs keyed by target id.
///
/// Iterates in sorted target-id order, not configuration order.
pub type DiffSet = BTreeMap<String, SignatureDiff>;

/// Severity of detected drift.
///
/// Ordered so that `max` over a run yields the run-level severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Additive change. Existing consumers keep working.
    Minor,
    /// Breaking change: a removal or a kind change.
    Major,
}

impl Severity {
    /// Uppercase tag used as the reason prefix.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Minor => "MINOR",
            Self::Major => "MAJOR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minor => f.write_str("minor"),
            Self::Major => f.write_str("major"),
        }
    }
}

/// Verdict of the severity classifier for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Maximum severity across all targets.
    pub severity: Severity,
    /// `[MAJOR]`/`[MINOR]` tagged reasons, grouped by target. Never empty.
    pub reasons: Vec<String>,
}

/// Result of a baseline update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Whether the candidate baseline was staged.
    pub accepted: bool,
    /// Advisory gate signal for the caller's exit status.
    pub should_block: bool,
    /// Directory the candidate and change report were written to.
    pub staged_path: Option<PathBuf>,
}

/// Errors raised by extraction and baseline persistence.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Reading or writing a baseline document failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A baseline document could not be serialized or parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A GraphQL response lacked the introspection shape.
    #[error("Malformed introspection response: {0}")]
    MalformedIntrospection(String),
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
