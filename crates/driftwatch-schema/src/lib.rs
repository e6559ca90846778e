//! # Driftwatch Schema - Structural Drift Detection
//!
//! This crate holds the algorithmic core of driftwatch: it reduces API
//! responses to structural signatures, diffs them against a persisted
//! baseline, and classifies the result as breaking or additive.
//!
//! ## Purpose
//!
//! 1. **Extraction** - REST responses become a one-level map of field to
//!    value kind; GraphQL introspection results become a map of object type
//!    to sorted `field:Type` tokens.
//!
//! 2. **Diffing** - Set-based comparison of two signatures, producing tagged
//!    [`Change`] entries rather than encoded strings.
//!
//! 3. **Classification** - Deterministic `major`/`minor` verdicts with one
//!    human-readable reason per change.
//!
//! 4. **Baseline Storage** - Whole-document JSON persistence with atomic
//!    replacement and a stage-for-review update path.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       DRIFTWATCH SCHEMA                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │   raw JSON ──▶ ┌───────────┐  Signature  ┌──────────┐            │
//! │                │ EXTRACTOR │───────────▶ │  DIFFER  │◀── baseline │
//! │                └───────────┘             └────┬─────┘            │
//! │                                               │ DiffSet          │
//! │                                               ▼                  │
//! │                ┌───────────────┐        ┌────────────┐           │
//! │                │ BASELINE STORE│◀───────│ CLASSIFIER │           │
//! │                │ load / stage  │ verdict└────────────┘           │
//! │                └───────────────┘                                 │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use driftwatch_schema::{classify, diff, extract, Protocol, Severity};
//! use serde_json::json;
//!
//! let previous = extract(&json!({"a": "x", "c": true}), Protocol::Rest).unwrap();
//! let current = extract(&json!({"a": "x"}), Protocol::Rest).unwrap();
//!
//! let mut diffs = driftwatch_schema::DiffSet::new();
//! diffs.insert("users".to_string(), diff(&previous, &current));
//!
//! let verdict = classify(&diffs);
//! assert_eq!(verdict.severity, Severity::Major);
//! assert_eq!(verdict.reasons, vec!["[MAJOR] users: field 'c' removed (breaking)"]);
//! ```
//!
//! ## Limits
//!
//! This is not a JSON-Schema or OpenAPI differ. Nested REST objects register
//! only as `object`; GraphQL comparison stops at field name and named type.

pub mod baseline;
pub mod canonicalize;
pub mod diff;
pub mod extract;
pub mod models;
pub mod severity;

pub use baseline::{BaselineStore, StoreConfig, UpdateStrategy};
pub use diff::{diff, diff_baseline, BaselineDiff};
pub use extract::{detect_protocol, extract, INTROSPECTION_QUERY};
pub use models::{
    Baseline, Change, ChangeKind, Classification, DiffSet, Fingerprint, Protocol, Result,
    SchemaError, Severity, Signature, SignatureDiff, SignatureEntry, UpdateOutcome, ValueKind,
};
pub use severity::{classify, should_block};
