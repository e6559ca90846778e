//! # Severity Classification
//!
//! Maps a run's diffs to a single [`Classification`]. Rules are evaluated per
//! entry and are deterministic:
//!
//! | Entry | Severity | Reason |
//! |-------|----------|--------|
//! | any removal | `MAJOR` | field removed, breaking |
//! | removal of a deprecated field | `MAJOR` | noted as already deprecated |
//! | type change | `MAJOR` | type changed, breaking |
//! | any other addition | `MINOR` | field added, additive |
//!
//! The run severity is the maximum over all entries. Reasons are grouped by
//! target id in sorted order, whatever order the targets were configured in;
//! within a target, removals come first.

use crate::models::{Change, ChangeKind, Classification, DiffSet, Severity};

/// Reason emitted when there is nothing to report.
pub const NO_SIGNIFICANT_CHANGES: &str = "[MINOR] no significant changes";

/// Classifies the diffs of one run.
///
/// Never returns an empty reason list: an empty map, or a map of empty
/// diffs, yields a single `minor` "no significant changes" reason.
///
/// Reasons follow [`DiffSet`] iteration order, which is sorted by target id,
/// so the same drift always yields the same reason list.
///
/// # Example
///
/// ```rust
/// use driftwatch_schema::severity::classify;
/// use driftwatch_schema::{Change, DiffSet, Severity, SignatureDiff};
///
/// let mut diffs = DiffSet::new();
/// diffs.insert(
///     "users".to_string(),
///     SignatureDiff { added: vec![Change::field_added("b")], removed: vec![] },
/// );
/// assert_eq!(classify(&diffs).severity, Severity::Minor);
///
/// diffs.get_mut("users").unwrap().removed.push(Change::field_removed("c"));
/// assert_eq!(classify(&diffs).severity, Severity::Major);
/// ```
pub fn classify(diffs: &DiffSet) -> Classification {
    let mut severity = Severity::Minor;
    let mut reasons = Vec::new();

    for (target, diff) in diffs {
        for change in diff.removed.iter().chain(diff.added.iter()) {
            let (level, reason) = reason_for(target, change);
            severity = severity.max(level);
            reasons.push(reason);
        }
    }

    if reasons.is_empty() {
        reasons.push(NO_SIGNIFICANT_CHANGES.to_string());
    }

    Classification { severity, reasons }
}

/// Decides whether a run with `severity` should fail the caller's gate.
///
/// `major` always blocks. `gate` lets a deployment also block on `minor`.
pub fn should_block(severity: Severity, gate: Option<Severity>) -> bool {
    severity == Severity::Major || gate == Some(severity)
}

fn reason_for(target: &str, change: &Change) -> (Severity, String) {
    let (level, message) = match change.kind {
        ChangeKind::FieldRemoved | ChangeKind::GraphQlFieldRemoved if change.deprecated => (
            Severity::Major,
            format!(
                "deprecated field '{}' removed (breaking, was already deprecated)",
                change.detail
            ),
        ),
        ChangeKind::FieldRemoved | ChangeKind::GraphQlFieldRemoved => (
            Severity::Major,
            format!("field '{}' removed (breaking)", change.detail),
        ),
        ChangeKind::TypeChanged => (
            Severity::Major,
            format!("field '{}' type changed (breaking)", change.detail),
        ),
        ChangeKind::FieldAdded | ChangeKind::GraphQlFieldAdded => (
            Severity::Minor,
            format!("field '{}' added (additive)", change.detail),
        ),
    };

    (level, format!("[{}] {}: {}", level.label(), target, message))
}
