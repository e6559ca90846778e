//! Outcome types of a drift run.

use crate::summarize::Summary;
use driftwatch_notify::{Report, ReportLevel};
use driftwatch_schema::{Classification, DiffSet, Severity};
use std::fmt::Write as _;
use std::path::PathBuf;

/// Exit status for a run that found nothing blocking.
pub const EXIT_OK: i32 = 0;
/// Exit status for a run whose drift trips the gate.
pub const EXIT_BLOCKED: i32 = 1;
/// Exit status for a failed run.
pub const EXIT_FAILED: i32 = 2;

/// How a run ended, short of a fatal error.
///
/// Fatal errors are returned as `Err(DriftError)` by the orchestrator and
/// map to [`EXIT_FAILED`].
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every phase ran.
    Completed(RunReport),
    /// Preflight denied the run; nothing was fetched.
    Skipped {
        /// Reason given by the preflight.
        reason: String,
    },
}

impl RunOutcome {
    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed(report) if report.should_block => EXIT_BLOCKED,
            Self::Completed(_) | Self::Skipped { .. } => EXIT_OK,
        }
    }

    /// The report of a completed run.
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Skipped { .. } => None,
        }
    }

    /// Returns true if preflight denied the run.
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Everything a completed run observed and decided.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Number of configured targets.
    pub total_targets: usize,
    /// Targets fetched and extracted this run.
    pub fetched: Vec<String>,
    /// Targets skipped because of a fetch or extraction error.
    pub failed: Vec<String>,
    /// Targets observed for the first time.
    pub new_targets: Vec<String>,
    /// Non-empty diffs against the baseline.
    pub diffs: DiffSet,
    /// Present when `diffs` is non-empty.
    pub classification: Option<Classification>,
    /// Present when `diffs` is non-empty.
    pub summary: Option<Summary>,
    /// Advisory gate signal.
    pub should_block: bool,
    /// Where a candidate baseline was staged, if anywhere.
    pub staged_path: Option<PathBuf>,
}

impl RunReport {
    /// Returns true if no target drifted.
    pub fn is_stable(&self) -> bool {
        self.diffs.is_empty()
    }

    /// Returns true if targets were configured and none could be fetched.
    pub fn all_failed(&self) -> bool {
        self.total_targets > 0 && self.fetched.is_empty()
    }

    /// Highest severity, if anything drifted.
    pub fn severity(&self) -> Option<Severity> {
        self.classification.as_ref().map(|c| c.severity)
    }

    /// Renders the report delivered to sinks.
    pub fn to_report(&self) -> Report {
        let (level, title) = match self.severity() {
            Some(Severity::Major) => (ReportLevel::Alert, "API drift detected: major".to_string()),
            Some(Severity::Minor) => (ReportLevel::Warning, "API drift detected: minor".to_string()),
            None if !self.failed.is_empty() => (
                ReportLevel::Warning,
                format!("No drift, {} targets could not be fetched", self.failed.len()),
            ),
            None => (ReportLevel::Info, "All targets stable".to_string()),
        };

        let mut body = String::new();
        if let Some(classification) = &self.classification {
            for reason in &classification.reasons {
                let _ = writeln!(body, "{}", reason);
            }
        }
        if let Some(summary) = &self.summary {
            let _ = writeln!(body);
            let _ = writeln!(body, "{}", summary.summary);
            for risk in &summary.risks {
                let _ = writeln!(body, "- {}", risk);
            }
        }

        let mut report = Report::new(level, title, body.trim_end())
            .with_fact("Targets", self.total_targets)
            .with_fact("Fetched", self.fetched.len());
        if !self.failed.is_empty() {
            report = report.with_fact("Failed", self.failed.join(", "));
        }
        if !self.new_targets.is_empty() {
            report = report.with_fact("New", self.new_targets.join(", "));
        }
        if let Some(severity) = self.severity() {
            report = report
                .with_fact("Severity", severity)
                .with_fact("Blocking", self.should_block);
        }
        if let Some(path) = &self.staged_path {
            report = report.with_fact("Staged", path.display());
        }
        report
    }
}
