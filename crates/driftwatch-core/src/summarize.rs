//! Human-readable drift summaries.
//!
//! A summary is decoration on top of the classification: it never changes
//! severity or gating. The remote [`HttpSummarizer`] is optional, and any
//! failure of it falls back to the deterministic [`LocalSummarizer`].

use crate::config::SummarizerConfig;
use crate::error::SummaryError;
use async_trait::async_trait;
use driftwatch_schema::{ChangeKind, DiffSet};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Prose description of a diff set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// One-paragraph overview.
    pub summary: String,
    /// Who or what is affected, one line per target.
    #[serde(default)]
    pub impact: Vec<String>,
    /// Concrete risks for consumers.
    #[serde(default)]
    pub risks: Vec<String>,
}

/// Produces a [`Summary`] for a non-empty diff set.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarizes `diffs`.
    async fn summarize(&self, diffs: &DiffSet) -> Result<Summary, SummaryError>;
}

/// Deterministic summary built from the diff alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalSummarizer;

impl LocalSummarizer {
    /// Builds the summary synchronously.
    pub fn summarize_now(diffs: &DiffSet) -> Summary {
        let mut added = 0;
        let mut removed = 0;
        let mut type_changes = 0;
        let mut impact = Vec::with_capacity(diffs.len());
        let mut risks = Vec::new();

        for (target, diff) in diffs {
            let mut t_added = 0;
            let mut t_type = 0;
            for change in &diff.added {
                if change.kind == ChangeKind::TypeChanged {
                    t_type += 1;
                    risks.push(format!(
                        "{}: '{}' changed type; consumers parsing it may fail",
                        target, change.detail
                    ));
                } else {
                    t_added += 1;
                }
            }
            for change in &diff.removed {
                risks.push(format!(
                    "{}: removal of '{}' breaks consumers that read it",
                    target, change.detail
                ));
            }

            added += t_added;
            type_changes += t_type;
            removed += diff.removed.len();
            impact.push(format!(
                "{}: {} added, {} removed, {} type changes",
                target,
                t_added,
                diff.removed.len(),
                t_type
            ));
        }

        let breaking = removed + type_changes;
        let summary = format!(
            "{} changes across {} targets: {} breaking, {} additive.",
            breaking + added,
            diffs.len(),
            breaking,
            added
        );

        Summary {
            summary,
            impact,
            risks,
        }
    }
}

#[async_trait]
impl Summarizer for LocalSummarizer {
    async fn summarize(&self, diffs: &DiffSet) -> Result<Summary, SummaryError> {
        Ok(Self::summarize_now(diffs))
    }
}

/// Posts `{"diffs": ...}` to an endpoint and expects a [`Summary`] back.
#[derive(Debug, Clone)]
pub struct HttpSummarizer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSummarizer {
    /// Creates a summarizer for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::Unavailable`] if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SummaryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Builds the configured summarizer: remote if an endpoint is set,
    /// local otherwise.
    pub fn from_config(config: &SummarizerConfig) -> Result<Box<dyn Summarizer>, SummaryError> {
        match &config.endpoint {
            Some(endpoint) => Ok(Box::new(Self::new(
                endpoint.clone(),
                Duration::from_millis(config.timeout_ms),
            )?)),
            None => Ok(Box::new(LocalSummarizer)),
        }
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, diffs: &DiffSet) -> Result<Summary, SummaryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "diffs": diffs }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SummaryError::Status(status.as_u16()));
        }

        let summary: Summary = response.json().await?;
        if summary.summary.trim().is_empty() {
            return Err(SummaryError::InvalidResponse("empty summary".to_string()));
        }
        debug!("Remote summary received ({} risks)", summary.risks.len());
        Ok(summary)
    }
}

/// Summarizes with `summarizer`, falling back to [`LocalSummarizer`].
pub async fn summarize_or_fallback(summarizer: &dyn Summarizer, diffs: &DiffSet) -> Summary {
    match summarizer.summarize(diffs).await {
        Ok(summary) => summary,
        Err(e) => {
            warn!("Summarizer failed, using local summary: {}", e);
            LocalSummarizer::summarize_now(diffs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftwatch_schema::{Change, SignatureDiff};

    struct Broken;

    #[async_trait]
    impl Summarizer for Broken {
        async fn summarize(&self, _diffs: &DiffSet) -> Result<Summary, SummaryError> {
            Err(SummaryError::Unavailable("connection refused".to_string()))
        }
    }

    fn sample() -> DiffSet {
        let mut diffs = DiffSet::new();
        diffs.insert(
            "users".to_string(),
            SignatureDiff {
                added: vec![Change::field_added("b"), Change::type_changed("a")],
                removed: vec![Change::field_removed("c")],
            },
        );
        diffs.insert(
            "orders".to_string(),
            SignatureDiff {
                added: vec![Change::field_added("total")],
                removed: vec![],
            },
        );
        diffs
    }

    #[test]
    fn test_local_summary_counts() {
        let summary = LocalSummarizer::summarize_now(&sample());

        assert_eq!(summary.summary, "4 changes across 2 targets: 2 breaking, 2 additive.");
        assert_eq!(
            summary.impact,
            vec![
                "orders: 1 added, 0 removed, 0 type changes".to_string(),
                "users: 1 added, 1 removed, 1 type changes".to_string(),
            ]
        );
        assert_eq!(summary.risks.len(), 2);
        assert!(summary.risks[0].contains("'a' changed type"));
        assert!(summary.risks[1].contains("removal of 'c'"));
    }

    #[test]
    fn test_local_summary_is_deterministic() {
        assert_eq!(
            LocalSummarizer::summarize_now(&sample()),
            LocalSummarizer::summarize_now(&sample())
        );
    }

    #[test]
    fn test_summary_accepts_missing_lists() {
        let summary: Summary = serde_json::from_str(r#"{"summary": "ok"}"#).unwrap();
        assert!(summary.impact.is_empty());
        assert!(summary.risks.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_on_error() {
        let summary = summarize_or_fallback(&Broken, &sample()).await;
        assert_eq!(summary, LocalSummarizer::summarize_now(&sample()));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_falls_back() {
        let remote = HttpSummarizer::new("http://127.0.0.1:9/summarize", Duration::from_millis(200)).unwrap();
        let summary = summarize_or_fallback(&remote, &sample()).await;
        assert!(summary.summary.starts_with("4 changes"));
    }

    #[test]
    fn test_from_config_without_endpoint_is_local() {
        assert!(HttpSummarizer::from_config(&SummarizerConfig::default()).is_ok());
    }
}
