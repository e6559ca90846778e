//! The drift orchestrator.
//!
//! [`Driftwatch`] drives one run through its phases:
//!
//! ```text
//! Preflight ─denied─▶ Skipped
//!     │
//! LoadBaseline ─▶ Fetch (per target, failures isolated) ─▶ Diff
//!     │
//! Persist (direct-write only) ─▶ Classify / Summarize / Stage ─▶ Emit ─▶ Completed
//! ```
//!
//! Loading, writing or staging the baseline is the only fatal failure after
//! preflight. Everything else degrades: a target that cannot be fetched is
//! skipped, a summarizer that fails is replaced by the local one, a sink
//! that fails is logged.

use crate::config::{DriftwatchConfig, TargetConfig};
use crate::error::{DriftError, FetchError};
use crate::fetch::{FetchRequest, Fetcher, HttpFetcher, RequestPacer};
use crate::outcome::{RunOutcome, RunReport};
use crate::permission::{ConfigPermission, RunPermission};
use crate::summarize::{summarize_or_fallback, HttpSummarizer, Summarizer};
use crate::Result;
use driftwatch_notify::{AlertCache, ConsoleSink, Notifier, Report, ReportLevel, WebhookSink};
use driftwatch_schema::canonicalize::{diff_fingerprint, to_hex};
use driftwatch_schema::{
    classify, diff_baseline, extract, BaselineDiff, BaselineStore, DiffSet, Signature, UpdateStrategy,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// The collaborators a run talks to.
///
/// Built once by the composition root; tests substitute fakes.
pub struct Collaborators {
    /// Fetches target responses.
    pub fetcher: Box<dyn Fetcher>,
    /// Preflight check.
    pub permission: Box<dyn RunPermission>,
    /// Prose summaries of drift.
    pub summarizer: Box<dyn Summarizer>,
    /// Report delivery.
    pub notifier: Notifier,
}

impl Collaborators {
    /// Builds the production collaborators from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client or the alert cache cannot be
    /// created.
    pub fn from_config(config: &DriftwatchConfig) -> Result<Self> {
        let pacer = Arc::new(RequestPacer::new(Duration::from_millis(config.http.min_interval_ms)));
        let fetcher = HttpFetcher::new(&config.http, pacer)?;
        let summarizer = HttpSummarizer::from_config(&config.summarizer)
            .map_err(|e| DriftError::Config(format!("summarizer: {}", e)))?;

        let mut notifier = Notifier::new().with_sink(Box::new(ConsoleSink));
        if let Some(url) = &config.notify.webhook_url {
            let timeout = Duration::from_millis(config.notify.timeout_ms);
            notifier = notifier.with_sink(Box::new(WebhookSink::new(url.clone(), timeout)?));
        }
        if let Some(path) = &config.notify.dedup_path {
            let ttl = Duration::from_secs(config.notify.dedup_ttl_secs);
            notifier = notifier.with_cache(AlertCache::open(path, ttl)?);
        }

        Ok(Self {
            fetcher: Box::new(fetcher),
            permission: Box::new(ConfigPermission::new(config.permission.clone())),
            summarizer,
            notifier,
        })
    }
}

/// Runs drift detection over the configured targets.
///
/// # Example
///
/// ```rust,ignore
/// let config = DriftwatchConfig::load("driftwatch.toml")?;
/// let collaborators = Collaborators::from_config(&config)?;
/// let driftwatch = Driftwatch::new(config, collaborators);
///
/// let outcome = driftwatch.run().await?;
/// std::process::exit(outcome.exit_code());
/// ```
pub struct Driftwatch {
    config: DriftwatchConfig,
    store: BaselineStore,
    fetcher: Box<dyn Fetcher>,
    permission: Box<dyn RunPermission>,
    summarizer: Box<dyn Summarizer>,
    notifier: Notifier,
}

impl Driftwatch {
    /// Creates an orchestrator. Nothing is touched until [`run`](Self::run).
    pub fn new(config: DriftwatchConfig, collaborators: Collaborators) -> Self {
        let store = BaselineStore::new(config.baseline.clone());
        info!(
            "Driftwatch initialized with {} targets ({:?})",
            config.targets.len(),
            store.strategy()
        );

        Self {
            config,
            store,
            fetcher: collaborators.fetcher,
            permission: collaborators.permission,
            summarizer: collaborators.summarizer,
            notifier: collaborators.notifier,
        }
    }

    /// The loaded configuration.
    pub fn config(&self) -> &DriftwatchConfig {
        &self.config
    }

    /// The baseline store.
    pub fn store(&self) -> &BaselineStore {
        &self.store
    }

    /// Executes one run.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::Baseline`] if the baseline cannot be loaded,
    /// written or staged. Per-target failures are not errors.
    pub async fn run(&self) -> Result<RunOutcome> {
        // Preflight
        let permission = self.permission.can_run().await;
        if !permission.allowed {
            let reason = permission
                .reason
                .unwrap_or_else(|| "run not permitted".to_string());
            info!("Run skipped: {}", reason);
            let report = Report::new(ReportLevel::Warning, "Drift run skipped", reason.clone());
            self.notifier.dispatch_local(&report).await;
            return Ok(RunOutcome::Skipped { reason });
        }

        // LoadBaseline
        let baseline = self.store.load()?;

        // Fetch
        let mut observed: BTreeMap<String, Signature> = BTreeMap::new();
        let mut failed = Vec::new();
        for target in &self.config.targets {
            match self.observe(target).await {
                Ok(signature) => {
                    observed.insert(target.id.clone(), signature);
                }
                Err(e) => {
                    warn!("Skipping target {}: {}", target.id, e);
                    failed.push(target.id.clone());
                }
            }
        }
        info!(
            "Observed {}/{} targets",
            observed.len(),
            self.config.targets.len()
        );

        // Diff
        let BaselineDiff { diffs, new_targets } = diff_baseline(&baseline, &observed);
        let candidate = baseline.merge_observed(&observed);

        // Persist
        let strategy = self.store.strategy();
        if strategy == UpdateStrategy::DirectWrite {
            self.store.write_snapshot(&candidate)?;
        }

        let mut report = RunReport {
            total_targets: self.config.targets.len(),
            fetched: observed.keys().cloned().collect(),
            failed,
            new_targets,
            ..RunReport::default()
        };

        // Classify / Stage
        if diffs.is_empty() {
            info!("No drift detected");
            if strategy == UpdateStrategy::StageForReview && !report.new_targets.is_empty() {
                // First observation of a target: stage it, never gate on it.
                let seed = classify(&DiffSet::new());
                let outcome = self.store.update(&candidate, &seed, &report.new_targets, None)?;
                report.staged_path = outcome.staged_path;
            }
        } else {
            let classification = classify(&diffs);
            info!(
                "Drift detected in {} targets, severity {}",
                diffs.len(),
                classification.severity
            );
            for reason in &classification.reasons {
                debug!("{}", reason);
            }

            let summary = summarize_or_fallback(self.summarizer.as_ref(), &diffs).await;
            let affected: Vec<String> = diffs.keys().cloned().collect();
            let outcome = self.store.update(
                &candidate,
                &classification,
                &affected,
                self.config.gate.block_on,
            )?;

            report.should_block = outcome.should_block;
            report.staged_path = outcome.staged_path;
            report.classification = Some(classification);
            report.summary = Some(summary);
            report.diffs = diffs;
        }

        // Emit
        let dedup_key = if report.diffs.is_empty() {
            None
        } else {
            match diff_fingerprint(&report.diffs) {
                Ok(fingerprint) => Some(to_hex(&fingerprint)),
                Err(e) => {
                    warn!("Cannot fingerprint diffs, delivering without dedup: {}", e);
                    None
                }
            }
        };
        let dispatch = self
            .notifier
            .dispatch(&report.to_report(), dedup_key.as_deref())
            .await;
        debug!("Report dispatch: {:?}", dispatch);

        Ok(RunOutcome::Completed(report))
    }

    /// Sends a best-effort failure report.
    pub async fn notify_failure(&self, err: &DriftError) {
        error!("Drift run failed: {}", err);
        let report = Report::new(ReportLevel::Alert, "Drift run failed", err.to_string());
        self.notifier.dispatch(&report, None).await;
    }

    async fn observe(&self, target: &TargetConfig) -> std::result::Result<Signature, ObserveError> {
        let (protocol, request) = FetchRequest::for_target(target);
        debug!("Fetching {} as {:?}", target.id, protocol);

        let response = self.fetcher.fetch(&request).await?;
        let signature = extract(&response.body, protocol)?;
        Ok(signature)
    }
}

/// Why one target produced no signature this run.
#[derive(Debug, thiserror::Error)]
enum ObserveError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Extract(#[from] driftwatch_schema::SchemaError),
}
