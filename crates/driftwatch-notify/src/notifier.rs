//! # Notifier
//!
//! Fans a report out to every configured sink. Sinks are independent: a
//! failure in one is logged and the rest still run. When an alert cache is
//! attached, a report carrying a dedup key already delivered within the TTL
//! is only printed to mandatory sinks. Routine notices sent through
//! [`Notifier::dispatch_local`] never leave the mandatory sinks.

use crate::dedup::AlertCache;
use crate::sink::{Report, ReportSink};
use tracing::{debug, warn};

/// Counts from one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Sinks that accepted the report.
    pub delivered: usize,
    /// Sinks that returned an error.
    pub failed: usize,
    /// Optional sinks skipped as duplicates or for a local-only report.
    pub suppressed: usize,
}

/// Owns the sinks and the optional alert cache for a process.
pub struct Notifier {
    sinks: Vec<Box<dyn ReportSink>>,
    cache: Option<AlertCache>,
}

impl Notifier {
    /// Creates a notifier without sinks.
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            cache: None,
        }
    }

    /// Adds a sink. Sinks run in insertion order.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Attaches an alert cache for deduplication.
    #[must_use]
    pub fn with_cache(mut self, cache: AlertCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Names of the configured sinks.
    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Delivers `report` to every sink.
    ///
    /// Never fails: sink and cache errors are logged and counted.
    pub async fn dispatch(&self, report: &Report, dedup_key: Option<&str>) -> DispatchSummary {
        let duplicate = match (dedup_key, &self.cache) {
            (Some(key), Some(cache)) => match cache.check_and_record(key) {
                Ok(seen) => seen,
                Err(e) => {
                    warn!("Alert cache unavailable, delivering anyway: {}", e);
                    false
                }
            },
            _ => false,
        };

        self.deliver(report, duplicate).await
    }

    /// Delivers `report` to mandatory sinks only.
    ///
    /// For routine notices that should reach the operator's console but
    /// never a chat channel. Optional sinks are counted as suppressed.
    pub async fn dispatch_local(&self, report: &Report) -> DispatchSummary {
        self.deliver(report, true).await
    }

    async fn deliver(&self, report: &Report, skip_optional: bool) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        for sink in &self.sinks {
            if skip_optional && sink.is_optional() {
                debug!("Skipped optional sink {}", sink.name());
                summary.suppressed += 1;
                continue;
            }
            match sink.report(report).await {
                Ok(()) => summary.delivered += 1,
                Err(e) => {
                    warn!("Sink {} failed: {}", sink.name(), e);
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("sinks", &self.sink_names())
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NotifyError, Result};
    use crate::sink::ReportLevel;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct CountingSink {
        name: &'static str,
        optional: bool,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ReportSink for CountingSink {
        fn name(&self) -> &str {
            self.name
        }

        fn is_optional(&self) -> bool {
            self.optional
        }

        async fn report(&self, _report: &Report) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(NotifyError::Status {
                    sink: self.name.to_string(),
                    status: 500,
                });
            }
            Ok(())
        }
    }

    fn sink(name: &'static str, optional: bool, fail: bool) -> (Box<dyn ReportSink>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = CountingSink {
            name,
            optional,
            fail,
            calls: Arc::clone(&calls),
        };
        (Box::new(sink), calls)
    }

    fn report() -> Report {
        Report::new(ReportLevel::Alert, "drift", "[MAJOR] a: field 'x' removed (breaking)")
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_stop_others() {
        let (broken, broken_calls) = sink("broken", true, true);
        let (good, good_calls) = sink("good", true, false);
        let notifier = Notifier::new().with_sink(broken).with_sink(good);

        let summary = notifier.dispatch(&report(), None).await;
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(broken_calls.load(Ordering::SeqCst), 1);
        assert_eq!(good_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicate_suppresses_optional_sinks_only() {
        let (console, console_calls) = sink("console", false, false);
        let (chat, chat_calls) = sink("chat", true, false);
        let notifier = Notifier::new()
            .with_sink(console)
            .with_sink(chat)
            .with_cache(AlertCache::temporary(Duration::from_secs(3600)).unwrap());

        let first = notifier.dispatch(&report(), Some("fp-1")).await;
        let second = notifier.dispatch(&report(), Some("fp-1")).await;

        assert_eq!(first.delivered, 2);
        assert_eq!(second.delivered, 1);
        assert_eq!(second.suppressed, 1);
        assert_eq!(console_calls.load(Ordering::SeqCst), 2);
        assert_eq!(chat_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_local_dispatch_skips_optional_sinks() {
        let (console, console_calls) = sink("console", false, false);
        let (chat, chat_calls) = sink("chat", true, false);
        let notifier = Notifier::new().with_sink(console).with_sink(chat);

        let notice = Report::new(ReportLevel::Warning, "Drift run skipped", "outside window");
        notifier.dispatch_local(&notice).await;
        let summary = notifier.dispatch_local(&notice).await;

        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.suppressed, 1);
        assert_eq!(console_calls.load(Ordering::SeqCst), 2);
        assert_eq!(chat_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_key_never_suppresses() {
        let (chat, chat_calls) = sink("chat", true, false);
        let notifier = Notifier::new()
            .with_sink(chat)
            .with_cache(AlertCache::temporary(Duration::from_secs(3600)).unwrap());

        notifier.dispatch(&report(), None).await;
        notifier.dispatch(&report(), None).await;
        assert_eq!(chat_calls.load(Ordering::SeqCst), 2);
    }
}
