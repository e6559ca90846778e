//! # Report Sinks
//!
//! A [`Report`] is a title, a text body and a list of name/value facts. Sinks
//! deliver it somewhere: the console always, a chat webhook when configured.
//!
//! Sinks are fire-and-forget from the caller's point of view. An error from
//! one sink is returned to the [`Notifier`](crate::Notifier), logged there,
//! and never stops the remaining sinks.

use crate::error::{NotifyError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::debug;

/// How urgent a report is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLevel {
    /// Stable run, nothing changed.
    Info,
    /// Additive drift or a skipped run.
    Warning,
    /// Breaking drift or a failed run.
    Alert,
}

impl ReportLevel {
    fn theme_color(&self) -> &'static str {
        match self {
            Self::Info => "2EB886",
            Self::Warning => "DAA038",
            Self::Alert => "A30200",
        }
    }

    fn marker(&self) -> &'static str {
        match self {
            Self::Info => "OK",
            Self::Warning => "WARN",
            Self::Alert => "ALERT",
        }
    }
}

/// A single name/value line of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    /// Label, e.g. `Severity`.
    pub name: String,
    /// Value, e.g. `major`.
    pub value: String,
}

impl Fact {
    /// Creates a fact from anything printable.
    pub fn new(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }
}

/// A message delivered to every sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Urgency of the report.
    pub level: ReportLevel,
    /// One-line headline.
    pub title: String,
    /// Free-form body, one reason per line for drift reports.
    pub body: String,
    /// Structured name/value pairs.
    pub facts: Vec<Fact>,
}

impl Report {
    /// Creates a report without facts.
    pub fn new(level: ReportLevel, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            body: body.into(),
            facts: Vec::new(),
        }
    }

    /// Appends a fact.
    #[must_use]
    pub fn with_fact(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.facts.push(Fact::new(name, value));
        self
    }

    /// Plain-text rendering used by the console sink.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "[{}] {}", self.level.marker(), self.title);
        for fact in &self.facts {
            let _ = writeln!(out, "  {}: {}", fact.name, fact.value);
        }
        if !self.body.is_empty() {
            let _ = writeln!(out);
            for line in self.body.lines() {
                let _ = writeln!(out, "  {}", line);
            }
        }
        out
    }
}

/// A destination for reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Optional sinks may be suppressed by the alert cache; the console is not.
    fn is_optional(&self) -> bool {
        true
    }

    /// Delivers one report.
    async fn report(&self, report: &Report) -> Result<()>;
}

/// Writes reports to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

#[async_trait]
impl ReportSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn is_optional(&self) -> bool {
        false
    }

    async fn report(&self, report: &Report) -> Result<()> {
        print!("{}", report.render_text());
        Ok(())
    }
}

/// Posts reports to a chat incoming-webhook as a message card.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    /// Creates a webhook sink with a request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Http`] when the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Message-card payload for a report.
    pub fn payload(report: &Report) -> serde_json::Value {
        let facts: Vec<serde_json::Value> = report
            .facts
            .iter()
            .map(|f| json!({"name": f.name, "value": f.value}))
            .collect();

        json!({
            "@type": "MessageCard",
            "@context": "https://schema.org/extensions",
            "summary": report.title,
            "themeColor": report.level.theme_color(),
            "title": report.title,
            "text": report.body.replace('\n', "<br>"),
            "sections": [{"facts": facts}],
        })
    }
}

#[async_trait]
impl ReportSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn report(&self, report: &Report) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&Self::payload(report))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                sink: self.name().to_string(),
                status: status.as_u16(),
            });
        }
        debug!("Webhook accepted report '{}'", report.title);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drift_report() -> Report {
        Report::new(
            ReportLevel::Alert,
            "API drift detected: major",
            "[MAJOR] users: field 'c' removed (breaking)\n[MINOR] users: field 'b' added (additive)",
        )
        .with_fact("Severity", "major")
        .with_fact("Targets", 3)
    }

    #[test]
    fn test_render_text() {
        let text = drift_report().render_text();
        assert!(text.starts_with("[ALERT] API drift detected: major\n"));
        assert!(text.contains("  Severity: major\n"));
        assert!(text.contains("  Targets: 3\n"));
        assert!(text.contains("  [MAJOR] users: field 'c' removed (breaking)\n"));
    }

    #[test]
    fn test_render_text_without_body() {
        let text = Report::new(ReportLevel::Info, "All stable", "").render_text();
        assert_eq!(text, "[OK] All stable\n");
    }

    #[test]
    fn test_webhook_payload_shape() {
        let payload = WebhookSink::payload(&drift_report());
        assert_eq!(payload["@type"], "MessageCard");
        assert_eq!(payload["title"], "API drift detected: major");
        assert_eq!(payload["themeColor"], "A30200");
        assert_eq!(payload["sections"][0]["facts"][1]["value"], "3");
        assert!(payload["text"].as_str().unwrap().contains("<br>"));
    }

    #[tokio::test]
    async fn test_console_sink_is_mandatory() {
        let sink = ConsoleSink;
        assert!(!sink.is_optional());
        assert!(sink.report(&drift_report()).await.is_ok());
    }

    #[tokio::test]
    async fn test_webhook_unreachable_is_error() {
        let sink = WebhookSink::new("http://127.0.0.1:9/hook", Duration::from_millis(200)).unwrap();
        assert!(sink.is_optional());
        assert!(sink.report(&drift_report()).await.is_err());
    }
}
