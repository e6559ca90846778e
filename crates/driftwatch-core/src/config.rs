//! Configuration types for Driftwatch.
//!
//! The configuration is a single TOML document. Every section except
//! `[[targets]]` may be omitted and falls back to its defaults.

use crate::error::DriftError;
use crate::permission::ExecutionWindow;
use crate::Result;
use driftwatch_schema::{Severity, StoreConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "driftwatch.toml";

/// Environment variable overriding `notify.webhook_url`.
pub const WEBHOOK_URL_ENV: &str = "DRIFTWATCH_WEBHOOK_URL";

/// Top-level Driftwatch configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftwatchConfig {
    /// Baseline document location and update strategy.
    pub baseline: StoreConfig,

    /// CI gate policy.
    pub gate: GateConfig,

    /// Outbound HTTP behavior of the fetcher.
    pub http: HttpConfig,

    /// Kill switch and execution window.
    pub permission: PermissionConfig,

    /// Optional remote summarizer.
    pub summarizer: SummarizerConfig,

    /// Report sinks and alert dedup.
    pub notify: NotifyConfig,

    /// Monitored endpoints.
    pub targets: Vec<TargetConfig>,
}

impl DriftwatchConfig {
    /// Loads, overrides from the environment and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::Config`] if the file cannot be read or parsed,
    /// or if [`validate`](Self::validate) rejects it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DriftError::Config(format!("cannot read {}: {}", path.display(), e)))?;

        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;

        debug!(
            "Loaded configuration from {} with {} targets",
            path.display(),
            config.targets.len()
        );
        Ok(config)
    }

    /// Parses a TOML document without validating it.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| DriftError::Config(e.to_string()))
    }

    /// Applies environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(WEBHOOK_URL_ENV) {
            if !url.trim().is_empty() {
                self.notify.webhook_url = Some(url);
            }
        }
    }

    /// Checks the invariants a run relies on.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::Config`] when there are no targets, a target id
    /// is empty or repeated, a URL is empty, a method is not a valid HTTP
    /// method, or the execution window cannot be parsed.
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(DriftError::Config("no targets configured".to_string()));
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            if target.id.trim().is_empty() {
                return Err(DriftError::Config("target with empty id".to_string()));
            }
            if !seen.insert(target.id.as_str()) {
                return Err(DriftError::Config(format!("duplicate target id '{}'", target.id)));
            }
            if target.url.trim().is_empty() {
                return Err(DriftError::Config(format!("target '{}' has an empty url", target.id)));
            }
            if reqwest::Method::from_bytes(target.method.as_bytes()).is_err() {
                return Err(DriftError::Config(format!(
                    "target '{}' has invalid method '{}'",
                    target.id, target.method
                )));
            }
        }

        if let Some(window) = &self.permission.window {
            ExecutionWindow::parse(window, &self.permission.days).map_err(DriftError::Config)?;
        }

        Ok(())
    }
}

/// One monitored endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Unique identifier, also the baseline key.
    pub id: String,

    /// HTTP method. GraphQL targets are always introspected with `POST`.
    #[serde(default = "default_method")]
    pub method: String,

    /// Endpoint URL.
    pub url: String,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Optional JSON request body.
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

impl TargetConfig {
    /// A `GET` target without headers or body.
    pub fn get(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method: default_method(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }
}

fn default_method() -> String {
    "GET".to_string()
}

/// CI gate policy. Major drift always blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Additional severity that blocks, typically `minor`.
    pub block_on: Option<Severity>,
}

/// Fetcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout.
    pub timeout_ms: u64,

    /// Retries after the first attempt, on transport errors and 5xx only.
    pub retries: u32,

    /// Backoff unit; attempt `n` waits `n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,

    /// Minimum spacing between outbound requests.
    pub min_interval_ms: u64,

    /// `User-Agent` header.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            retries: 2,
            retry_backoff_ms: 500,
            min_interval_ms: 250,
            user_agent: concat!("driftwatch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Preflight settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionConfig {
    /// Refuse every run.
    pub kill_switch: bool,

    /// UTC window `HH:MM-HH:MM`; may wrap past midnight.
    pub window: Option<String>,

    /// Weekdays the window applies to (`mon`..`sun`). Empty means every day.
    pub days: Vec<String>,
}

/// Remote summarizer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// Endpoint receiving `POST {"diffs": ...}`. Absent means local only.
    pub endpoint: Option<String>,

    /// Request timeout.
    pub timeout_ms: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 15_000,
        }
    }
}

/// Report delivery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Chat incoming-webhook URL.
    pub webhook_url: Option<String>,

    /// Alert dedup database. Absent disables dedup.
    pub dedup_path: Option<PathBuf>,

    /// How long an identical drift alert stays suppressed.
    pub dedup_ttl_secs: u64,

    /// Webhook request timeout.
    pub timeout_ms: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            dedup_path: None,
            dedup_ttl_secs: 86_400,
            timeout_ms: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftwatch_schema::UpdateStrategy;

    const SAMPLE: &str = r#"
[baseline]
path = "state/baseline.json"
strategy = "direct-write"

[gate]
block_on = "minor"

[http]
retries = 0

[permission]
window = "22:00-02:00"
days = ["mon", "fri"]

[[targets]]
id = "users"
url = "https://api.example.com/users/1"
headers = { Accept = "application/json" }

[[targets]]
id = "gql"
url = "https://api.example.com/graphql"
method = "POST"
body = { query = "{ me { id } }" }
"#;

    #[test]
    fn test_default_config() {
        let config = DriftwatchConfig::default();
        assert_eq!(config.baseline.strategy, UpdateStrategy::StageForReview);
        assert_eq!(config.http.timeout_ms, 10_000);
        assert_eq!(config.notify.dedup_ttl_secs, 86_400);
        assert!(config.gate.block_on.is_none());
        assert!(config.targets.is_empty());
    }

    #[test]
    fn test_parse_sample() {
        let config = DriftwatchConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.baseline.path, PathBuf::from("state/baseline.json"));
        assert_eq!(config.baseline.staging_dir, PathBuf::from(".driftwatch/staged"));
        assert_eq!(config.baseline.strategy, UpdateStrategy::DirectWrite);
        assert_eq!(config.gate.block_on, Some(Severity::Minor));
        assert_eq!(config.http.retries, 0);
        assert_eq!(config.http.min_interval_ms, 250);

        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[0].method, "GET");
        assert_eq!(config.targets[0].headers["Accept"], "application/json");
        assert_eq!(
            config.targets[1].body,
            Some(serde_json::json!({"query": "{ me { id } }"}))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let mut config = DriftwatchConfig::default();
        config.targets.push(TargetConfig::get("users", "https://a"));
        config.targets.push(TargetConfig::get("users", "https://b"));

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate target id 'users'"));
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let mut config = DriftwatchConfig::default();
        assert!(config.validate().is_err());

        config.targets.push(TargetConfig::get(" ", "https://a"));
        assert!(config.validate().is_err());

        config.targets[0].id = "users".to_string();
        config.targets[0].url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_method() {
        let mut config = DriftwatchConfig::default();
        let mut target = TargetConfig::get("users", "https://a");
        target.method = "GE T".to_string();
        config.targets.push(target);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_window() {
        let mut config = DriftwatchConfig::default();
        config.targets.push(TargetConfig::get("users", "https://a"));
        config.permission.window = Some("25:00-26:00".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = DriftwatchConfig::load("/nonexistent/driftwatch.toml").unwrap_err();
        assert!(matches!(err, DriftError::Config(_)));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, SAMPLE).unwrap();

        let config = DriftwatchConfig::load(&path).unwrap();
        assert_eq!(config.targets.len(), 2);
    }
}
