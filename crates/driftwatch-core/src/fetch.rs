//! Target fetching.
//!
//! The orchestrator sees only the [`Fetcher`] trait. [`HttpFetcher`] is the
//! production implementation: reqwest with a per-request timeout, bounded
//! retries and an injected [`RequestPacer`] shared by every request of the
//! process.

use crate::config::{HttpConfig, TargetConfig};
use crate::error::FetchError;
use async_trait::async_trait;
use driftwatch_schema::{detect_protocol, Protocol, INTROSPECTION_QUERY};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A fully resolved outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Target id, for logs.
    pub target: String,
    /// HTTP method.
    pub method: String,
    /// Endpoint URL.
    pub url: String,
    /// Request headers.
    pub headers: BTreeMap<String, String>,
    /// JSON body, if any.
    pub body: Option<Value>,
}

impl FetchRequest {
    /// Builds the request for a target and reports its protocol.
    ///
    /// GraphQL targets are always sent as `POST` with the introspection
    /// query as body, whatever the configured method and body.
    pub fn for_target(target: &TargetConfig) -> (Protocol, Self) {
        let protocol = detect_protocol(&target.url, target.body.as_ref());
        let (method, body) = match protocol {
            Protocol::GraphQl => ("POST".to_string(), Some(json!({ "query": INTROSPECTION_QUERY }))),
            Protocol::Rest => (target.method.clone(), target.body.clone()),
        };

        let request = Self {
            target: target.id.clone(),
            method,
            url: target.url.clone(),
            headers: target.headers.clone(),
            body,
        };
        (protocol, request)
    }
}

/// A successful (2xx, JSON) response.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Parsed JSON body.
    pub body: Value,
}

/// Performs one request.
///
/// Implementations return an error for transport failures, non-success
/// statuses and non-JSON bodies alike; the caller treats them the same.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches a request.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// Enforces a minimum interval between outbound requests.
///
/// One pacer is created by the composition root and shared by reference.
#[derive(Debug)]
pub struct RequestPacer {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RequestPacer {
    /// Creates a pacer. A zero interval never waits.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// Configured interval.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until the next request may be sent and claims the slot.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// reqwest-backed [`Fetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    pacer: Arc<RequestPacer>,
    retries: u32,
    backoff: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher from the `[http]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidRequest`] if the HTTP client cannot be
    /// built (for example an invalid user agent).
    pub fn new(config: &HttpConfig, pacer: Arc<RequestPacer>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            client,
            pacer,
            retries: config.retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    async fn attempt(&self, method: &reqwest::Method, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        self.pacer.wait().await;

        let mut builder = self.client.request(method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        let body = serde_json::from_slice(&bytes).map_err(|e| FetchError::InvalidBody(e.to_string()))?;
        Ok(FetchResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Whether a failed attempt is worth repeating.
fn is_retryable(error: &FetchError) -> bool {
    match error {
        FetchError::Transport(_) => true,
        FetchError::Status(status) => *status >= 500,
        FetchError::InvalidBody(_) | FetchError::InvalidRequest(_) => false,
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| FetchError::InvalidRequest(format!("invalid method '{}'", request.method)))?;

        let mut attempt = 0;
        loop {
            match self.attempt(&method, request).await {
                Ok(response) => {
                    debug!("Fetched {} ({})", request.target, response.status);
                    return Ok(response);
                }
                Err(e) if attempt < self.retries && is_retryable(&e) => {
                    attempt += 1;
                    warn!(
                        "Fetch of {} failed ({}), retry {}/{}",
                        request.target, e, attempt, self.retries
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_request_keeps_method_and_body() {
        let mut target = TargetConfig::get("users", "https://api.example.com/users");
        target.method = "PUT".to_string();
        target.body = Some(json!({"name": "x"}));
        target.headers.insert("Accept".to_string(), "application/json".to_string());

        let (protocol, request) = FetchRequest::for_target(&target);
        assert_eq!(protocol, Protocol::Rest);
        assert_eq!(request.method, "PUT");
        assert_eq!(request.body, Some(json!({"name": "x"})));
        assert_eq!(request.headers["Accept"], "application/json");
    }

    #[test]
    fn test_graphql_request_is_introspection() {
        let target = TargetConfig::get("gql", "https://api.example.com/graphql");
        let (protocol, request) = FetchRequest::for_target(&target);

        assert_eq!(protocol, Protocol::GraphQl);
        assert_eq!(request.method, "POST");
        assert_eq!(request.body, Some(json!({ "query": INTROSPECTION_QUERY })));
    }

    #[test]
    fn test_retry_policy() {
        assert!(is_retryable(&FetchError::Transport("reset".into())));
        assert!(is_retryable(&FetchError::Status(503)));
        assert!(!is_retryable(&FetchError::Status(404)));
        assert!(!is_retryable(&FetchError::InvalidBody("<html>".into())));
    }

    #[tokio::test]
    async fn test_pacer_spaces_requests() {
        let pacer = RequestPacer::new(Duration::from_millis(50));
        let start = Instant::now();

        pacer.wait().await;
        pacer.wait().await;
        pacer.wait().await;

        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_zero_interval_pacer_does_not_wait() {
        let pacer = RequestPacer::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..10 {
            pacer.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_unreachable_target_is_transport_error() {
        let config = HttpConfig {
            timeout_ms: 500,
            retries: 0,
            ..HttpConfig::default()
        };
        let fetcher = HttpFetcher::new(&config, Arc::new(RequestPacer::new(Duration::ZERO))).unwrap();
        let (_, request) = FetchRequest::for_target(&TargetConfig::get("down", "http://127.0.0.1:9/users"));

        let err = fetcher.fetch(&request).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}
