//! # Driftwatch Core
//!
//! Drift orchestration for monitored REST and GraphQL APIs.
//! Wires configuration, preflight, fetching, summarization and reporting
//! around the schema engine in `driftwatch-schema`.
//!
//! ## Run Phases
//!
//! | Phase | Component | Failure handling |
//! |-------|-----------|------------------|
//! | Preflight | [`RunPermission`] | denied → [`RunOutcome::Skipped`] |
//! | Load baseline | `BaselineStore` | fatal |
//! | Fetch + extract | [`Fetcher`] | target skipped, run continues |
//! | Persist | `BaselineStore` (direct-write) | fatal |
//! | Classify + summarize | [`Summarizer`] | local fallback |
//! | Stage | `BaselineStore` (stage-for-review) | fatal |
//! | Emit | `Notifier` | logged, never fatal |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       DRIFTWATCH CORE                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │                    ┌─────────────────┐                          │
//! │                    │   Driftwatch    │  ← Orchestrator          │
//! │                    └────────┬────────┘                          │
//! │                             │                                   │
//! │     ┌──────────────┬────────┴───────┬──────────────┐            │
//! │     ▼              ▼                ▼              ▼            │
//! │ ┌──────────┐ ┌────────────┐ ┌──────────────┐ ┌──────────┐       │
//! │ │Permission│ │  Fetcher   │ │  Summarizer  │ │ Notifier │       │
//! │ └──────────┘ └────────────┘ └──────────────┘ └──────────┘       │
//! │                             │                                   │
//! │                   ┌─────────┴─────────┐                         │
//! │                   │ driftwatch-schema │  extract · diff ·       │
//! │                   │                   │  classify · store       │
//! │                   └───────────────────┘                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use driftwatch_core::{Collaborators, Driftwatch, DriftwatchConfig};
//!
//! let config = DriftwatchConfig::load("driftwatch.toml")?;
//! let collaborators = Collaborators::from_config(&config)?;
//! let driftwatch = Driftwatch::new(config, collaborators);
//!
//! match driftwatch.run().await {
//!     Ok(outcome) => std::process::exit(outcome.exit_code()),
//!     Err(e) => {
//!         driftwatch.notify_failure(&e).await;
//!         std::process::exit(2);
//!     }
//! }
//! ```

pub mod config;
mod error;
pub mod fetch;
mod orchestrator;
mod outcome;
pub mod permission;
pub mod summarize;

pub use config::{DriftwatchConfig, TargetConfig};
pub use error::{DriftError, FetchError, SummaryError};
pub use fetch::{FetchRequest, FetchResponse, Fetcher, HttpFetcher, RequestPacer};
pub use orchestrator::{Collaborators, Driftwatch};
pub use outcome::{RunOutcome, RunReport, EXIT_BLOCKED, EXIT_FAILED, EXIT_OK};
pub use permission::{ConfigPermission, Permission, RunPermission};
pub use summarize::{HttpSummarizer, LocalSummarizer, Summarizer, Summary};

/// Core result type for drift runs.
pub type Result<T> = std::result::Result<T, DriftError>;
