//! # Driftwatch Notify
//!
//! Report delivery for drift runs: the sinks a report is sent to and the
//! cache that keeps a recurring alert from being re-sent every run.
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`Report`] | Title, body and name/value facts of one message |
//! | [`ReportSink`] | Destination trait; [`ConsoleSink`] and [`WebhookSink`] |
//! | [`Notifier`] | Fans a report out to all sinks, isolating failures |
//! | [`AlertCache`] | Sled-backed TTL store of delivered alert keys |
//!
//! ## Quick Start
//!
//! ```rust
//! use driftwatch_notify::{ConsoleSink, Notifier, Report, ReportLevel};
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let notifier = Notifier::new().with_sink(Box::new(ConsoleSink));
//! let report = Report::new(ReportLevel::Info, "All targets stable", "")
//!     .with_fact("Targets", 4);
//! let summary = notifier.dispatch(&report, None).await;
//! assert_eq!(summary.delivered, 1);
//! # });
//! # }
//! ```
//!
//! ## Notes
//!
//! - Delivery is best-effort; nothing here can fail a drift run.
//! - The console sink is mandatory and ignores deduplication.

mod dedup;
mod error;
mod notifier;
mod sink;

pub use dedup::AlertCache;
pub use error::{NotifyError, Result};
pub use notifier::{DispatchSummary, Notifier};
pub use sink::{ConsoleSink, Fact, Report, ReportLevel, ReportSink, WebhookSink};
