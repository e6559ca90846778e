//! Run preflight: kill switch and execution window.
//!
//! A run starts only if a [`RunPermission`] allows it. A denied run is not a
//! failure; the orchestrator reports it as skipped and never fetches.
//!
//! ## Window Format
//!
//! `HH:MM-HH:MM` in UTC, start inclusive, end exclusive. A window whose end
//! is before its start wraps past midnight (`22:00-02:00`). Equal bounds
//! cover the whole day. An optional weekday list (`mon`..`sun`) restricts
//! the days the window opens on.
//!
//! A window that cannot be parsed denies every run.

use crate::config::PermissionConfig;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use tracing::{debug, warn};

/// Environment variable that acts as an external kill switch.
pub const KILL_SWITCH_ENV: &str = "DRIFTWATCH_KILL_SWITCH";

/// Result of a preflight check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    /// Whether the run may proceed.
    pub allowed: bool,
    /// Why the run was denied.
    pub reason: Option<String>,
}

impl Permission {
    /// Allows the run.
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    /// Denies the run.
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Decides whether a run may start.
#[async_trait]
pub trait RunPermission: Send + Sync {
    /// Checks the preflight conditions.
    async fn can_run(&self) -> Permission;
}

/// A parsed UTC execution window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionWindow {
    start: u32,
    end: u32,
    days: Vec<Weekday>,
}

impl ExecutionWindow {
    /// Parses `HH:MM-HH:MM` and weekday names.
    ///
    /// # Errors
    ///
    /// Returns a description of the first malformed part.
    ///
    /// # Example
    ///
    /// ```rust
    /// use driftwatch_core::permission::ExecutionWindow;
    ///
    /// assert!(ExecutionWindow::parse("06:00-22:00", &[]).is_ok());
    /// assert!(ExecutionWindow::parse("22:00-02:00", &["sat".to_string()]).is_ok());
    /// assert!(ExecutionWindow::parse("6-22", &[]).is_err());
    /// ```
    pub fn parse(window: &str, days: &[String]) -> std::result::Result<Self, String> {
        let (start, end) = window
            .split_once('-')
            .ok_or_else(|| format!("execution window '{}' is not HH:MM-HH:MM", window))?;

        let days = days
            .iter()
            .map(|d| {
                d.trim()
                    .parse::<Weekday>()
                    .map_err(|_| format!("unknown weekday '{}'", d))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            start: parse_minute_of_day(start)?,
            end: parse_minute_of_day(end)?,
            days,
        })
    }

    /// Returns true if `at` falls inside the window.
    ///
    /// The weekday list is matched against the day the window opened, so the
    /// after-midnight part of a wrapping window belongs to the previous day.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let minute = at.hour() * 60 + at.minute();
        let (inside, opened_yesterday) = if self.start == self.end {
            (true, false)
        } else if self.start < self.end {
            (minute >= self.start && minute < self.end, false)
        } else if minute >= self.start {
            (true, false)
        } else {
            (minute < self.end, true)
        };
        if !inside {
            return false;
        }

        let opened_on = if opened_yesterday {
            at.weekday().pred()
        } else {
            at.weekday()
        };
        self.days.is_empty() || self.days.contains(&opened_on)
    }
}

fn parse_minute_of_day(raw: &str) -> std::result::Result<u32, String> {
    let invalid = || format!("invalid time '{}'", raw.trim());
    let (h, m) = raw.trim().split_once(':').ok_or_else(invalid)?;
    if h.len() != 2 || m.len() != 2 {
        return Err(invalid());
    }
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok(hour * 60 + minute)
}

/// Preflight driven by the `[permission]` config section and the
/// `DRIFTWATCH_KILL_SWITCH` environment variable.
#[derive(Debug, Clone)]
pub struct ConfigPermission {
    config: PermissionConfig,
}

impl ConfigPermission {
    /// Creates a preflight from configuration.
    pub fn new(config: PermissionConfig) -> Self {
        Self { config }
    }

    /// Evaluates the preflight at a given instant.
    pub fn check_at(&self, now: DateTime<Utc>, env_kill_switch: bool) -> Permission {
        if self.config.kill_switch {
            return Permission::deny("kill switch enabled in configuration");
        }
        if env_kill_switch {
            return Permission::deny(format!("kill switch enabled via {}", KILL_SWITCH_ENV));
        }

        let Some(window) = &self.config.window else {
            return Permission::allow();
        };

        match ExecutionWindow::parse(window, &self.config.days) {
            Ok(parsed) if parsed.contains(now) => Permission::allow(),
            Ok(_) => Permission::deny(format!(
                "outside execution window {} (now {})",
                window,
                now.format("%a %H:%M UTC")
            )),
            Err(e) => {
                warn!("Denying run, execution window is unusable: {}", e);
                Permission::deny(e)
            }
        }
    }
}

#[async_trait]
impl RunPermission for ConfigPermission {
    async fn can_run(&self) -> Permission {
        let env_kill_switch = std::env::var(KILL_SWITCH_ENV)
            .map(|v| matches!(v.trim(), "1" | "true"))
            .unwrap_or(false);
        let permission = self.check_at(Utc::now(), env_kill_switch);
        debug!("Preflight: {:?}", permission);
        permission
    }
}
