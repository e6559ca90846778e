//! # Alert Dedup Cache
//!
//! A key-value store with TTL semantics that remembers which alerts were
//! recently delivered. Scheduled runs against an API that drifted once would
//! otherwise re-send the same alert every run until the baseline is accepted.
//!
//! ## Storage Structure
//!
//! | Tree | Key | Value |
//! |------|-----|-------|
//! | `alerts` | dedup key (diff fingerprint) | 8-byte big-endian unix seconds of last delivery |
//!
//! An entry is fresh while `now - sent_at < ttl`. Expired entries are
//! overwritten on the next delivery and can be purged explicitly.
//!
//! ## References
//!
//! - Sled documentation: <https://sled.rs/>

use crate::error::{NotifyError, Result};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Tree name for alert timestamps.
const ALERT_TREE: &str = "alerts";

/// Sled-backed TTL cache of delivered alerts.
///
/// # Example
///
/// ```rust
/// use driftwatch_notify::AlertCache;
/// use std::time::Duration;
///
/// let cache = AlertCache::temporary(Duration::from_secs(3600)).unwrap();
/// assert!(!cache.check_and_record("abc123").unwrap()); // first delivery
/// assert!(cache.check_and_record("abc123").unwrap()); // duplicate within TTL
/// ```
#[derive(Clone)]
pub struct AlertCache {
    db: sled::Db,
    alerts: sled::Tree,
    ttl: Duration,
}

impl AlertCache {
    /// Opens or creates a cache database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Cache`] if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, ttl: Duration) -> Result<Self> {
        let db = sled::open(path)?;
        let alerts = db.open_tree(ALERT_TREE)?;
        Ok(Self { db, alerts, ttl })
    }

    /// Creates an in-memory cache, discarded on drop.
    pub fn temporary(ttl: Duration) -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        let alerts = db.open_tree(ALERT_TREE)?;
        Ok(Self { db, alerts, ttl })
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns true when `key` was recorded less than one TTL before `now`.
    pub fn is_fresh_at(&self, key: &str, now: u64) -> Result<bool> {
        match self.alerts.get(key.as_bytes())? {
            Some(bytes) => {
                let sent_at = decode_timestamp(key, &bytes)?;
                Ok(now.saturating_sub(sent_at) < self.ttl.as_secs())
            }
            None => Ok(false),
        }
    }

    /// Records a delivery of `key` at `now`.
    pub fn record_at(&self, key: &str, now: u64) -> Result<()> {
        self.alerts.insert(key.as_bytes(), now.to_be_bytes().to_vec())?;
        self.db.flush()?;
        Ok(())
    }

    /// Returns whether `key` is a duplicate, and records it if it is not.
    pub fn check_and_record(&self, key: &str) -> Result<bool> {
        let now = unix_now();
        if self.is_fresh_at(key, now)? {
            return Ok(true);
        }
        self.record_at(key, now)?;
        Ok(false)
    }

    /// Removes entries older than one TTL relative to `now`.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired_at(&self, now: u64) -> Result<usize> {
        let mut removed = 0;
        for entry in self.alerts.iter() {
            let (key, value) = entry?;
            let name = String::from_utf8_lossy(&key).into_owned();
            let sent_at = decode_timestamp(&name, &value)?;
            if now.saturating_sub(sent_at) >= self.ttl.as_secs() {
                self.alerts.remove(&key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Number of stored entries, fresh or not.
    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

impl std::fmt::Debug for AlertCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertCache")
            .field("entries", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

fn decode_timestamp(key: &str, bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| NotifyError::CorruptEntry(key.to_string()))?;
    Ok(u64::from_be_bytes(raw))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: u64 = 3600;

    fn cache() -> AlertCache {
        AlertCache::temporary(Duration::from_secs(HOUR)).unwrap()
    }

    #[test]
    fn test_unknown_key_is_not_fresh() {
        assert!(!cache().is_fresh_at("nope", 1_000).unwrap());
    }

    #[test]
    fn test_fresh_within_ttl() {
        let cache = cache();
        cache.record_at("k", 10_000).unwrap();

        assert!(cache.is_fresh_at("k", 10_000).unwrap());
        assert!(cache.is_fresh_at("k", 10_000 + HOUR - 1).unwrap());
        assert!(!cache.is_fresh_at("k", 10_000 + HOUR).unwrap());
    }

    #[test]
    fn test_check_and_record() {
        let cache = cache();
        assert!(!cache.check_and_record("drift-a").unwrap());
        assert!(cache.check_and_record("drift-a").unwrap());
        assert!(!cache.check_and_record("drift-b").unwrap());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_purge_expired() {
        let cache = cache();
        cache.record_at("old", 0).unwrap();
        cache.record_at("new", 5 * HOUR).unwrap();

        let removed = cache.purge_expired_at(5 * HOUR + 10).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.is_fresh_at("new", 5 * HOUR + 10).unwrap());
    }
}
