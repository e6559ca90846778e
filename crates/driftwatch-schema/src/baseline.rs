//! # Baseline Store
//!
//! Persists the last-accepted signature of every target as a single JSON
//! document and stages candidate baselines for review.
//!
//! ## Update Policy
//!
//! The store never merges into an existing document; every write replaces a
//! whole file through a temp-file-and-rename in the same directory, so a
//! reader sees either the old document or the new one. The staged pair is
//! built in a sibling temp directory and renamed into place as a unit.
//!
//! | Strategy | `write_snapshot` | `update` |
//! |----------|------------------|----------|
//! | `StageForReview` | not called by the orchestrator | writes candidate + `CHANGES.md` to the staging dir |
//! | `DirectWrite` | overwrites the baseline every run | refuses, `accepted = false` |
//!
//! Staging never touches the baseline itself. Promoting a staged candidate
//! is an external review step (a pull request, a manual copy).
//!
//! ## Storage Layout
//!
//! | File | Content |
//! |------|---------|
//! | `path` | accepted baseline, `{target: {field: kind}}` |
//! | `staging_dir/baseline.json` | candidate baseline |
//! | `staging_dir/CHANGES.md` | human-readable change report |

use crate::canonicalize::{short_hex, signature_fingerprint};
use crate::models::{Baseline, Classification, Result, Severity, UpdateOutcome};
use crate::severity::should_block;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the staged candidate inside the staging directory.
pub const STAGED_BASELINE_FILE: &str = "baseline.json";

/// File name of the staged change report.
pub const CHANGE_REPORT_FILE: &str = "CHANGES.md";

/// How accepted drift reaches the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateStrategy {
    /// Stage the candidate and a change report for external review.
    #[default]
    StageForReview,
    /// Overwrite the baseline with every run's observations.
    DirectWrite,
}

/// Location and policy of a [`BaselineStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Accepted baseline document.
    pub path: PathBuf,
    /// Directory receiving staged candidates.
    pub staging_dir: PathBuf,
    /// Update strategy. Chosen explicitly, never inferred.
    pub strategy: UpdateStrategy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".driftwatch/baseline.json"),
            staging_dir: PathBuf::from(".driftwatch/staged"),
            strategy: UpdateStrategy::StageForReview,
        }
    }
}

/// JSON-file baseline store.
///
/// # Example
///
/// ```rust
/// use driftwatch_schema::baseline::{BaselineStore, StoreConfig};
/// use driftwatch_schema::{Baseline, Signature};
///
/// let dir = tempfile::tempdir().unwrap();
/// let store = BaselineStore::new(StoreConfig {
///     path: dir.path().join("baseline.json"),
///     staging_dir: dir.path().join("staged"),
///     ..StoreConfig::default()
/// });
///
/// assert!(store.load().unwrap().is_empty());
///
/// let mut baseline = Baseline::new();
/// baseline.insert("users", Signature::new());
/// store.write_snapshot(&baseline).unwrap();
/// assert_eq!(store.load().unwrap(), baseline);
/// ```
#[derive(Debug, Clone)]
pub struct BaselineStore {
    config: StoreConfig,
}

impl BaselineStore {
    /// Creates a store. Nothing is touched on disk until a read or write.
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    /// The configured update strategy.
    pub fn strategy(&self) -> UpdateStrategy {
        self.config.strategy
    }

    /// Path of the accepted baseline document.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Loads the accepted baseline.
    ///
    /// # Errors
    ///
    /// A missing document is an empty baseline, not an error.
    /// Returns `SchemaError::Io` for other read failures and
    /// `SchemaError::Serialization` when the document is not a baseline.
    pub fn load(&self) -> Result<Baseline> {
        match fs::read(&self.config.path) {
            Ok(bytes) => {
                let baseline: Baseline = serde_json::from_slice(&bytes)?;
                debug!(
                    "Loaded baseline with {} targets from {}",
                    baseline.len(),
                    self.config.path.display()
                );
                Ok(baseline)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(
                    "No baseline at {}, starting empty",
                    self.config.path.display()
                );
                Ok(Baseline::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the accepted baseline with `baseline`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Io` if the document cannot be written. On error
    /// the previous document is left in place.
    pub fn write_snapshot(&self, baseline: &Baseline) -> Result<()> {
        write_atomic(&self.config.path, &encode(baseline)?)?;
        info!(
            "Wrote baseline snapshot ({} targets) to {}",
            baseline.len(),
            self.config.path.display()
        );
        Ok(())
    }

    /// Stages `candidate` for review.
    ///
    /// `should_block` is computed from the classification and `gate` under
    /// every strategy; it is advisory and the store never acts on it.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Io` if a staged document cannot be written.
    /// The staging directory then still holds the previous pair, never a
    /// mix of old and new.
    pub fn update(
        &self,
        candidate: &Baseline,
        classification: &Classification,
        affected_targets: &[String],
        gate: Option<Severity>,
    ) -> Result<UpdateOutcome> {
        let should_block = should_block(classification.severity, gate);

        if self.config.strategy != UpdateStrategy::StageForReview {
            warn!("Baseline update refused: store is not in stage-for-review mode");
            return Ok(UpdateOutcome {
                accepted: false,
                should_block,
                staged_path: None,
            });
        }

        let dir = &self.config.staging_dir;
        let report = render_change_report(candidate, classification, affected_targets, should_block)?;
        stage_pair(dir, &encode(candidate)?, report.as_bytes())?;

        info!(
            "Staged baseline candidate for {} affected targets in {}",
            affected_targets.len(),
            dir.display()
        );

        Ok(UpdateOutcome {
            accepted: true,
            should_block,
            staged_path: Some(dir.clone()),
        })
    }
}

fn encode(baseline: &Baseline) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(baseline)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Replaces `path` with `bytes` via a synced temp file in the same directory.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Replaces the staging directory with one holding both documents.
///
/// The pair is written and synced in a sibling temp directory that is then
/// renamed over `dir`, so readers see either the old pair or the new one.
fn stage_pair(dir: &Path, baseline: &[u8], report: &[u8]) -> Result<()> {
    let parent = match dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let tmp = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(parent)?;
    for (name, bytes) in [(STAGED_BASELINE_FILE, baseline), (CHANGE_REPORT_FILE, report)] {
        let mut file = fs::File::create(tmp.path().join(name))?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
        _ => {}
    }
    fs::rename(tmp.path(), dir)?;
    Ok(())
}

/// Markdown report accompanying a staged candidate.
pub fn render_change_report(
    candidate: &Baseline,
    classification: &Classification,
    affected_targets: &[String],
    should_block: bool,
) -> Result<String> {
    let mut out = String::new();
    let _ = writeln!(out, "# API drift review");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Severity: **{}**", classification.severity);
    let _ = writeln!(out, "- Blocking: {}", if should_block { "yes" } else { "no" });
    let _ = writeln!(out, "- Targets in candidate: {}", candidate.len());
    let _ = writeln!(out);

    let _ = writeln!(out, "## Affected targets");
    let _ = writeln!(out);
    if affected_targets.is_empty() {
        let _ = writeln!(out, "_none_");
    }
    for target in affected_targets {
        match candidate.get(target) {
            Some(sig) => {
                let _ = writeln!(
                    out,
                    "- `{}` (fingerprint `{}`)",
                    target,
                    short_hex(&signature_fingerprint(sig)?)
                );
            }
            None => {
                let _ = writeln!(out, "- `{}`", target);
            }
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Reasons");
    let _ = writeln!(out);
    for reason in &classification.reasons {
        let _ = writeln!(out, "- {}", reason);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Signature, SignatureEntry, ValueKind};
    use tempfile::TempDir;

    fn store_in(dir: &TempDir, strategy: UpdateStrategy) -> BaselineStore {
        BaselineStore::new(StoreConfig {
            path: dir.path().join("nested/baseline.json"),
            staging_dir: dir.path().join("staged"),
            strategy,
        })
    }

    fn sample() -> Baseline {
        let mut sig = Signature::new();
        sig.insert("id".into(), SignatureEntry::Kind(ValueKind::Number));
        sig.insert(
            "Character".into(),
            SignatureEntry::Fields(vec!["name:String".into()]),
        );
        let mut baseline = Baseline::new();
        baseline.insert("users", sig);
        baseline
    }

    fn major() -> Classification {
        Classification {
            severity: Severity::Major,
            reasons: vec!["[MAJOR] users: field 'c' removed (breaking)".into()],
        }
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, UpdateStrategy::StageForReview);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, UpdateStrategy::DirectWrite);

        store.write_snapshot(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), sample());
    }

    #[test]
    fn test_snapshot_overwrites_not_merges() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, UpdateStrategy::DirectWrite);

        store.write_snapshot(&sample()).unwrap();
        let mut other = Baseline::new();
        other.insert("orders", Signature::new());
        store.write_snapshot(&other).unwrap();

        let loaded = store.load().unwrap();
        assert!(!loaded.contains("users"));
        assert!(loaded.contains("orders"));
    }

    #[test]
    fn test_load_malformed_errors() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, UpdateStrategy::StageForReview);
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(store.path(), b"[1, 2, 3]").unwrap();

        assert!(matches!(
            store.load(),
            Err(crate::SchemaError::Serialization(_))
        ));
    }

    #[test]
    fn test_update_stages_candidate_and_report() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, UpdateStrategy::StageForReview);

        let outcome = store
            .update(&sample(), &major(), &["users".to_string()], None)
            .unwrap();

        assert!(outcome.accepted);
        assert!(outcome.should_block);
        assert_eq!(outcome.staged_path, Some(dir.path().join("staged")));

        let staged: Baseline = serde_json::from_slice(
            &fs::read(dir.path().join("staged").join(STAGED_BASELINE_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(staged, sample());

        let report =
            fs::read_to_string(dir.path().join("staged").join(CHANGE_REPORT_FILE)).unwrap();
        assert!(report.contains("Severity: **major**"));
        assert!(report.contains("`users`"));
        assert!(report.contains("field 'c' removed"));

        // The accepted baseline is never touched by staging.
        assert!(!store.path().exists());
    }

    #[test]
    fn test_restaging_replaces_pair_as_a_unit() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, UpdateStrategy::StageForReview);
        let staged = dir.path().join("staged");

        store
            .update(&sample(), &major(), &["users".to_string()], None)
            .unwrap();

        let mut next = sample();
        next.insert("orders", Signature::new());
        let minor = Classification {
            severity: Severity::Minor,
            reasons: vec!["[MINOR] orders: field 'id' added (additive)".into()],
        };
        store
            .update(&next, &minor, &["orders".to_string()], None)
            .unwrap();

        let mut names: Vec<String> = fs::read_dir(&staged)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![CHANGE_REPORT_FILE, STAGED_BASELINE_FILE]);

        let staged_baseline: Baseline =
            serde_json::from_slice(&fs::read(staged.join(STAGED_BASELINE_FILE)).unwrap()).unwrap();
        assert_eq!(staged_baseline, next);
        let report = fs::read_to_string(staged.join(CHANGE_REPORT_FILE)).unwrap();
        assert!(report.contains("Severity: **minor**"));
        assert!(!report.contains("field 'c' removed"));

        // No temp directories left next to the staging dir.
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with(".staging-")
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_update_refused_in_direct_mode() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, UpdateStrategy::DirectWrite);

        let outcome = store
            .update(&sample(), &major(), &["users".to_string()], None)
            .unwrap();

        assert!(!outcome.accepted);
        assert!(outcome.should_block);
        assert!(outcome.staged_path.is_none());
        assert!(!dir.path().join("staged").exists());
    }

    #[test]
    fn test_update_minor_gate() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, UpdateStrategy::StageForReview);
        let minor = Classification {
            severity: Severity::Minor,
            reasons: vec!["[MINOR] users: field 'b' added (additive)".into()],
        };

        let open = store.update(&sample(), &minor, &[], None).unwrap();
        assert!(!open.should_block);

        let gated = store
            .update(&sample(), &minor, &[], Some(Severity::Minor))
            .unwrap();
        assert!(gated.should_block);
    }

    #[test]
    fn test_strategy_config_names() {
        let parsed: StoreConfig = serde_json::from_str(
            r#"{"path": "b.json", "staging_dir": "s", "strategy": "direct-write"}"#,
        )
        .unwrap();
        assert_eq!(parsed.strategy, UpdateStrategy::DirectWrite);

        let defaulted: StoreConfig =
            serde_json::from_str(r#"{"path": "b.json", "staging_dir": "s"}"#).unwrap();
        assert_eq!(defaulted.strategy, UpdateStrategy::StageForReview);
    }
}
