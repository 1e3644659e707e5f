//! Two-phase synchronization pipeline.
//!
//! `prepare` reads and computes everything — scan, parse, filter,
//! aggregate, render, merge — without touching the vault; the host (UI or
//! CLI) inspects the preview and decides whether to `commit`. The engine
//! never blocks on user interaction internally.
//!
//! At most one run may be in flight per target note: a second `commit`
//! against the same path is rejected, not interleaved, since two concurrent
//! merges could race on the backup step.

use crate::aggregate::aggregate;
use crate::error::{Result, SyncError};
use crate::filter::{ResolvedRange, resolve_or_previous};
use crate::merge::merge;
use crate::parser::{ParseContext, parse_note};
use crate::render::render_fragment;
use crate::writer::{AtomicNoteWriter, WriterReport};
use config::{BackupPolicy, LucidConfig};
use dashmap::DashMap;
use errors::VaultError;
use lucid_core::{DreamEntry, EntryDate, ParseWarning, Summary, Vault, WarningKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Cooperative cancellation, checked between pipeline stages. Once the
/// writer has begun, cancellation is no longer honored; the write runs to
/// completion or rollback so no half-written file is left behind.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// One synchronization request. Explicit, immutable inputs; `today` is
/// injected rather than read from a clock so runs are reproducible.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub config: LucidConfig,
    pub today: EntryDate,
    /// The previously active resolved filter, retained when the requested
    /// filter is invalid.
    pub previous_filter: Option<ResolvedRange>,
}

/// Everything `prepare` computed. The host shows this for confirmation;
/// [`SyncEngine::commit`] persists it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    pub target: PathBuf,
    pub merged_text: String,
    pub fragment: String,
    pub summary: Summary,
    /// The filtered entry set, for charting/graph consumers.
    pub entries: Vec<DreamEntry>,
    pub warnings: Vec<ParseWarning>,
    pub filter: ResolvedRange,
    pub first_run: bool,
    /// The merged text is byte-identical to what is already stored.
    pub unchanged: bool,
    pub backup_policy: BackupPolicy,
}

/// Final outcome of a committed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub report: WriterReport,
    pub warnings: Vec<ParseWarning>,
}

/// The synchronization engine. Holds the vault and the per-note
/// single-flight guard; all run state is per-invocation.
pub struct SyncEngine<V> {
    vault: Arc<V>,
    in_flight: Arc<DashMap<PathBuf, ()>>,
}

impl<V> SyncEngine<V>
where
    V: Vault<Error = VaultError>,
{
    pub fn new(vault: Arc<V>) -> Self {
        Self {
            vault,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Phase one: compute the full preview without side effects.
    pub async fn prepare(&self, req: &SyncRequest, cancel: &CancelFlag) -> Result<PreviewResult> {
        let config = &req.config;
        let target = config.project_note.clone();

        cancel.check()?;
        let sources = self.collect_sources(config).await?;

        let ctx = ParseContext {
            metrics: &config.metrics,
            callout: &config.callout,
            date_formats: &config.filter.date_formats,
            use_filename_date: config.scan.use_filename_date,
        };

        let mut entries = Vec::new();
        let mut warnings = Vec::new();
        for path in &sources {
            cancel.check()?;
            match self.vault.read_to_string(path).await {
                Ok(text) => {
                    let mut parsed = parse_note(&text, path, &ctx);
                    entries.append(&mut parsed.entries);
                    warnings.append(&mut parsed.warnings);
                }
                Err(err) => {
                    warnings.push(ParseWarning::new(
                        WarningKind::UnreadableFile,
                        path.clone(),
                        0,
                        err.to_string(),
                    ));
                }
            }
        }

        cancel.check()?;
        let (range, filter_err) =
            resolve_or_previous(&config.filter, req.today, req.previous_filter);
        if let Some(err) = filter_err {
            warnings.push(ParseWarning::new(
                WarningKind::FilterRejected,
                target.clone(),
                0,
                format!("{err}; previous filter kept"),
            ));
        }
        let filtered: Vec<DreamEntry> = entries
            .into_iter()
            .filter(|e| range.contains(e.date))
            .collect();

        cancel.check()?;
        let summary = aggregate(&filtered, &config.metrics);
        let fragment = render_fragment(&summary, &filtered, &config.metrics);

        let prior = match self.vault.read_to_string(&target).await {
            Ok(text) => text,
            Err(VaultError::NotFound { .. }) => String::new(),
            Err(err) => return Err(err.into()),
        };

        let outcome = merge(&prior, &fragment)?;
        if outcome.hand_edited {
            warnings.push(ParseWarning::new(
                WarningKind::HandEditedRegion,
                target.clone(),
                0,
                "generated region was hand-edited since the last run; it will be overwritten",
            ));
        }

        let unchanged = outcome.merged == prior;
        tracing::info!(
            target = %target.display(),
            entries = filtered.len(),
            warnings = warnings.len(),
            unchanged,
            "prepared synchronization run"
        );

        Ok(PreviewResult {
            target,
            merged_text: outcome.merged,
            fragment,
            summary,
            entries: filtered,
            warnings,
            filter: range,
            first_run: outcome.first_run,
            unchanged,
            backup_policy: config.backup,
        })
    }

    /// Phase two: persist a prepared preview through the backup-guarded
    /// atomic writer, waiting at most `timeout`.
    ///
    /// On timeout the caller gets `WriterError::Timeout` but the write keeps
    /// running to completion, and the single-flight slot for the target is
    /// released only once it has settled — a new run against the same note
    /// is rejected with `RunInProgress` until then, never interleaved with
    /// the abandoned one.
    pub async fn commit(
        &self,
        preview: &PreviewResult,
        timeout: Duration,
        cancel: &CancelFlag,
    ) -> Result<RunOutcome> {
        cancel.check()?;

        let guard = self.acquire(&preview.target)?;

        // Last cancellation point; from here the write runs to completion.
        cancel.check()?;

        let writer = AtomicNoteWriter::new(preview.backup_policy);
        let target = preview.target.clone();
        let text = preview.merged_text.clone();
        // The run owns the guard, so abandoning the wait below cannot free
        // the slot while the write is still in flight.
        let run = tokio::spawn(async move {
            let result = writer.write_to_completion(&target, &text).await;
            drop(guard);
            result
        });

        let report = match tokio::time::timeout(timeout, run).await {
            Ok(joined) => joined.map_err(|e| SyncError::Internal(e.to_string()))??,
            Err(_elapsed) => {
                return Err(errors::WriterError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }
                .into());
            }
        };

        let mut warnings = preview.warnings.clone();
        if report.backup_replaced {
            if let Some(backup) = &report.backup_path {
                warnings.push(ParseWarning::new(
                    WarningKind::BackupReplaced,
                    backup.clone(),
                    0,
                    "an existing backup from an earlier run was replaced",
                ));
            }
        }

        Ok(RunOutcome { report, warnings })
    }

    /// Convenience wrapper for hosts that do not need a confirmation step.
    pub async fn run(
        &self,
        req: &SyncRequest,
        timeout: Duration,
        cancel: &CancelFlag,
    ) -> Result<RunOutcome> {
        let preview = self.prepare(req, cancel).await?;
        self.commit(&preview, timeout, cancel).await
    }

    async fn collect_sources(&self, config: &LucidConfig) -> Result<Vec<PathBuf>> {
        let mut sources: Vec<PathBuf> = Vec::new();
        for file in &config.scan.files {
            push_source(&mut sources, file.clone(), &config.project_note);
        }
        for folder in &config.scan.folders {
            for path in self.vault.list_markdown(folder).await? {
                push_source(&mut sources, path, &config.project_note);
            }
        }
        Ok(sources)
    }

    fn acquire(&self, target: &Path) -> Result<FlightGuard> {
        use dashmap::mapref::entry::Entry;
        match self.in_flight.entry(target.to_path_buf()) {
            Entry::Occupied(_) => Err(SyncError::RunInProgress {
                path: target.display().to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(FlightGuard {
                    map: Arc::clone(&self.in_flight),
                    key: target.to_path_buf(),
                })
            }
        }
    }
}

/// Releases the single-flight slot when the write has settled, whichever
/// way. Owns its map handle so it can outlive a caller that stopped
/// waiting.
struct FlightGuard {
    map: Arc<DashMap<PathBuf, ()>>,
    key: PathBuf,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}

fn push_source(sources: &mut Vec<PathBuf>, path: PathBuf, project_note: &Path) {
    // The project note and backup files are never scanned as sources.
    if path == project_note
        || path
            .to_str()
            .is_some_and(|p| p.ends_with(crate::writer::BACKUP_SUFFIX))
        || sources.contains(&path)
    {
        return;
    }
    sources.push(path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use lucid_core::MetricDefinition;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    const TIMEOUT: Duration = Duration::from_secs(5);

    struct MemoryVault {
        notes: RwLock<HashMap<PathBuf, String>>,
    }

    impl MemoryVault {
        fn new() -> Self {
            Self {
                notes: RwLock::new(HashMap::new()),
            }
        }

        async fn put(&self, path: &str, text: &str) {
            self.notes
                .write()
                .await
                .insert(PathBuf::from(path), text.to_string());
        }

        async fn get(&self, path: &str) -> Option<String> {
            self.notes.read().await.get(Path::new(path)).cloned()
        }
    }

    #[async_trait]
    impl Vault for MemoryVault {
        type Error = VaultError;

        async fn read_to_string(&self, path: &Path) -> std::result::Result<String, VaultError> {
            self.notes
                .read()
                .await
                .get(path)
                .cloned()
                .ok_or_else(|| VaultError::NotFound {
                    path: path.display().to_string(),
                })
        }

        async fn list_markdown(
            &self,
            scope: &Path,
        ) -> std::result::Result<Vec<PathBuf>, VaultError> {
            let mut paths: Vec<PathBuf> = self
                .notes
                .read()
                .await
                .keys()
                .filter(|p| p.starts_with(scope))
                .cloned()
                .collect();
            paths.sort();
            Ok(paths)
        }
    }

    fn request(files: &[&str]) -> SyncRequest {
        let mut config = LucidConfig::for_note(
            "vault/Dream Journal.md",
            vec![
                MetricDefinition::range("clarity", "Clarity", 1.0, 5.0),
                MetricDefinition::enumerated("mood", "Mood", &["calm", "anxious"]),
            ],
        );
        config.scan.files = files.iter().map(PathBuf::from).collect();
        SyncRequest {
            config,
            today: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            previous_filter: None,
        }
    }

    async fn seeded_vault() -> Arc<MemoryVault> {
        let vault = Arc::new(MemoryVault::new());
        vault
            .put(
                "vault/journal/jan.md",
                "> [!dream] 2025-01-15: Flying\n> Metrics: clarity: 4, mood: calm\n",
            )
            .await;
        vault
            .put(
                "vault/journal/feb.md",
                "> [!dream] 2025-02-01: Falling\n> Metrics: clarity: 3\n",
            )
            .await;
        vault
    }

    #[tokio::test]
    async fn test_prepare_collects_entries_and_merges() {
        let vault = seeded_vault().await;
        let engine = SyncEngine::new(vault.clone());
        let req = request(&["vault/journal/jan.md", "vault/journal/feb.md"]);

        let preview = engine.prepare(&req, &CancelFlag::new()).await.unwrap();

        assert_eq!(preview.entries.len(), 2);
        assert!(preview.first_run);
        assert!(preview.warnings.is_empty());
        assert!(preview.merged_text.contains("## Dream Metrics"));
        // prepare never writes.
        assert!(vault.get("vault/Dream Journal.md").await.is_none());
    }

    #[tokio::test]
    async fn test_custom_filter_narrows_entries() {
        let vault = seeded_vault().await;
        let engine = SyncEngine::new(vault);
        let mut req = request(&["vault/journal/jan.md", "vault/journal/feb.md"]);
        req.config.filter.custom = Some(config::CustomRange {
            start: "2025-01-01".to_string(),
            end: "2025-01-31".to_string(),
        });

        let preview = engine.prepare(&req, &CancelFlag::new()).await.unwrap();
        assert_eq!(preview.entries.len(), 1);
        assert_eq!(preview.entries[0].title, "Flying");
    }

    #[tokio::test]
    async fn test_invalid_filter_keeps_previous_and_warns() {
        let vault = seeded_vault().await;
        let engine = SyncEngine::new(vault);
        let mut req = request(&["vault/journal/jan.md", "vault/journal/feb.md"]);
        req.config.filter.custom = Some(config::CustomRange {
            start: "2025-02-01".to_string(),
            end: "2025-01-01".to_string(),
        });
        req.previous_filter = Some(ResolvedRange {
            start: Some(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()),
            end: Some(NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()),
        });

        let preview = engine.prepare(&req, &CancelFlag::new()).await.unwrap();
        // Previous (February) filter applied, error surfaced as a warning.
        assert_eq!(preview.entries.len(), 1);
        assert_eq!(preview.entries[0].title, "Falling");
        assert!(
            preview
                .warnings
                .iter()
                .any(|w| w.kind == WarningKind::FilterRejected)
        );
    }

    #[tokio::test]
    async fn test_prepare_is_idempotent_over_unchanged_sources() {
        let vault = seeded_vault().await;
        let engine = SyncEngine::new(vault.clone());
        let req = request(&["vault/journal/jan.md", "vault/journal/feb.md"]);
        let cancel = CancelFlag::new();

        let first = engine.prepare(&req, &cancel).await.unwrap();
        vault
            .put("vault/Dream Journal.md", &first.merged_text)
            .await;

        let second = engine.prepare(&req, &cancel).await.unwrap();
        assert_eq!(first.merged_text, second.merged_text);
        assert!(second.unchanged);
        assert!(!second.first_run);
    }

    #[tokio::test]
    async fn test_unreadable_source_is_warning_not_failure() {
        let vault = seeded_vault().await;
        let engine = SyncEngine::new(vault);
        let req = request(&["vault/journal/jan.md", "vault/journal/missing.md"]);

        let preview = engine.prepare(&req, &CancelFlag::new()).await.unwrap();
        assert_eq!(preview.entries.len(), 1);
        assert!(
            preview
                .warnings
                .iter()
                .any(|w| w.kind == WarningKind::UnreadableFile)
        );
    }

    #[tokio::test]
    async fn test_project_note_excluded_from_scan() {
        let vault = seeded_vault().await;
        vault
            .put("vault/Dream Journal.md", "> [!dream] 2025-03-01: Not a source\n")
            .await;
        let engine = SyncEngine::new(vault);

        let mut req = request(&[]);
        req.config.project_note = PathBuf::from("vault/Dream Journal.md");
        req.config.scan.folders = vec![PathBuf::from("vault")];

        let preview = engine.prepare(&req, &CancelFlag::new()).await.unwrap();
        assert!(preview.entries.iter().all(|e| e.title != "Not a source"));
    }

    #[tokio::test]
    async fn test_cancelled_prepare_has_no_side_effects() {
        let vault = seeded_vault().await;
        let engine = SyncEngine::new(vault.clone());
        let req = request(&["vault/journal/jan.md"]);
        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = engine.prepare(&req, &cancel).await;
        assert!(matches!(result, Err(SyncError::Cancelled)));
        assert!(vault.get("vault/Dream Journal.md").await.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_commit_before_write_leaves_target() {
        let vault = seeded_vault().await;
        let engine = SyncEngine::new(vault.clone());
        let req = request(&["vault/journal/jan.md"]);

        let preview = engine.prepare(&req, &CancelFlag::new()).await.unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = engine.commit(&preview, TIMEOUT, &cancel).await;
        assert!(matches!(result, Err(SyncError::Cancelled)));
    }

    #[tokio::test]
    async fn test_timed_out_commit_holds_slot_until_write_settles() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("Dream Journal.md");
        std::fs::write(&target, "before\n").unwrap();

        let engine = SyncEngine::new(Arc::new(MemoryVault::new()));
        let cancel = CancelFlag::new();
        let preview = PreviewResult {
            target: target.clone(),
            // Large enough that the write cannot settle before the wait is
            // abandoned.
            merged_text: "x".repeat(64 << 20),
            fragment: String::new(),
            summary: lucid_core::Summary::empty(),
            entries: Vec::new(),
            warnings: Vec::new(),
            filter: ResolvedRange::ALL,
            first_run: true,
            unchanged: false,
            backup_policy: config::BackupPolicy::ReplaceWithWarning,
        };

        let err = engine
            .commit(&preview, Duration::ZERO, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Writer(errors::WriterError::Timeout { .. })
        ));

        // The abandoned write still owns the slot; a new run is rejected,
        // never interleaved with it.
        assert!(matches!(
            engine.commit(&preview, Duration::ZERO, &cancel).await,
            Err(SyncError::RunInProgress { .. })
        ));

        // Once the write settles the slot frees and the target holds the
        // committed text, not a torn file.
        let mut released = false;
        for _ in 0..500 {
            if engine.acquire(&target).is_ok() {
                released = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(released);
        assert_eq!(
            std::fs::read_to_string(&target).unwrap().len(),
            preview.merged_text.len()
        );
    }

    #[tokio::test]
    async fn test_single_flight_guard_releases_after_commit() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("Dream Journal.md");
        std::fs::write(&target, "").unwrap();

        let vault = Arc::new(MemoryVault::new());
        let engine = SyncEngine::new(vault);

        let guard = engine.acquire(&target).unwrap();
        assert!(matches!(
            engine.acquire(&target),
            Err(SyncError::RunInProgress { .. })
        ));
        drop(guard);
        assert!(engine.acquire(&target).is_ok());
    }
}
