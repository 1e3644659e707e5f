//! Backup & atomic writer.
//!
//! Persists the merged note such that at no observable point does the
//! target path hold a partially written document. Protocol: snapshot the
//! current content to the backup path, stage the new content in a temp file
//! on the same volume, then atomically rename over the target. Any failure
//! leaves the target untouched and the backup in place.

use config::BackupPolicy;
use errors::WriterError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use strum::Display;
use tempfile::NamedTempFile;

/// Fixed, deterministic backup suffix so UIs can discover backups and offer
/// restoration.
pub const BACKUP_SUFFIX: &str = ".backup.md";

/// Observable phases of one write. Any failure transitions to `Failed`,
/// never silently to `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum WriterPhase {
    Idle,
    BackingUp,
    Writing,
    Committing,
    Done,
    Failed,
}

/// Successful write outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriterReport {
    pub phase: WriterPhase,
    /// Where the pre-update content was snapshotted. `None` only when the
    /// target did not exist yet (nothing to lose).
    pub backup_path: Option<PathBuf>,
    /// A backup from an earlier run was present and replaced; the pipeline
    /// surfaces this as a warning.
    pub backup_replaced: bool,
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailPoint {
    Stage,
    Commit,
}

/// Writes one note atomically, guarded by a pre-write backup.
#[derive(Debug, Clone, Copy)]
pub struct AtomicNoteWriter {
    policy: BackupPolicy,
    #[cfg(test)]
    fail_point: Option<FailPoint>,
}

impl AtomicNoteWriter {
    pub fn new(policy: BackupPolicy) -> Self {
        Self {
            policy,
            #[cfg(test)]
            fail_point: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_fail_point(policy: BackupPolicy, fail_point: FailPoint) -> Self {
        Self {
            policy,
            fail_point: Some(fail_point),
        }
    }

    /// Backup location for `target`: the target path with [`BACKUP_SUFFIX`]
    /// appended.
    pub fn backup_path_for(target: &Path) -> PathBuf {
        let mut name = target.as_os_str().to_os_string();
        name.push(BACKUP_SUFFIX);
        PathBuf::from(name)
    }

    /// Persist `new_text` to `target` under the backup-then-commit protocol,
    /// waiting at most `timeout`.
    ///
    /// On timeout the caller observes `WriterError::Timeout` while the
    /// write itself keeps running on the blocking pool — blocking file I/O
    /// cannot be cancelled mid-protocol. The outcome is then indeterminate
    /// until that write settles (the rename either lands atomically or
    /// never happens); there is no partial state in between. Callers that
    /// need the settled outcome use [`Self::write_to_completion`] and bound
    /// the wait themselves without abandoning the result.
    pub async fn write(
        &self,
        target: &Path,
        new_text: &str,
        timeout: Duration,
    ) -> Result<WriterReport, WriterError> {
        match tokio::time::timeout(timeout, self.write_to_completion(target, new_text)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(WriterError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Like [`Self::write`] but unbounded: resolves only when the protocol
    /// has actually settled, success or failure.
    pub async fn write_to_completion(
        &self,
        target: &Path,
        new_text: &str,
    ) -> Result<WriterReport, WriterError> {
        let writer = *self;
        let target = target.to_path_buf();
        let text = new_text.to_string();

        tokio::task::spawn_blocking(move || writer.write_blocking(&target, &text))
            .await
            .map_err(|join_err| WriterError::StageFailed(std::io::Error::other(join_err)))?
    }

    fn write_blocking(&self, target: &Path, new_text: &str) -> Result<WriterReport, WriterError> {
        let mut phase = WriterPhase::Idle;
        let result = self.run_protocol(target, new_text, &mut phase);
        match &result {
            Ok(report) => {
                tracing::info!(
                    target = %target.display(),
                    backup = report.backup_path.as_ref().map(|p| p.display().to_string()),
                    "note committed"
                );
            }
            Err(err) => {
                tracing::error!(
                    target = %target.display(),
                    phase = %phase,
                    error = %err,
                    "write failed; target left untouched"
                );
            }
        }
        result
    }

    fn run_protocol(
        &self,
        target: &Path,
        new_text: &str,
        phase: &mut WriterPhase,
    ) -> Result<WriterReport, WriterError> {
        *phase = WriterPhase::BackingUp;
        let (backup_path, backup_replaced) = self.backup(target).inspect_err(|_| {
            *phase = WriterPhase::Failed;
        })?;

        *phase = WriterPhase::Writing;
        let staged = self.stage(target, new_text).inspect_err(|_| {
            *phase = WriterPhase::Failed;
        })?;

        *phase = WriterPhase::Committing;
        self.commit(staged, target).inspect_err(|_| {
            *phase = WriterPhase::Failed;
        })?;

        *phase = WriterPhase::Done;
        Ok(WriterReport {
            phase: WriterPhase::Done,
            backup_path,
            backup_replaced,
        })
    }

    fn backup(&self, target: &Path) -> Result<(Option<PathBuf>, bool), WriterError> {
        if !target.exists() {
            return Ok((None, false));
        }

        let backup_path = Self::backup_path_for(target);
        let backup_existed = backup_path.exists();
        if backup_existed && self.policy == BackupPolicy::Abort {
            return Err(WriterError::BackupExists {
                path: backup_path.display().to_string(),
            });
        }

        let current = fs::read_to_string(target).map_err(|source| WriterError::ReadFailed {
            path: target.display().to_string(),
            source,
        })?;
        fs::write(&backup_path, &current).map_err(|source| WriterError::BackupFailed {
            path: backup_path.display().to_string(),
            source,
        })?;

        Ok((Some(backup_path), backup_existed))
    }

    fn stage(&self, target: &Path, new_text: &str) -> Result<NamedTempFile, WriterError> {
        #[cfg(test)]
        if self.fail_point == Some(FailPoint::Stage) {
            return Err(WriterError::StageFailed(std::io::Error::other(
                "injected stage failure",
            )));
        }

        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        // Same directory, hence same volume: the final rename stays atomic.
        let mut staged = NamedTempFile::new_in(parent).map_err(WriterError::StageFailed)?;
        staged
            .write_all(new_text.as_bytes())
            .and_then(|()| staged.as_file().sync_all())
            .map_err(WriterError::StageFailed)?;
        Ok(staged)
    }

    fn commit(&self, staged: NamedTempFile, target: &Path) -> Result<(), WriterError> {
        #[cfg(test)]
        if self.fail_point == Some(FailPoint::Commit) {
            // The temp file is dropped and cleaned up; target is untouched.
            return Err(WriterError::CommitFailed {
                path: target.display().to_string(),
                source: std::io::Error::other("injected commit failure"),
            });
        }

        staged
            .persist(target)
            .map_err(|e| WriterError::CommitFailed {
                path: target.display().to_string(),
                source: e.error,
            })?;
        Ok(())
    }

    /// Copy the backup back over the target, through the same staged-rename
    /// path so a failed restore cannot corrupt the target either.
    pub async fn restore(&self, target: &Path, timeout: Duration) -> Result<(), WriterError> {
        let backup_path = Self::backup_path_for(target);
        let backup_text = match fs::read_to_string(&backup_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WriterError::NoBackup {
                    path: backup_path.display().to_string(),
                });
            }
            Err(source) => {
                return Err(WriterError::ReadFailed {
                    path: backup_path.display().to_string(),
                    source,
                });
            }
        };

        let writer = Self::new(BackupPolicy::ReplaceWithWarning);
        writer.write(target, &backup_text, timeout).await?;
        Ok(())
    }
}
