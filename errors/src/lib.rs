//! Error taxonomy for the Lucid journal metrics engine.
//!
//! Split by recovery behavior rather than by crate: filter errors are
//! recovered by retaining the previous filter, merge and writer errors are
//! fatal to the current run and guarantee the target note is untouched —
//! except a timed-out write, whose outcome stays indeterminate until the
//! in-flight write settles.
//! Non-fatal diagnostics are not errors at all; they travel as
//! `lucid_core::ParseWarning` values attached to a successful result.

use thiserror::Error;

/// Invalid date range specification. Rejected before any filtering happens;
/// the caller keeps the previously active filter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("Start date {start} is after end date {end}")]
    InvertedRange { start: String, end: String },

    #[error("Unparsable date `{raw}` (tried formats: {formats})")]
    UnparsableDate { raw: String, formats: String },

    #[error("Custom range is missing its {missing} date")]
    IncompleteRange { missing: String },
}

/// Malformed or ambiguous generated-region markers. Fatal: the merge aborts
/// with the specific structural problem instead of guessing, and no write is
/// attempted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    #[error("Duplicate begin marker at lines {first} and {second}")]
    DuplicateBegin { first: usize, second: usize },

    #[error("Duplicate end marker at lines {first} and {second}")]
    DuplicateEnd { first: usize, second: usize },

    #[error("Begin marker at line {begin} has no matching end marker")]
    MissingEnd { begin: usize },

    #[error("End marker at line {end} appears without a begin marker")]
    MissingBegin { end: usize },

    #[error("End marker at line {end} appears before begin marker at line {begin}")]
    EndBeforeBegin { begin: usize, end: usize },
}

/// Backup or atomic-commit failure. In every variant but `Timeout` the
/// target note still holds its pre-update content; at no point does it hold
/// a partial document.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("Backup already exists at {path} and backup policy is abort")]
    BackupExists { path: String },

    #[error("Failed to write backup to {path}: {source}")]
    BackupFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to stage new content: {0}")]
    StageFailed(#[source] std::io::Error),

    #[error("Failed to commit new content to {path}: {source}")]
    CommitFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The caller stopped waiting; the in-flight write runs to completion
    /// on the blocking pool and may still land. The outcome is indeterminate
    /// until it settles, never a torn file.
    #[error("Write did not settle within {timeout_ms}ms; it may still complete")]
    Timeout { timeout_ms: u64 },

    #[error("No backup found at {path}")]
    NoBackup { path: String },
}

/// Storage backend failure from a `Vault` implementation.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Note not found: {path}")]
    NotFound { path: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
