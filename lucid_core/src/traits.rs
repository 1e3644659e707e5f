//! Storage abstraction for the engine's read side.
//!
//! The engine never assumes a specific storage technology beyond
//! path-addressable text files when scanning and parsing; UI hosts and
//! tests supply their own implementations. Committing stays with the
//! backup-guarded atomic writer, which needs a real same-volume rename
//! and is therefore filesystem-bound by design.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Path-addressable text file storage, read side.
#[async_trait]
pub trait Vault: Send + Sync {
    type Error;

    /// Full text of the note at `path`.
    async fn read_to_string(&self, path: &Path) -> Result<String, Self::Error>;

    /// Markdown files under `scope`, recursively, in a stable order.
    async fn list_markdown(&self, scope: &Path) -> Result<Vec<PathBuf>, Self::Error>;
}
