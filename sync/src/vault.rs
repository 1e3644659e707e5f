//! Filesystem-backed vault.
//!
//! The default `Vault` implementation for hosts whose notes live on disk.
//! Tests and embedding UIs supply their own in-memory implementations.

use async_trait::async_trait;
use errors::VaultError;
use lucid_core::Vault;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Default, Clone, Copy)]
pub struct FsVault;

impl FsVault {
    pub fn new() -> Self {
        Self
    }
}

fn io_err(path: &Path, source: std::io::Error) -> VaultError {
    if source.kind() == std::io::ErrorKind::NotFound {
        VaultError::NotFound {
            path: path.display().to_string(),
        }
    } else {
        VaultError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl Vault for FsVault {
    type Error = VaultError;

    async fn read_to_string(&self, path: &Path) -> Result<String, Self::Error> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| io_err(path, e))
    }

    async fn list_markdown(&self, scope: &Path) -> Result<Vec<PathBuf>, Self::Error> {
        let scope = scope.to_path_buf();
        let listed = tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            for entry in WalkDir::new(&scope).follow_links(false) {
                let entry = entry.map_err(|e| {
                    let io = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("walk error"));
                    io_err(&scope, io)
                })?;
                if entry.file_type().is_file()
                    && entry
                        .path()
                        .extension()
                        .and_then(|s| s.to_str())
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
                {
                    files.push(entry.into_path());
                }
            }
            // Stable order so runs over the same vault are deterministic.
            files.sort();
            Ok::<_, VaultError>(files)
        })
        .await
        .map_err(|e| VaultError::Io {
            path: String::new(),
            source: std::io::Error::other(e),
        })??;

        Ok(listed)
    }
}
