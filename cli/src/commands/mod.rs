pub mod check;
pub mod preview;
pub mod restore;
pub mod sync;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::LucidConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "lucid",
    author,
    version,
    about = "Lucid - dream journal metrics for markdown vaults",
    long_about = "Scans journal notes for metric-annotated dream callouts, aggregates \
                  per-metric statistics, and keeps a generated summary region in your \
                  project note up to date.\n\nYour own text in the project note is never \
                  touched; the previous version is backed up before every write."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Scan journal notes and update the project note")]
    Sync(sync::SyncArgs),

    #[command(about = "Show what a sync would write, without writing")]
    Preview(preview::PreviewArgs),

    #[command(about = "Validate the configuration and report parse diagnostics")]
    Check(check::CheckArgs),

    #[command(about = "Restore the project note from its backup")]
    Restore(restore::RestoreArgs),
}

/// Options shared by every command that loads a configuration file.
#[derive(Args)]
pub struct ConfigArgs {
    /// Path to the configuration file (.toml, .yaml or .yml)
    #[arg(long, short, env = "LUCID_CONFIG", default_value = "lucid.toml")]
    pub config: PathBuf,

    /// I/O timeout for the write/restore step, in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<LucidConfig> {
        config::load_from_file(&self.config)
            .with_context(|| format!("failed to load {}", self.config.display()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub fn request(config: LucidConfig) -> ::sync::SyncRequest {
    ::sync::SyncRequest {
        config,
        today: chrono::Local::now().date_naive(),
        previous_filter: None,
    }
}
