//! Check command: validates the configuration, scans and parses every
//! source, and reports diagnostics without touching the project note.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::sync::Arc;
use sync::{CancelFlag, FsVault, SyncEngine};

use crate::commands::ConfigArgs;
use crate::output;

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output diagnostics as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: CheckArgs) -> Result<()> {
    let config = args.config.load()?;

    let engine = SyncEngine::new(Arc::new(FsVault::new()));
    let preview = engine
        .prepare(&crate::commands::request(config), &CancelFlag::new())
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&preview.warnings)?);
        return Ok(());
    }

    output::header("Check");
    println!();
    println!(
        "  {} {}",
        "Entries:".dimmed(),
        preview.summary.total_entries.to_string().cyan()
    );
    println!(
        "  {} {} to {}",
        "Filter:".dimmed(),
        preview
            .filter
            .start
            .map_or_else(|| "open".to_string(), |d| d.to_string()),
        preview
            .filter
            .end
            .map_or_else(|| "open".to_string(), |d| d.to_string()),
    );
    println!(
        "  {} {}",
        "Diagnostics:".dimmed(),
        preview.warnings.len().to_string().cyan()
    );
    println!();

    if preview.warnings.is_empty() {
        output::success("No diagnostics");
    } else {
        output::warnings(&preview.warnings);
    }

    Ok(())
}
